use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use search_core::{DocumentInput, EngineConfig, IndexState, SearchEngine, StemmingNormalizer};
use serde_json::Value;
use server::{router, AppState};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn tiny_app(index_dir: &Path) -> Router {
    let normalizer = Arc::new(StemmingNormalizer::default());
    let corpus = vec![
        DocumentInput::new("Rust", "rust systems programming with rust ownership"),
        DocumentInput::new("Gopher", "go concurrency and some rust interop"),
        DocumentInput::new("Python", "python scripting language"),
    ];
    let state = IndexState::build(normalizer.as_ref(), corpus).unwrap();
    let engine = SearchEngine::with_state(normalizer, EngineConfig::default(), state);
    router(AppState {
        engine: Arc::new(engine),
        index_dir: index_dir.to_path_buf(),
        admin_token: Some(TOKEN.to_string()),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn result_ids(body: &Value) -> Vec<u64> {
    body["results"].as_array().unwrap().iter().map(|hit| hit["doc_id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn ranked_search_orders_by_score() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let (status, body) = get(&app, "/search?q=rust&k=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result_ids(&body), vec![0, 1]);
    assert_eq!(body["total_hits"], 2);
    let snippet = body["results"][0]["snippet"].as_str().unwrap();
    assert!(snippet.contains("<em>rust</em>"), "{snippet}");
}

#[tokio::test]
async fn boolean_model_and_field_scope() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let (_, body) = get(&app, "/search?q=NOT%20python&model=boolean").await;
    assert_eq!(result_ids(&body), vec![0, 1]);
    let (_, body) = get(&app, "/search?q=rust&model=boolean&field=title").await;
    assert_eq!(result_ids(&body), vec![0]);
    let (status, _) = get(&app, "/search?q=rust&field=footer").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = get(&app, "/search?q=rust&model=bm25").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bm25"));
}

#[tokio::test]
async fn missing_documents_are_not_found() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let (status, body) = get(&app, "/doc/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    let (status, body) = get(&app, "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Python");
}

#[tokio::test]
async fn admin_routes_require_the_token() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let request = Request::builder()
        .method("POST")
        .uri("/documents")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"title":"Dragon","content":"dragon lore"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, body) = get(&app, "/search?q=dragon&model=boolean").await;
    assert_eq!(body["total_hits"], 0);
}

#[tokio::test]
async fn mutations_are_visible_and_committed() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let insert = Request::builder()
        .method("POST")
        .uri("/documents")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(r#"{"title":"Dragon","content":"dragon lore"}"#))
        .unwrap();
    let (status, body) = send(&app, insert).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["doc_id"], 3);
    let (_, body) = get(&app, "/search?q=dragon&model=boolean").await;
    assert_eq!(result_ids(&body), vec![3]);

    let update = Request::builder()
        .method("PUT")
        .uri("/documents/2/content")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(r#"{"text":"snake charming"}"#))
        .unwrap();
    assert_eq!(send(&app, update).await.0, StatusCode::NO_CONTENT);
    let (_, body) = get(&app, "/search?q=snake&model=boolean").await;
    assert_eq!(result_ids(&body), vec![2]);

    let remove = Request::builder()
        .method("DELETE")
        .uri("/documents/1")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, remove).await.0, StatusCode::NO_CONTENT);
    let again = Request::builder()
        .method("DELETE")
        .uri("/documents/1")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, again).await.0, StatusCode::NOT_FOUND);

    let commit = Request::builder()
        .method("POST")
        .uri("/index/commit")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, commit).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_docs"], 3);
    assert!(dir.path().join("meta.json").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_inserts_do_not_starve_searches() {
    let dir = tempdir().unwrap();
    let app = tiny_app(dir.path());
    let mut writers = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        writers.push(tokio::spawn(async move {
            let request = Request::builder()
                .method("POST")
                .uri("/documents")
                .header("content-type", "application/json")
                .header("X-ADMIN-TOKEN", TOKEN)
                .body(Body::from(format!(r#"{{"title":"Dragon {i}","content":"dragon lore"}}"#)))
                .unwrap();
            send(&app, request).await.0
        }));
    }
    let (status, _) = get(&app, "/search?q=rust").await;
    assert_eq!(status, StatusCode::OK);
    for writer in writers {
        assert_eq!(writer.await.unwrap(), StatusCode::CREATED);
    }
    let (_, body) = get(&app, "/search?q=dragon&model=boolean&k=100").await;
    assert_eq!(body["total_hits"], 8);
}
