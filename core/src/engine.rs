use crate::boolean;
use crate::config::EngineConfig;
use crate::document::{Document, DocumentInput, Field, FieldScope};
use crate::error::Result;
use crate::index::IndexState;
use crate::persist::{self, IndexPaths};
use crate::proximity;
use crate::query::{ParsedQuery, SearchHit, SearchModel, SearchRequest, SearchResults};
use crate::ranked;
use crate::snippet::{self, Matches, SnippetOptions};
use crate::tokenizer::Normalizer;
use crate::DocId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub next_fresh_id: DocId,
    pub freed_ids: usize,
    pub terms_per_field: Vec<(Field, usize)>,
}

/// The index behind a reader/writer lock. Searches share the read side; each
/// insert, delete or field update holds the write side for its whole duration.
pub struct SearchEngine {
    normalizer: Arc<dyn Normalizer>,
    config: EngineConfig,
    state: RwLock<IndexState>,
}

impl SearchEngine {
    pub fn new(normalizer: Arc<dyn Normalizer>, config: EngineConfig) -> Self {
        Self::with_state(normalizer, config, IndexState::new())
    }

    pub fn with_state(normalizer: Arc<dyn Normalizer>, config: EngineConfig, state: IndexState) -> Self {
        Self { normalizer, config, state: RwLock::new(state) }
    }

    pub fn open(paths: &IndexPaths, normalizer: Arc<dyn Normalizer>, config: EngineConfig) -> Result<Self> {
        let state = persist::load_state(paths)?;
        Ok(Self::with_state(normalizer, config, state))
    }

    /// Persists the current index; mutations wait until the write finishes.
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        let state = self.state.read();
        persist::save_state(paths, &state)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn normalizer(&self) -> &dyn Normalizer { self.normalizer.as_ref() }

    pub fn insert(&self, input: DocumentInput) -> Result<DocId> {
        self.state.write().insert(self.normalizer.as_ref(), input)
    }

    pub fn delete(&self, doc_id: DocId) -> Result<()> {
        self.state.write().delete(self.normalizer.as_ref(), doc_id).map(|_| ())
    }

    pub fn update_field(&self, doc_id: DocId, field: Field, text: &str) -> Result<()> {
        self.state.write().update_field(self.normalizer.as_ref(), doc_id, field, text)
    }

    pub fn document(&self, doc_id: DocId) -> Option<Document> {
        self.state.read().docs.get(doc_id).cloned()
    }

    /// Indexed words starting with `prefix`, alphabetically.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.state.read().suggestions(&prefix, limit)
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            num_docs: state.num_docs(),
            next_fresh_id: state.docs.next_fresh_id(),
            freed_ids: state.docs.freed_ids().len(),
            terms_per_field: state.index.iter().map(|(field, index)| (field, index.len())).collect(),
        }
    }

    pub fn check_invariants(&self, tolerance: f64) -> std::result::Result<(), String> {
        self.state.read().check_invariants(tolerance)
    }

    pub fn search(&self, request: &SearchRequest) -> SearchResults {
        let state = self.state.read();
        let k = self.config.clamp_k(request.k);
        match request.model {
            SearchModel::Ranked => self.ranked_search(&state, request, k),
            SearchModel::Boolean => self.boolean_search(&state, request, k),
        }
    }

    fn query_terms(&self, text: &str, scope: FieldScope) -> Vec<String> {
        let field = match scope {
            FieldScope::One(field) => field,
            FieldScope::All => Field::Content,
        };
        self.normalizer.normalize(text, field).into_iter().map(|t| t.term).collect()
    }

    fn ranked_search(&self, state: &IndexState, request: &SearchRequest, k: usize) -> SearchResults {
        let parsed = match ParsedQuery::parse(&request.query) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(%err, query = %request.query, "ranked query rejected");
                return SearchResults::default();
            }
        };
        let terms = self.query_terms(&parsed.text, request.field);
        let ranking = ranked::rank(&state.index, &state.norms, &terms, request.field, k, &self.config);
        // a zero window disables proximity
        let window = request.proximity.or(parsed.window).filter(|window| *window > 0);

        match window {
            Some(window) if terms.len() > 1 => {
                let field = match request.field {
                    FieldScope::One(field) => field,
                    FieldScope::All => Field::Content,
                };
                let mut matched = proximity::filter_candidates(state.index.get(field), &terms, window, ranking.candidates);
                let total = matched.len();
                matched.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
                });
                let hits = matched
                    .into_iter()
                    .take(k)
                    .filter_map(|(doc_id, score, positions)| {
                        if field == Field::Content {
                            self.hit(state, doc_id, score, Matches::Exact(&positions))
                        } else {
                            let flat = content_positions(state, doc_id, &terms);
                            self.hit(state, doc_id, score, Matches::Flat(&flat))
                        }
                    })
                    .collect();
                SearchResults { hits, total }
            }
            _ => {
                let hits = ranked::top_k(ranking.candidates, k)
                    .into_iter()
                    .filter_map(|(doc_id, score)| {
                        let flat = content_positions(state, doc_id, &terms);
                        self.hit(state, doc_id, score, Matches::Flat(&flat))
                    })
                    .collect();
                SearchResults { hits, total: ranking.total }
            }
        }
    }

    fn boolean_search(&self, state: &IndexState, request: &SearchRequest, k: usize) -> SearchResults {
        let (text, had_directives) = ParsedQuery::strip_directives(&request.query);
        if had_directives {
            tracing::debug!(query = %request.query, "proximity is not supported by the boolean model");
        }
        let program = boolean::infix_to_postfix(&text);
        let universe = state.docs.universe();
        let mut terms: Vec<String> = Vec::new();
        let matched = boolean::evaluate(
            &program,
            |word| {
                let term = self.query_terms(word, request.field).into_iter().next()?;
                let mut ids = BTreeSet::new();
                for field in request.field.fields() {
                    if let Some(entry) = state.index.get(field).get(&term) {
                        ids.extend(entry.postings.keys().copied());
                    }
                }
                terms.push(term);
                Some(ids)
            },
            &universe,
        );
        let hits = matched
            .iter()
            .take(k)
            .filter_map(|doc_id| {
                let flat = content_positions(state, *doc_id, &terms);
                self.hit(state, *doc_id, 0.0, Matches::Flat(&flat))
            })
            .collect();
        SearchResults { hits, total: matched.len() }
    }

    fn hit(&self, state: &IndexState, doc_id: DocId, score: f64, matches: Matches<'_>) -> Option<SearchHit> {
        let doc = state.docs.get(doc_id)?;
        let tokens = self.normalizer.surface(&doc.content);
        let snippet = (!tokens.is_empty()).then(|| {
            // postings hold token ordinals; snippets are rendered over surface words
            let surface_of: Vec<u32> =
                self.normalizer.normalize(&doc.content, Field::Content).into_iter().map(|t| t.surface).collect();
            let exact = matches!(matches, Matches::Exact(_));
            let (Matches::Flat(ordinals) | Matches::Exact(ordinals)) = matches;
            let mapped: Vec<u32> = ordinals.iter().filter_map(|p| surface_of.get(*p as usize).copied()).collect();
            let matches = if exact { Matches::Exact(&mapped) } else { Matches::Flat(&mapped) };
            snippet::render(&tokens, matches, &SnippetOptions::from(&self.config))
        });
        Some(SearchHit {
            doc_id,
            score,
            title: doc.title.clone(),
            snippet,
            languages: doc.languages.clone(),
            url: doc.url.clone(),
        })
    }
}

/// Union of the content positions of `terms` in one document.
fn content_positions(state: &IndexState, doc_id: DocId, terms: &[String]) -> Vec<u32> {
    let content = state.index.get(Field::Content);
    let unique: BTreeSet<&String> = terms.iter().collect();
    unique
        .into_iter()
        .filter_map(|term| content.posting(term, doc_id))
        .flat_map(|posting| posting.positions.iter().copied())
        .collect()
}
