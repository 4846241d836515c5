use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use search_core::persist::IndexPaths;
use search_core::{DocumentInput, EngineConfig, Field, IndexState, SearchEngine, StemmingNormalizer};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and maintain a multi-field TF-IDF index", long_about = None)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh index from JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Insert every document of a JSON/JSONL file into an existing index
    Add {
        #[arg(long)]
        index: String,
        #[arg(long)]
        input: String,
    },
    /// Remove a document
    Delete {
        #[arg(long)]
        index: String,
        #[arg(long)]
        id: u32,
    },
    /// Replace the text of one field (chapters are newline separated)
    Update {
        #[arg(long)]
        index: String,
        #[arg(long)]
        id: u32,
        #[arg(long)]
        field: Field,
        #[arg(long)]
        text: String,
    },
    /// Check df and norm consistency of a saved index
    Verify {
        #[arg(long)]
        index: String,
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { input, output } => build_index(&input, &output, config),
        Commands::Add { index, input } => {
            let (engine, paths) = open(&index, config)?;
            let mut added = 0usize;
            for doc in read_documents(Path::new(&input))? {
                let doc_id = engine.insert(doc)?;
                tracing::debug!(doc_id, "added");
                added += 1;
            }
            engine.save(&paths)?;
            tracing::info!(added, "documents added");
            Ok(())
        }
        Commands::Delete { index, id } => {
            let (engine, paths) = open(&index, config)?;
            engine.delete(id)?;
            engine.save(&paths)?;
            Ok(())
        }
        Commands::Update { index, id, field, text } => {
            let (engine, paths) = open(&index, config)?;
            engine.update_field(id, field, &text)?;
            engine.save(&paths)?;
            Ok(())
        }
        Commands::Verify { index, tolerance } => {
            let (engine, _) = open(&index, config)?;
            if let Err(violation) = engine.check_invariants(tolerance) {
                bail!("index is inconsistent: {violation}");
            }
            let stats = engine.stats();
            tracing::info!(num_docs = stats.num_docs, next_fresh_id = stats.next_fresh_id, "index is consistent");
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn open(index: &str, config: EngineConfig) -> Result<(SearchEngine, IndexPaths)> {
    let paths = IndexPaths::new(index);
    let engine = SearchEngine::open(&paths, Arc::new(StemmingNormalizer::default()), config)
        .with_context(|| format!("opening index at {index}"))?;
    Ok((engine, paths))
}

fn build_index(input: &str, output: &str, config: EngineConfig) -> Result<()> {
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {input} does not exist");
    }

    let mut documents = Vec::new();
    for file in files {
        documents.extend(read_documents(&file).with_context(|| format!("reading {}", file.display()))?);
    }
    tracing::info!(num_docs = documents.len(), "ingested documents");

    let normalizer = Arc::new(StemmingNormalizer::default());
    let state = IndexState::build(normalizer.as_ref(), documents)?;
    let engine = SearchEngine::with_state(normalizer, config, state);
    engine.save(&IndexPaths::new(output))?;
    tracing::info!(output, "index build complete");
    Ok(())
}

/// Documents from a JSONL file, a JSON array, or a single JSON object.
fn read_documents(file: &Path) -> Result<Vec<DocumentInput>> {
    let reader = BufReader::new(File::open(file)?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<DocumentInput>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}
