//! Multi-field full-text search: an incrementally maintained TF-IDF inverted
//! index with ranked (cosine), Boolean and proximity retrieval plus snippets.

pub mod boolean;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod maintainer;
pub mod persist;
pub mod proximity;
pub mod query;
pub mod ranked;
pub mod snippet;
pub mod tokenizer;

pub type DocId = u32;

pub use config::{EngineConfig, FieldWeights};
pub use document::{Document, DocumentInput, DocumentStore, Field, FieldScope, PerField};
pub use engine::{IndexStats, SearchEngine};
pub use error::{Error, Result};
pub use index::{FieldIndex, IndexState, InvertedIndex, Keywords, NormTable, Posting, TermPostings};
pub use query::{ParsedQuery, SearchHit, SearchModel, SearchRequest, SearchResults};
pub use tokenizer::{Normalizer, StemmingNormalizer, Token, WhitespaceNormalizer};
