use crate::document::FieldScope;
use crate::error::{Error, Result};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchModel {
    #[default]
    Ranked,
    Boolean,
}

impl FromStr for SearchModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranked" | "tfidf" | "vector" => Ok(SearchModel::Ranked),
            "boolean" | "bool" => Ok(SearchModel::Boolean),
            other => Err(Error::MalformedQuery(format!("unknown search model `{other}`"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub field: FieldScope,
    pub k: usize,
    pub model: SearchModel,
    /// Overrides any window written into the query text.
    pub proximity: Option<u32>,
}

impl SearchRequest {
    pub fn ranked(query: impl Into<String>, k: usize) -> Self {
        Self { query: query.into(), field: FieldScope::All, k, model: SearchModel::Ranked, proximity: None }
    }

    pub fn boolean(query: impl Into<String>, k: usize) -> Self {
        Self { model: SearchModel::Boolean, ..Self::ranked(query, k) }
    }

    pub fn in_field(mut self, field: FieldScope) -> Self {
        self.field = field;
        self
    }

    pub fn within(mut self, window: u32) -> Self {
        self.proximity = Some(window);
        self
    }
}

/// Free text with its proximity directives pulled out: a trailing `~N` sets the
/// window, quotes ask for an exact phrase (window 1) unless `~N` is also given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: String,
    pub window: Option<u32>,
}

impl ParsedQuery {
    pub fn parse(raw: &str) -> Result<Self> {
        let (body, window) = match raw.rsplit_once('~') {
            Some((body, suffix)) => {
                let window = suffix
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| Error::MalformedQuery(format!("proximity `{}` is not a number", suffix.trim())))?;
                (body, Some(window))
            }
            None => (raw, None),
        };
        let quoted = body.contains('"');
        let text = body.replace('"', " ").split_whitespace().collect::<Vec<_>>().join(" ");
        let window = window.or(if quoted { Some(1) } else { None });
        Ok(Self { text, window })
    }

    /// Boolean queries have no notion of distance; directives are dropped.
    pub fn strip_directives(raw: &str) -> (String, bool) {
        let had_directives = raw.contains('"') || raw.contains('~');
        let body = raw.split('~').next().unwrap_or_default().replace('"', " ");
        (body, had_directives)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub snippet: Option<String>,
    pub languages: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Matches before the top-k cut.
    pub total: usize,
}

impl SearchResults {
    pub fn ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|hit| hit.doc_id).collect()
    }
}
