use crate::document::PerField;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Multipliers applied to each field's cosine score when searching all fields.
pub type FieldWeights = PerField<f64>;

pub fn default_field_weights() -> FieldWeights {
    PerField { title: 1.1, table_of_contents: 1.0, infobox: 0.5, content: 0.5 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Half-width, in tokens, of the snippet window.
    pub snippet_window: usize,
    pub field_weights: FieldWeights,
    /// Each field contributes its top `candidate_factor * k` documents to the all-fields merge.
    pub candidate_factor: usize,
    pub default_k: usize,
    pub max_k: usize,
    pub highlight_open: String,
    pub highlight_close: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snippet_window: 30,
            field_weights: default_field_weights(),
            candidate_factor: 2,
            default_k: 10,
            max_k: 100,
            highlight_open: "<em>".into(),
            highlight_close: "</em>".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn clamp_k(&self, k: usize) -> usize {
        k.clamp(1, self.max_k.max(1))
    }
}
