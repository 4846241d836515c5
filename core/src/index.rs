use crate::document::{DocumentStore, PerField};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One document's entry under a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Log-scaled term frequency, `1 + log10(count)`.
    pub tf: f64,
    /// `tf * idf` as of the last time this term's idf changed.
    pub weight: f64,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermPostings {
    pub df: u32,
    pub idf: f64,
    pub postings: BTreeMap<DocId, Posting>, // ordered by doc id
}

/// term -> postings for a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldIndex {
    pub terms: HashMap<String, TermPostings>,
}

impl FieldIndex {
    pub fn get(&self, term: &str) -> Option<&TermPostings> { self.terms.get(term) }

    pub fn posting(&self, term: &str, doc_id: DocId) -> Option<&Posting> {
        self.terms.get(term)?.postings.get(&doc_id)
    }

    pub fn idf(&self, term: &str) -> Option<f64> { self.terms.get(term).map(|t| t.idf) }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
}

pub type InvertedIndex = PerField<FieldIndex>;

/// doc id -> Euclidean norm of the document's weight vector, per field.
pub type NormTable = PerField<HashMap<DocId, f64>>;

/// Lowercased surface word -> number of (document, field) pairs it appears in.
pub type Keywords = BTreeMap<String, u32>;

/// Everything a search reads and a mutation writes, guarded as one unit.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    pub index: InvertedIndex,
    pub norms: NormTable,
    pub docs: DocumentStore,
    pub keywords: Keywords,
}

pub fn log_tf(count: usize) -> f64 {
    1.0 + (count as f64).log10()
}

pub fn idf(num_docs: usize, df: u32) -> f64 {
    (num_docs as f64 / df as f64).log10()
}

/// `sqrt(norm^2 - old^2 + new^2)`, clamped so rounding never takes it below zero.
pub fn adjust_norm(norm: f64, old_weight: f64, new_weight: f64) -> f64 {
    (norm * norm - old_weight * old_weight + new_weight * new_weight).max(0.0).sqrt()
}

impl IndexState {
    pub fn new() -> Self { Self::default() }

    pub fn num_docs(&self) -> usize { self.docs.len() }

    /// Verifies the statistical invariants, returning a description of the first violation.
    pub fn check_invariants(&self, tolerance: f64) -> std::result::Result<(), String> {
        for free in self.docs.freed_ids() {
            if self.docs.contains(*free) {
                return Err(format!("freed id {free} is still in use"));
            }
        }
        for (field, field_index) in self.index.iter() {
            let mut sums: HashMap<DocId, f64> = HashMap::new();
            for (term, entry) in &field_index.terms {
                if entry.df == 0 {
                    return Err(format!("{field}: term `{term}` has df 0"));
                }
                if entry.df as usize != entry.postings.len() {
                    return Err(format!(
                        "{field}: term `{term}` has df {} but {} postings",
                        entry.df,
                        entry.postings.len()
                    ));
                }
                for (doc_id, posting) in &entry.postings {
                    if !self.docs.contains(*doc_id) {
                        return Err(format!("{field}: term `{term}` points at unknown document {doc_id}"));
                    }
                    *sums.entry(*doc_id).or_insert(0.0) += posting.weight * posting.weight;
                }
            }
            let norms = self.norms.get(field);
            for (doc_id, sum) in &sums {
                let expected = sum.sqrt();
                let actual = norms.get(doc_id).copied().unwrap_or(f64::NAN);
                if !((actual - expected).abs() <= tolerance) {
                    return Err(format!("{field}: norm of document {doc_id} is {actual}, expected {expected}"));
                }
            }
            if let Some(stray) = norms.keys().find(|doc_id| !sums.contains_key(doc_id)) {
                return Err(format!("{field}: norm kept for document {stray} without postings"));
            }
        }
        if let Some(word) = self.keywords.iter().find(|(_, count)| **count == 0).map(|(word, _)| word) {
            return Err(format!("keyword `{word}` is kept with a zero count"));
        }
        Ok(())
    }

    /// Indexed words starting with `prefix`, alphabetically.
    pub fn suggestions(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.keywords
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .map(|(word, _)| word)
            .take_while(|word| word.starts_with(prefix))
            .take(limit)
            .cloned()
            .collect()
    }
}
