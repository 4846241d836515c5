//! Insert, delete and partial field update of indexed documents.
//!
//! Every mutation keeps df, idf, per-document weights and the per-field norms
//! consistent. Whenever a term's df changes its idf is recomputed and the new
//! weight is pushed to every document carrying the term, adjusting each of
//! their norms incrementally. Inputs are validated before anything is touched,
//! so a failed call leaves the state as it was.

use crate::document::{Document, DocumentInput, Field};
use crate::error::{Error, Result};
use crate::index::{adjust_norm, idf, log_tf, IndexState, Posting, TermPostings};
use crate::tokenizer::{Normalizer, Token};
use crate::DocId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// term -> ascending positions of its occurrences.
pub type TermPositions = BTreeMap<String, Vec<u32>>;

/// What one field of one document contributes: its terms and the lowercased
/// surface words behind them, which feed auto-suggestion.
#[derive(Debug, Default)]
pub struct FieldTerms {
    pub terms: TermPositions,
    pub words: BTreeSet<String>,
}

pub fn analyze(normalizer: &dyn Normalizer, text: &str, field: Field) -> FieldTerms {
    let surface = normalizer.surface(text);
    let mut analyzed = FieldTerms::default();
    for Token { term, position, surface: word } in normalizer.normalize(text, field) {
        if let Some(word) = surface.get(word as usize) {
            analyzed.words.insert(word.to_lowercase());
        }
        analyzed.terms.entry(term).or_insert_with(Vec::new).push(position);
    }
    for positions in analyzed.terms.values_mut() {
        positions.sort_unstable();
    }
    analyzed
}

fn field_terms(normalizer: &dyn Normalizer, doc: &Document, field: Field) -> FieldTerms {
    analyze(normalizer, &doc.field_text(field), field)
}

/// Recomputes every posting's weight under the term's current idf, adjusting norms.
fn reweight(entry: &mut TermPostings, norms: &mut HashMap<DocId, f64>) {
    let idf = entry.idf;
    for (doc_id, posting) in entry.postings.iter_mut() {
        let weight = posting.tf * idf;
        let norm = norms.entry(*doc_id).or_insert(0.0);
        *norm = adjust_norm(*norm, posting.weight, weight);
        posting.weight = weight;
    }
}

impl IndexState {
    /// Builds an index from scratch: one pass for counts, one for weights and norms.
    pub fn build(normalizer: &dyn Normalizer, inputs: Vec<DocumentInput>) -> Result<Self> {
        let documents = inputs
            .into_iter()
            .map(DocumentInput::into_document)
            .collect::<Result<Vec<_>>>()?;
        let mut state = IndexState::new();
        for doc in documents {
            let doc_id = state.docs.allocate_id();
            for field in Field::ALL {
                let analyzed = field_terms(normalizer, &doc, field);
                state.count_words(&analyzed.words);
                let field_index = state.index.get_mut(field);
                for (term, positions) in analyzed.terms {
                    let entry = field_index.terms.entry(term).or_default();
                    entry.df += 1;
                    let posting = Posting { tf: log_tf(positions.len()), weight: 0.0, positions };
                    entry.postings.insert(doc_id, posting);
                }
            }
            state.docs.insert_with_id(doc_id, doc);
        }

        let n = state.num_docs();
        for field in Field::ALL {
            let mut sums: HashMap<DocId, f64> = HashMap::new();
            for entry in state.index.get_mut(field).terms.values_mut() {
                entry.idf = idf(n, entry.df);
                for (doc_id, posting) in entry.postings.iter_mut() {
                    posting.weight = posting.tf * entry.idf;
                    *sums.entry(*doc_id).or_insert(0.0) += posting.weight * posting.weight;
                }
            }
            *state.norms.get_mut(field) = sums.into_iter().map(|(doc_id, sum)| (doc_id, sum.sqrt())).collect();
        }
        tracing::info!(num_docs = n, "built index");
        Ok(state)
    }

    pub fn insert(&mut self, normalizer: &dyn Normalizer, input: DocumentInput) -> Result<DocId> {
        let doc = input.into_document()?;
        let fields: Vec<(Field, FieldTerms)> =
            Field::ALL.iter().map(|field| (*field, field_terms(normalizer, &doc, *field))).collect();

        let doc_id = self.docs.allocate_id();
        tracing::info!(doc_id, title = %doc.title, "inserting document");
        self.docs.insert_with_id(doc_id, doc);
        let n = self.num_docs();
        for (field, analyzed) in fields {
            self.count_words(&analyzed.words);
            for (term, positions) in analyzed.terms {
                self.add_term(field, doc_id, term, positions, n);
            }
        }
        Ok(doc_id)
    }

    pub fn delete(&mut self, normalizer: &dyn Normalizer, doc_id: DocId) -> Result<Document> {
        let doc = self.docs.get(doc_id).ok_or(Error::NotFound(doc_id))?;
        let fields: Vec<(Field, FieldTerms)> =
            Field::ALL.iter().map(|field| (*field, field_terms(normalizer, doc, *field))).collect();

        tracing::info!(doc_id, title = %doc.title, "deleting document");
        let doc = self.docs.remove(doc_id).ok_or(Error::NotFound(doc_id))?;
        let n = self.num_docs();
        for (field, analyzed) in fields {
            self.uncount_words(&analyzed.words);
            for term in analyzed.terms.keys() {
                self.remove_term(field, doc_id, term, n);
            }
            self.norms.get_mut(field).remove(&doc_id);
        }
        Ok(doc)
    }

    /// Replaces one field's text, touching only the terms whose membership changed.
    pub fn update_field(&mut self, normalizer: &dyn Normalizer, doc_id: DocId, field: Field, text: &str) -> Result<()> {
        let doc = self.docs.get(doc_id).ok_or(Error::NotFound(doc_id))?;
        let old = field_terms(normalizer, doc, field);
        let mut updated = doc.clone();
        updated.set_field_text(field, text);
        let new = field_terms(normalizer, &updated, field);
        let (old_terms, new_terms) = (&old.terms, &new.terms);

        tracing::info!(doc_id, %field, "updating field");
        self.uncount_words(&old.words);
        self.count_words(&new.words);
        let n = self.num_docs();
        for term in old_terms.keys() {
            match new_terms.get(term) {
                Some(positions) => self.retune_term(field, doc_id, term, positions.clone(), n),
                None => self.remove_term(field, doc_id, term, n),
            }
        }
        for (term, positions) in new_terms.iter().filter(|(term, _)| !old_terms.contains_key(*term)) {
            self.add_term(field, doc_id, term.clone(), positions.clone(), n);
        }
        if new_terms.is_empty() {
            self.norms.get_mut(field).remove(&doc_id);
        }
        if let Some(slot) = self.docs.get_mut(doc_id) {
            *slot = updated;
        }
        Ok(())
    }

    fn count_words(&mut self, words: &BTreeSet<String>) {
        for word in words {
            *self.keywords.entry(word.clone()).or_insert(0) += 1;
        }
    }

    fn uncount_words(&mut self, words: &BTreeSet<String>) {
        for word in words {
            if let Some(count) = self.keywords.get_mut(word) {
                *count -= 1;
                if *count == 0 {
                    self.keywords.remove(word);
                }
            }
        }
    }

    /// Adds `doc_id` under `term`; df grows, so every other carrier is reweighted.
    fn add_term(&mut self, field: Field, doc_id: DocId, term: String, positions: Vec<u32>, n: usize) {
        let norms = self.norms.get_mut(field);
        let entry = self.index.get_mut(field).terms.entry(term).or_default();
        entry.df += 1;
        entry.idf = idf(n, entry.df);
        reweight(entry, norms);

        let tf = log_tf(positions.len());
        let weight = tf * entry.idf;
        let norm = norms.entry(doc_id).or_insert(0.0);
        *norm = adjust_norm(*norm, 0.0, weight);
        entry.postings.insert(doc_id, Posting { tf, weight, positions });
    }

    /// Removes `doc_id` from `term`; the term disappears once nobody carries it.
    fn remove_term(&mut self, field: Field, doc_id: DocId, term: &str, n: usize) {
        let norms = self.norms.get_mut(field);
        let terms = &mut self.index.get_mut(field).terms;
        let Some(entry) = terms.get_mut(term) else { return };
        let Some(posting) = entry.postings.remove(&doc_id) else { return };
        if let Some(norm) = norms.get_mut(&doc_id) {
            *norm = adjust_norm(*norm, posting.weight, 0.0);
        }
        entry.df -= 1;
        if entry.df > 0 {
            entry.idf = idf(n, entry.df);
            reweight(entry, norms);
        } else {
            terms.remove(term);
        }
    }

    /// The term stays in the document, so df and idf are untouched; only its tf moves.
    fn retune_term(&mut self, field: Field, doc_id: DocId, term: &str, positions: Vec<u32>, n: usize) {
        if self.index.get(field).posting(term, doc_id).is_none() {
            self.add_term(field, doc_id, term.to_string(), positions, n);
            return;
        }
        let norms = self.norms.get_mut(field);
        let Some(entry) = self.index.get_mut(field).terms.get_mut(term) else { return };
        let idf = entry.idf;
        let Some(posting) = entry.postings.get_mut(&doc_id) else { return };
        let tf = log_tf(positions.len());
        let weight = tf * idf;
        let norm = norms.entry(doc_id).or_insert(0.0);
        *norm = adjust_norm(*norm, posting.weight, weight);
        posting.tf = tf;
        posting.weight = weight;
        posting.positions = positions;
    }
}
