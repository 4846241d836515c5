//! Vector-space ranking: cosine similarity between a tf-idf query vector and the
//! stored document vectors of one field, or a weighted merge across all fields.

use crate::config::EngineConfig;
use crate::document::{Field, FieldScope};
use crate::index::{log_tf, FieldIndex, InvertedIndex, NormTable};
use crate::DocId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Query weights per distinct term, plus the vector's norm.
#[derive(Debug, Clone, Default)]
pub struct QueryVector {
    pub weights: BTreeMap<String, f64>,
    pub norm: f64,
}

impl QueryVector {
    /// Terms missing from the field get weight 0.
    pub fn build(field_index: &FieldIndex, terms: &[String]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for term in terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        let weights: BTreeMap<String, f64> = counts
            .into_iter()
            .map(|(term, count)| {
                let idf = field_index.idf(term).unwrap_or(0.0);
                (term.to_string(), log_tf(count) * idf)
            })
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        Self { weights, norm }
    }
}

/// Cosine scores for one field. Documents with an undefined cosine (zero query or
/// document norm) are left out.
pub fn score_field(field_index: &FieldIndex, norms: &HashMap<DocId, f64>, terms: &[String]) -> HashMap<DocId, f64> {
    let query = QueryVector::build(field_index, terms);
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    if query.norm == 0.0 {
        return scores;
    }
    for (term, query_weight) in &query.weights {
        let Some(entry) = field_index.get(term) else { continue };
        for (doc_id, posting) in &entry.postings {
            *scores.entry(*doc_id).or_insert(0.0) += query_weight * posting.weight;
        }
    }
    scores.retain(|doc_id, score| match norms.get(doc_id) {
        Some(doc_norm) if *doc_norm > 0.0 => {
            *score /= query.norm * doc_norm;
            true
        }
        _ => false,
    });
    scores
}

/// Highest scores first; ties go to the lower id. Returns everything when `k` exceeds the candidates.
pub fn top_k(scores: impl IntoIterator<Item = (DocId, f64)>, k: usize) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

/// Scored candidates before the final cut.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub candidates: HashMap<DocId, f64>,
    /// Distinct documents scored in any searched field.
    pub total: usize,
}

pub fn rank(
    index: &InvertedIndex,
    norms: &NormTable,
    terms: &[String],
    scope: FieldScope,
    k: usize,
    config: &EngineConfig,
) -> Ranking {
    match scope {
        FieldScope::One(field) => {
            let candidates = score_field(index.get(field), norms.get(field), terms);
            Ranking { total: candidates.len(), candidates }
        }
        FieldScope::All => {
            let widened = k.saturating_mul(config.candidate_factor.max(1));
            let mut seen: HashSet<DocId> = HashSet::new();
            let mut candidates: HashMap<DocId, f64> = HashMap::new();
            for field in Field::ALL {
                let scores = score_field(index.get(field), norms.get(field), terms);
                seen.extend(scores.keys().copied());
                let weight = *config.field_weights.get(field);
                for (doc_id, score) in top_k(scores, widened) {
                    *candidates.entry(doc_id).or_insert(0.0) += score * weight;
                }
            }
            Ranking { candidates, total: seen.len() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentInput;
    use crate::index::IndexState;
    use crate::tokenizer::WhitespaceNormalizer;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn state(contents: &[&str]) -> IndexState {
        let inputs = contents.iter().map(|c| DocumentInput::new("t", *c)).collect();
        IndexState::build(&WhitespaceNormalizer, inputs).unwrap()
    }

    #[test]
    fn densest_document_ranks_first() {
        let s = state(&["rust rust rust rust go", "rust python java", "go java"]);
        let scores = score_field(s.index.get(Field::Content), s.norms.get(Field::Content), &terms(&["rust"]));
        let ranked = top_k(scores, 10);
        assert_eq!(ranked[0].0, 0);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn single_term_document_has_unit_cosine() {
        let s = state(&["alpha", "beta", "gamma"]);
        let scores = score_field(s.index.get(Field::Content), s.norms.get(Field::Content), &terms(&["alpha"]));
        assert!((scores[&0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_terms_score_nothing() {
        let s = state(&["alpha", "beta"]);
        let scores = score_field(s.index.get(Field::Content), s.norms.get(Field::Content), &terms(&["zeta"]));
        assert!(scores.is_empty());
    }

    #[test]
    fn top_k_returns_all_when_k_is_large() {
        let ranked = top_k(vec![(1, 0.2), (2, 0.9), (3, 0.2)], 10);
        assert_eq!(ranked, vec![(2, 0.9), (1, 0.2), (3, 0.2)]);
        assert_eq!(top_k(vec![(1, 0.2), (2, 0.9)], 1), vec![(2, 0.9)]);
    }

    #[test]
    fn all_fields_weights_title_matches_higher() {
        let inputs = vec![
            DocumentInput::new("witcher", "monster hunting"),
            DocumentInput::new("sorceress", "the witcher met her"),
            DocumentInput::new("kingdom", "politics"),
        ];
        let s = IndexState::build(&WhitespaceNormalizer, inputs).unwrap();
        let ranking = rank(&s.index, &s.norms, &terms(&["witcher"]), FieldScope::All, 10, &EngineConfig::default());
        assert_eq!(ranking.total, 2);
        let ranked = top_k(ranking.candidates, 10);
        assert_eq!(ranked[0].0, 0);
    }
}
