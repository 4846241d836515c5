use crate::index::FieldIndex;
use crate::DocId;

/// Finds one position per list, strictly increasing, with every consecutive gap at most
/// `window`. Depth-first over the lists in order, so the first hit is the
/// lexicographically smallest valid combination.
pub fn find_combination(lists: &[&[u32]], window: u32) -> Option<Vec<u32>> {
    fn descend(lists: &[&[u32]], window: u32, chosen: &mut Vec<u32>) -> bool {
        let depth = chosen.len();
        if depth == lists.len() {
            return true;
        }
        let previous = chosen.last().copied();
        for &position in lists[depth] {
            if let Some(prev) = previous {
                if position <= prev {
                    continue;
                }
                if position - prev > window {
                    break;
                }
            }
            chosen.push(position);
            if descend(lists, window, chosen) {
                return true;
            }
            chosen.pop();
        }
        false
    }

    if lists.is_empty() || lists.iter().any(|list| list.is_empty()) {
        return None;
    }
    let mut chosen = Vec::with_capacity(lists.len());
    descend(lists, window, &mut chosen).then_some(chosen)
}

/// Keeps the candidates whose `field` holds every term within `window` of the previous
/// one, returning each survivor with its score and the matched positions.
pub fn filter_candidates(
    field_index: &FieldIndex,
    terms: &[String],
    window: u32,
    candidates: impl IntoIterator<Item = (DocId, f64)>,
) -> Vec<(DocId, f64, Vec<u32>)> {
    let mut matched = Vec::new();
    for (doc_id, score) in candidates {
        let lists: Option<Vec<&[u32]>> = terms
            .iter()
            .map(|term| field_index.posting(term, doc_id).map(|p| p.positions.as_slice()))
            .collect();
        let Some(lists) = lists else { continue };
        if let Some(positions) = find_combination(&lists, window) {
            matched.push((doc_id, score, positions));
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentInput, Field};
    use crate::index::IndexState;
    use crate::tokenizer::WhitespaceNormalizer;

    #[test]
    fn respects_window() {
        let a: &[u32] = &[0];
        let b: &[u32] = &[8];
        assert_eq!(find_combination(&[a, b], 7), None);
        assert_eq!(find_combination(&[a, b], 8), Some(vec![0, 8]));
    }

    #[test]
    fn requires_term_order() {
        let a: &[u32] = &[5];
        let b: &[u32] = &[3];
        assert_eq!(find_combination(&[a, b], 10), None);
    }

    #[test]
    fn backtracks_to_a_later_start() {
        let a: &[u32] = &[0, 10];
        let b: &[u32] = &[11, 30];
        let c: &[u32] = &[12];
        assert_eq!(find_combination(&[a, b, c], 1), Some(vec![10, 11, 12]));
    }

    #[test]
    fn phrase_needs_adjacent_positions() {
        let a: &[u32] = &[1, 4];
        let b: &[u32] = &[3, 5];
        assert_eq!(find_combination(&[a, b], 1), Some(vec![4, 5]));
    }

    #[test]
    fn empty_lists_never_match() {
        let a: &[u32] = &[];
        let b: &[u32] = &[1];
        assert_eq!(find_combination(&[a, b], 5), None);
        assert_eq!(find_combination(&[], 5), None);
    }

    #[test]
    fn filters_documents_missing_a_term() {
        let inputs = vec![
            DocumentInput::new("t", "a x x x x x x x b"),
            DocumentInput::new("t", "a b"),
            DocumentInput::new("t", "a only"),
        ];
        let state = IndexState::build(&WhitespaceNormalizer, inputs).unwrap();
        let terms = vec!["a".to_string(), "b".to_string()];
        let content = state.index.get(Field::Content);
        let candidates = vec![(0, 0.5), (1, 0.9), (2, 0.1)];
        let tight: Vec<DocId> = filter_candidates(content, &terms, 7, candidates.clone()).into_iter().map(|m| m.0).collect();
        assert_eq!(tight, vec![1]);
        let wide = filter_candidates(content, &terms, 8, candidates);
        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0], (0, 0.5, vec![0, 8]));
    }
}
