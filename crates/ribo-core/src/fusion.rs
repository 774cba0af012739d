//! Reciprocal Rank Fusion over ranked result lists.
//!
//! Raw similarity scores from the lexical index, the vector index and
//! the graph are not comparable, so fusion consumes only rank
//! position: an item at 0-based rank `r` contributes
//! `1 / (lambda + r + 1)` to its identifier's accumulated score, summed
//! over every list it appears in. Ties break by identifier string, so
//! output is deterministic for identical inputs.

use std::collections::BTreeMap;

/// The result of one fusion call.
#[derive(Debug, Clone)]
pub struct FusionOutcome<T> {
    /// The top `final_k` representative items, best first.
    pub items: Vec<T>,
    /// Stable identifiers of `items`, in the same order.
    pub ids: Vec<String>,
    /// The full accumulated score table, including identifiers that
    /// did not make the cut.
    pub scores: BTreeMap<String, f64>,
}

/// Fuse `ranked_lists` into a single ranking.
///
/// - `id_of` extracts the stable identifier from an item; items where
///   it returns `None` are skipped entirely (never scored, never
///   deduplicated in).
/// - When `rrf_k` is set, only the first `rrf_k` items of each list
///   are considered; an identifier dropped from every list by the
///   cutoff is absent from the output even if present in a raw tail.
/// - The first-seen item for each identifier is retained as its
///   representative; later occurrences do not overwrite it.
/// - Output order is descending accumulated score, then ascending
///   identifier.
///
/// Input list order has no effect beyond rank position within each
/// list, so concurrent search arrival order never changes the result.
pub fn reciprocal_rank_fusion<T, F>(
    ranked_lists: Vec<Vec<T>>,
    id_of: F,
    final_k: usize,
    lambda: f64,
    rrf_k: Option<usize>,
) -> FusionOutcome<T>
where
    F: Fn(&T) -> Option<String>,
{
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    let mut representatives: BTreeMap<String, T> = BTreeMap::new();

    for ranked in ranked_lists {
        let considered = match rrf_k {
            Some(cutoff) => ranked.into_iter().take(cutoff).collect::<Vec<_>>(),
            None => ranked,
        };
        for (rank, item) in considered.into_iter().enumerate() {
            let Some(id) = id_of(&item) else {
                continue;
            };
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (lambda + rank as f64 + 1.0);
            representatives.entry(id).or_insert(item);
        }
    }

    let mut ordered: Vec<(&String, &f64)> = scores.iter().collect();
    // Descending score, ascending identifier; scores are finite sums
    // of positive reciprocals so total_cmp is exact here.
    ordered.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let ids: Vec<String> = ordered
        .into_iter()
        .take(final_k)
        .map(|(id, _)| id.clone())
        .collect();
    let items: Vec<T> = ids
        .iter()
        .filter_map(|id| representatives.remove(id))
        .collect();

    FusionOutcome { items, ids, scores }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn doc(id: &str, text: &str) -> Document {
        Document::new(text).with_metadata("stId", id)
    }

    fn by_stable_id(d: &Document) -> Option<String> {
        d.stable_id().map(str::to_owned)
    }

    #[test]
    fn fusion_is_deterministic() {
        let lists = || {
            vec![
                vec![doc("a", "1"), doc("b", "2"), doc("c", "3")],
                vec![doc("c", "3"), doc("a", "1"), doc("d", "4")],
            ]
        };
        let first = reciprocal_rank_fusion(lists(), by_stable_id, 10, 60.0, None);
        let second = reciprocal_rank_fusion(lists(), by_stable_id, 10, 60.0, None);
        assert_eq!(first.ids, second.ids);
        assert_eq!(first.scores, second.scores);
    }

    #[test]
    fn more_lists_never_rank_lower() {
        // "a" appears at rank 1 in both lists, "b" at rank 1 in only
        // one; "a" must not fuse below "b".
        let lists = vec![
            vec![doc("x", ""), doc("a", "")],
            vec![doc("y", ""), doc("a", "")],
            vec![doc("z", ""), doc("b", "")],
        ];
        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, None);
        let pos = |id: &str| outcome.ids.iter().position(|i| i == id).unwrap();
        assert!(pos("a") < pos("b"));
    }

    #[test]
    fn items_without_identifier_are_excluded() {
        let lists = vec![vec![
            Document::new("anonymous, rank 0"),
            doc("a", "identified, rank 1"),
        ]];
        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, None);
        assert_eq!(outcome.ids, vec!["a".to_string()]);
        assert_eq!(outcome.items.len(), 1);
        assert!(!outcome.scores.is_empty());
    }

    #[test]
    fn cutoff_drops_list_tails_entirely() {
        let lists = vec![
            vec![doc("a", ""), doc("b", ""), doc("tail", "")],
            vec![doc("b", ""), doc("a", ""), doc("tail", "")],
        ];
        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, Some(2));
        assert!(!outcome.scores.contains_key("tail"));
        assert!(!outcome.ids.contains(&"tail".to_string()));
    }

    #[test]
    fn first_seen_representative_is_retained() {
        let lists = vec![
            vec![doc("a", "first occurrence")],
            vec![doc("a", "second occurrence")],
        ];
        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, None);
        assert_eq!(outcome.items[0].page_content, "first occurrence");
    }

    #[test]
    fn ties_break_by_identifier_order() {
        let lists = vec![vec![doc("beta", "")], vec![doc("alpha", "")]];
        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, None);
        assert_eq!(outcome.ids, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn shared_ids_across_paraphrases_dominate_fused_top() {
        // Four paraphrase result lists of 20 items sharing 5 common
        // identifiers; those 5 must occupy the top 5 of the fused 10.
        let common = ["c1", "c2", "c3", "c4", "c5"];
        let lists: Vec<Vec<Document>> = (0..4)
            .map(|list_no| {
                let mut list = Vec::new();
                for (i, id) in common.iter().enumerate() {
                    // Spread the common ids across ranks per list.
                    let rank_slot = (i + list_no) % common.len();
                    list.push((rank_slot, doc(id, "")));
                }
                for i in 0..15 {
                    list.push((common.len() + i, doc(&format!("u{}-{}", list_no, i), "")));
                }
                list.sort_by_key(|(slot, _)| *slot);
                list.into_iter().map(|(_, d)| d).collect()
            })
            .collect();
        assert!(lists.iter().all(|l| l.len() == 20));

        let outcome = reciprocal_rank_fusion(lists, by_stable_id, 10, 60.0, None);
        assert_eq!(outcome.ids.len(), 10);
        let top5: Vec<&str> = outcome.ids.iter().take(5).map(String::as_str).collect();
        for id in common {
            assert!(top5.contains(&id), "{id} missing from fused top 5: {top5:?}");
        }
    }
}
