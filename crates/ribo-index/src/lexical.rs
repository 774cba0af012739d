//! Okapi BM25 lexical index over one sub-collection.

use ribo_core::{Document, Result, RiboError};
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Term-frequency index over a fixed document corpus.
///
/// Built once from a partition's document set and shared read-only
/// afterwards. Search is CPU-bound and synchronous; callers offload it
/// to a worker thread so it does not block the event loop.
pub struct Bm25Index {
    docs: Vec<Document>,
    doc_terms: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    df: HashMap<String, usize>,
    avg_len: f64,
}

impl Bm25Index {
    /// Build the index from a document corpus.
    pub fn build(docs: Vec<Document>) -> Result<Self> {
        if docs.is_empty() {
            return Err(RiboError::IndexNotReady(
                "cannot build a lexical index over an empty corpus".to_string(),
            ));
        }

        let mut doc_terms = Vec::with_capacity(docs.len());
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut df: HashMap<String, usize> = HashMap::new();

        for doc in &docs {
            let tokens = tokenize(&doc.page_content);
            let mut counts: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len());
            doc_terms.push(counts);
        }

        let avg_len = doc_lens.iter().sum::<usize>() as f64 / doc_lens.len().max(1) as f64;

        Ok(Self {
            docs,
            doc_terms,
            doc_lens,
            df,
            avg_len,
        })
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Return the top `k` documents for `query`, best first.
    ///
    /// Ties break by stable identifier (documents without one sort
    /// last among equals), so repeated searches are deterministic.
    pub fn search(&self, query: &str, k: usize) -> Vec<Document> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f64;
        let mut scored: Vec<(f64, usize)> = Vec::new();

        for (i, counts) in self.doc_terms.iter().enumerate() {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = *counts.get(term).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let df = *self.df.get(term).unwrap_or(&0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let len_norm = 1.0 - B + B * self.doc_lens[i] as f64 / self.avg_len;
                score += idf * tf * (K1 + 1.0) / (tf + K1 * len_norm);
            }
            if score > 0.0 {
                scored.push((score, i));
            }
        }

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0).then_with(|| {
                let id_a = self.docs[a.1].stable_id().unwrap_or("\u{10FFFF}");
                let id_b = self.docs[b.1].stable_id().unwrap_or("\u{10FFFF}");
                id_a.cmp(id_b)
            })
        });

        scored
            .into_iter()
            .take(k)
            .map(|(_, i)| self.docs[i].clone())
            .collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("TP53 regulates transcription of cell cycle genes. p53 activation.")
                .with_metadata("stId", "R-HSA-1"),
            Document::new("Glycolysis converts glucose to pyruvate in the cytosol.")
                .with_metadata("stId", "R-HSA-2"),
            Document::new("MDM2 binds p53 and targets it for degradation.")
                .with_metadata("stId", "R-HSA-3"),
        ]
    }

    #[test]
    fn matching_terms_rank_first() {
        let index = Bm25Index::build(corpus()).unwrap();
        let hits = index.search("p53 activation", 3);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].stable_id(), Some("R-HSA-1"));
        assert!(hits.iter().all(|d| d.stable_id() != Some("R-HSA-2")));
    }

    #[test]
    fn no_match_yields_empty_result() {
        let index = Bm25Index::build(corpus()).unwrap();
        assert!(index.search("ribosome biogenesis", 5).is_empty());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(
            Bm25Index::build(Vec::new()),
            Err(RiboError::IndexNotReady(_))
        ));
    }

    #[test]
    fn search_is_deterministic() {
        let index = Bm25Index::build(corpus()).unwrap();
        let a: Vec<_> = index
            .search("p53", 3)
            .iter()
            .filter_map(|d| d.stable_id().map(str::to_owned))
            .collect();
        let b: Vec<_> = index
            .search("p53", 3)
            .iter()
            .filter_map(|d| d.stable_id().map(str::to_owned))
            .collect();
        assert_eq!(a, b);
    }
}
