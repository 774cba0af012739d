//! Vector index adapter and its in-process backend.

use crate::embed::{cosine_similarity, Embedder};
use async_trait::async_trait;
use ribo_core::{Document, Result, RiboError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capability interface for nearest-neighbor search over embedded
/// documents.
///
/// Retriever and strategy code depends only on this trait, never on a
/// concrete backend. Implementations are shared read-only across
/// concurrent calls; `close` releases backend resources and makes
/// further searches fail with [`RiboError::ClientClosed`].
#[async_trait]
pub trait VectorSearchClient: Send + Sync {
    /// Similarity search with an optional relevance floor: when
    /// `alpha` is set, results scoring below it are dropped before the
    /// top-`k` cut.
    async fn search_similar(
        &self,
        query: &str,
        k: usize,
        alpha: Option<f64>,
    ) -> Result<Vec<Document>>;

    /// Max-marginal-relevance search: fetch `fetch_k` candidates
    /// (default `max(20, 4 * k)`), then greedily pick `k` balancing
    /// query relevance against redundancy with already-picked results,
    /// weighted by `lambda_mult`.
    async fn search_mmr(
        &self,
        query: &str,
        k: usize,
        lambda_mult: f64,
        fetch_k: Option<usize>,
    ) -> Result<Vec<Document>>;

    /// Release backend resources.
    async fn close(&self) -> Result<()>;
}

const MIN_MMR_FETCH_K: usize = 20;
const MMR_FETCH_K_MULTIPLIER: usize = 4;

/// In-process vector store using brute-force cosine search.
///
/// Documents are embedded once at construction; the store is immutable
/// afterwards, matching the corpus-snapshot model where indices only
/// change between process runs.
pub struct MemoryVectorStore {
    entries: Arc<Vec<(Document, Vec<f32>)>>,
    embedder: Arc<dyn Embedder>,
    closed: AtomicBool,
}

impl MemoryVectorStore {
    /// Embed `docs` and build the store. Queries are embedded with the
    /// same embedder.
    ///
    /// Documents whose content cannot be embedded are skipped with a
    /// debug log rather than failing the whole partition.
    pub fn from_documents(docs: Vec<Document>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            match embedder.embed(&doc.page_content) {
                Ok(vector) => entries.push((doc, vector)),
                Err(e) => debug!(error = %e, "skipping unembeddable document"),
            }
        }
        Ok(Self {
            entries: Arc::new(entries),
            embedder,
            closed: AtomicBool::new(false),
        })
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RiboError::ClientClosed("vector store".to_string()));
        }
        Ok(())
    }
}

/// All entries scored against `query_vec`, best first, ties broken by
/// stable identifier then insertion order.
fn ranked(entries: &[(Document, Vec<f32>)], query_vec: &[f32]) -> Vec<(f64, usize)> {
    let mut scored: Vec<(f64, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, (_, vec))| (f64::from(cosine_similarity(query_vec, vec)), i))
        .collect();
    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| {
                let id_a = entries[a.1].0.stable_id().unwrap_or("\u{10FFFF}");
                let id_b = entries[b.1].0.stable_id().unwrap_or("\u{10FFFF}");
                id_a.cmp(id_b)
            })
            .then(a.1.cmp(&b.1))
    });
    scored
}

#[async_trait]
impl VectorSearchClient for MemoryVectorStore {
    async fn search_similar(
        &self,
        query: &str,
        k: usize,
        alpha: Option<f64>,
    ) -> Result<Vec<Document>> {
        self.ensure_open()?;
        // Embedding plus the full brute-force scan is CPU-bound; keep
        // it off the event loop.
        let entries = Arc::clone(&self.entries);
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Document>> {
            let query_vec = embedder.embed(&query)?;
            let floor = alpha.unwrap_or(f64::NEG_INFINITY);
            Ok(ranked(&entries, &query_vec)
                .into_iter()
                .filter(|(score, _)| *score >= floor)
                .take(k)
                .map(|(_, i)| entries[i].0.clone())
                .collect())
        })
        .await
        .map_err(|e| RiboError::QueryFailed(e.to_string()))?
    }

    async fn search_mmr(
        &self,
        query: &str,
        k: usize,
        lambda_mult: f64,
        fetch_k: Option<usize>,
    ) -> Result<Vec<Document>> {
        self.ensure_open()?;
        let entries = Arc::clone(&self.entries);
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Document>> {
            let query_vec = embedder.embed(&query)?;
            let fetch =
                fetch_k.unwrap_or_else(|| MIN_MMR_FETCH_K.max(MMR_FETCH_K_MULTIPLIER * k));
            let candidates: Vec<usize> = ranked(&entries, &query_vec)
                .into_iter()
                .take(fetch)
                .map(|(_, i)| i)
                .collect();

            let mut picked: Vec<usize> = Vec::with_capacity(k);
            while picked.len() < k && picked.len() < candidates.len() {
                let mut best: Option<(f64, usize)> = None;
                for &cand in &candidates {
                    if picked.contains(&cand) {
                        continue;
                    }
                    let relevance =
                        f64::from(cosine_similarity(&query_vec, &entries[cand].1));
                    let redundancy = picked
                        .iter()
                        .map(|&p| {
                            f64::from(cosine_similarity(&entries[cand].1, &entries[p].1))
                        })
                        .fold(f64::NEG_INFINITY, f64::max)
                        .max(0.0);
                    let mmr = lambda_mult * relevance - (1.0 - lambda_mult) * redundancy;
                    let better = match best {
                        None => true,
                        Some((best_score, best_idx)) => {
                            mmr > best_score || (mmr == best_score && cand < best_idx)
                        }
                    };
                    if better {
                        best = Some((mmr, cand));
                    }
                }
                match best {
                    Some((_, idx)) => picked.push(idx),
                    None => break,
                }
            }

            Ok(picked
                .into_iter()
                .map(|i| entries[i].0.clone())
                .collect())
        })
        .await
        .map_err(|e| RiboError::QueryFailed(e.to_string()))?
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn store() -> MemoryVectorStore {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let docs = vec![
            Document::new("p53 activation triggers apoptosis in damaged cells")
                .with_metadata("stId", "R-HSA-1"),
            Document::new("MDM2 ubiquitinates p53 for proteasomal degradation")
                .with_metadata("stId", "R-HSA-2"),
            Document::new("Glycolysis converts glucose to pyruvate")
                .with_metadata("stId", "R-HSA-3"),
        ];
        MemoryVectorStore::from_documents(docs, embedder).unwrap()
    }

    #[tokio::test]
    async fn similar_search_ranks_by_token_overlap() {
        let store = store();
        let hits = store.search_similar("p53 apoptosis", 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].stable_id(), Some("R-HSA-1"));
    }

    #[tokio::test]
    async fn alpha_floor_filters_weak_matches() {
        let store = store();
        let hits = store
            .search_similar("p53 apoptosis", 10, Some(0.99))
            .await
            .unwrap();
        // Nothing is a near-exact match for the query text itself.
        assert!(hits.len() < store.len());
    }

    #[tokio::test]
    async fn mmr_returns_k_distinct_documents() {
        let store = store();
        let hits = store.search_mmr("p53", 2, 0.5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_ne!(hits[0].stable_id(), hits[1].stable_id());
    }

    #[tokio::test]
    async fn concurrent_searches_share_the_store() {
        let store = Arc::new(store());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.search_similar("p53 apoptosis", 2, None).await })
            })
            .collect();
        for task in tasks {
            let hits = task.await.unwrap().unwrap();
            assert_eq!(hits[0].stable_id(), Some("R-HSA-1"));
        }
    }

    #[tokio::test]
    async fn closed_store_rejects_searches() {
        let store = store();
        store.close().await.unwrap();
        let err = store.search_similar("p53", 1, None).await.unwrap_err();
        assert!(matches!(err, RiboError::ClientClosed(_)));
    }
}
