//! Hybrid lexical + vector retrieval over corpus partitions.
//!
//! Each partition carries one BM25 index and one vector store. A call
//! fans out every (query, subsystem) pair concurrently, fuses the
//! gathered lists per partition with Reciprocal Rank Fusion, and
//! concatenates the partition blobs in discovery order. The blob is a
//! flattened context for the generation layer, not a single ranked
//! list, so partition order follows discovery, never score.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use ribo_core::config::ProteinRetrievalConfig;
use ribo_core::fusion::reciprocal_rank_fusion;
use ribo_core::{Document, Result, RiboError};
use ribo_index::embed::Embedder;
use ribo_index::{
    discover_partitions, load_csv_documents, Bm25Index, MemoryVectorStore, VectorSearchClient,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One sub-collection with its subsystems. A subsystem that failed to
/// build is simply absent; the partition still participates with
/// whatever remains.
pub struct HybridPartition {
    name: String,
    lexical: Option<Arc<Bm25Index>>,
    vector: Option<Arc<dyn VectorSearchClient>>,
}

impl HybridPartition {
    pub fn new(
        name: impl Into<String>,
        lexical: Option<Arc<Bm25Index>>,
        vector: Option<Arc<dyn VectorSearchClient>>,
    ) -> Self {
        Self {
            name: name.into(),
            lexical,
            vector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// See the module docs.
pub struct HybridRetriever {
    partitions: Vec<HybridPartition>,
    config: ProteinRetrievalConfig,
}

impl HybridRetriever {
    /// Assemble from already-built partitions. Order is preserved as
    /// the discovery order of the final blob.
    pub fn new(partitions: Vec<HybridPartition>, config: ProteinRetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { partitions, config })
    }

    /// Build both subsystems for each named document set. A subsystem
    /// that cannot be built is logged and left out; the partition keeps
    /// running on the other one.
    pub fn from_documents(
        parts: Vec<(String, Vec<Document>)>,
        embedder: Arc<dyn Embedder>,
        config: ProteinRetrievalConfig,
    ) -> Result<Self> {
        let mut partitions = Vec::with_capacity(parts.len());
        for (name, docs) in parts {
            let lexical = match Bm25Index::build(docs.clone()) {
                Ok(index) => Some(Arc::new(index)),
                Err(e) => {
                    warn!(partition = %name, error = %e, "lexical index unavailable");
                    None
                }
            };
            let vector = match MemoryVectorStore::from_documents(docs, Arc::clone(&embedder)) {
                Ok(store) => Some(Arc::new(store) as Arc<dyn VectorSearchClient>),
                Err(e) => {
                    warn!(partition = %name, error = %e, "vector store unavailable");
                    None
                }
            };
            partitions.push(HybridPartition::new(name, lexical, vector));
        }
        Self::new(partitions, config)
    }

    /// Build from an on-disk corpus snapshot, one partition per CSV.
    pub fn from_snapshot(
        snapshot_dir: &Path,
        embedder: Arc<dyn Embedder>,
        config: ProteinRetrievalConfig,
    ) -> Result<Self> {
        let mut parts = Vec::new();
        for source in discover_partitions(snapshot_dir)? {
            let docs = load_csv_documents(&source)?;
            parts.push((source.name, docs));
        }
        Self::from_documents(parts, embedder, config)
    }

    /// Retrieve fused context for one query and its paraphrases.
    ///
    /// An empty or whitespace-only query is a programmer error and is
    /// rejected. Empty paraphrases are dropped silently.
    pub async fn ainvoke(&self, query: &str, expanded_queries: &[String]) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RiboError::EmptyQuery);
        }
        let mut query_set: Vec<&str> = vec![query];
        query_set.extend(
            expanded_queries
                .iter()
                .map(String::as_str)
                .filter(|q| !q.trim().is_empty()),
        );

        let partition_futures = self
            .partitions
            .iter()
            .map(|partition| self.search_partition(partition, &query_set));
        let blobs = join_all(partition_futures).await;

        Ok(blobs
            .into_iter()
            .filter(|blob| !blob.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Fan out every (query, subsystem) pair for one partition, fuse,
    /// and render the partition's paragraph blob.
    async fn search_partition(&self, partition: &HybridPartition, queries: &[&str]) -> String {
        let cfg = &self.config.vector;
        let mut searches: Vec<BoxFuture<'_, (&'static str, Result<Vec<Document>>)>> = Vec::new();
        for query in queries {
            if let Some(index) = &partition.lexical {
                let index = Arc::clone(index);
                let query = query.to_string();
                let k = cfg.rrf_per_query_k;
                searches.push(
                    async move {
                        // BM25 lookup is CPU-bound; keep it off the
                        // event loop.
                        let joined = tokio::task::spawn_blocking(move || index.search(&query, k))
                            .await
                            .map_err(|e| RiboError::QueryFailed(e.to_string()));
                        ("lexical", joined)
                    }
                    .boxed(),
                );
            }
            if let Some(vector) = &partition.vector {
                let vector = Arc::clone(vector);
                let query = query.to_string();
                let k = cfg.rrf_per_query_k;
                let alpha = cfg.rrf_alpha;
                searches.push(
                    async move {
                        let hits = vector.search_similar(&query, k, Some(alpha)).await;
                        ("vector", hits)
                    }
                    .boxed(),
                );
            }
        }

        // A failing search is excluded from fusion, never fatal for
        // the partition.
        let mut ranked_lists = Vec::new();
        for (subsystem, outcome) in join_all(searches).await {
            match outcome {
                Ok(list) => ranked_lists.push(list),
                Err(e) => {
                    warn!(partition = %partition.name, subsystem, error = %e, "search failed")
                }
            }
        }
        if ranked_lists.is_empty() {
            return String::new();
        }

        let fused = reciprocal_rank_fusion(
            ranked_lists,
            |doc: &Document| doc.stable_id().map(str::to_owned),
            cfg.rrf_final_k,
            cfg.rrf_lambda,
            cfg.rrf_cutoff_k,
        );
        debug!(
            partition = %partition.name,
            fused = fused.items.len(),
            "partition fusion complete"
        );

        fused
            .items
            .iter()
            .map(|doc| doc.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Close every partition's vector store. Failures are logged; the
    /// first one is returned after all partitions have been attempted.
    pub async fn close(&self) -> Result<()> {
        let mut first_err = None;
        for partition in &self.partitions {
            if let Some(vector) = &partition.vector {
                if let Err(e) = vector.close().await {
                    warn!(partition = %partition.name, error = %e, "vector close failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
