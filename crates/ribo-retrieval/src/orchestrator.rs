//! Per-turn search orchestration.
//!
//! One user turn fans out into the pathway-graph branch and the
//! protein hybrid branch, run concurrently. Each branch degrades to an
//! empty context on failure instead of failing the other branch or the
//! turn: partial evidence beats total failure.

use crate::graph_rag::GraphRagRetriever;
use crate::hybrid::HybridRetriever;
use async_trait::async_trait;
use ribo_core::config::{
    GraphTraversalConfig, PathwayRetrievalConfig, StrategyKind, VectorSearchConfig,
};
use ribo_core::Result;
use ribo_graph::{GraphQueryClient, RenderFormat};
use ribo_index::VectorSearchClient;
use std::sync::Arc;
use tracing::{info, warn};

/// How deep a turn digs into the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Vector-only pathway lookup at shallow depth, no graph stage.
    Simple,
    /// RRF-fused vector search, Steiner-tree then one-hop traversal,
    /// and a summarization pass over the rendered context.
    Complex,
}

/// Condenses a rendered context for the generation layer.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, question: &str, context: &str) -> Result<String>;
}

/// Returns the context unchanged. Stands in wherever no model-backed
/// summarizer is wired up.
pub struct PassthroughSummarizer;

#[async_trait]
impl Summarizer for PassthroughSummarizer {
    async fn summarize(&self, _question: &str, context: &str) -> Result<String> {
        Ok(context.to_string())
    }
}

/// Both branch contexts for one turn, merged into the caller's state.
/// A failed branch is present as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchContexts {
    pub pathway_context: String,
    pub protein_context: String,
}

/// See the module docs.
pub struct SearchOrchestrator {
    pathway_vector: Arc<dyn VectorSearchClient>,
    graph: Arc<dyn GraphQueryClient>,
    protein: HybridRetriever,
    summarizer: Arc<dyn Summarizer>,
    format: RenderFormat,
}

impl SearchOrchestrator {
    pub fn new(
        pathway_vector: Arc<dyn VectorSearchClient>,
        graph: Arc<dyn GraphQueryClient>,
        protein: HybridRetriever,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            pathway_vector,
            graph,
            protein,
            summarizer,
            format: RenderFormat::Prose,
        }
    }

    pub fn with_render_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    fn pathway_config(mode: SearchMode) -> PathwayRetrievalConfig {
        match mode {
            SearchMode::Simple => PathwayRetrievalConfig {
                vector: VectorSearchConfig {
                    use_rrf: false,
                    rrf_final_k: 5,
                    ..Default::default()
                },
                graph: None,
            },
            SearchMode::Complex => PathwayRetrievalConfig {
                vector: VectorSearchConfig {
                    use_rrf: true,
                    rrf_final_k: 7,
                    ..Default::default()
                },
                graph: Some(GraphTraversalConfig {
                    strategy_sequence: vec![StrategyKind::SteinerTree, StrategyKind::OneHop],
                    max_neighbors_per_type: 2,
                    max_total: 5,
                    source_id: None,
                    gds_graph_name: None,
                }),
            },
        }
    }

    /// Run both retrieval branches for one user turn.
    pub async fn search(
        &self,
        question: &str,
        expanded_queries: &[String],
        mode: SearchMode,
    ) -> SearchContexts {
        let pathway_branch = self.pathway_branch(question, expanded_queries, mode);
        let protein_branch = self.protein.ainvoke(question, expanded_queries);
        let (pathway, protein) = tokio::join!(pathway_branch, protein_branch);

        // A failed branch contributes an empty context, never an
        // aborted turn.
        let pathway_context = pathway.unwrap_or_else(|e| {
            warn!(error = %e, "pathway branch failed");
            String::new()
        });
        let protein_context = protein.unwrap_or_else(|e| {
            warn!(error = %e, "protein branch failed");
            String::new()
        });
        info!(
            pathway_chars = pathway_context.len(),
            protein_chars = protein_context.len(),
            "search turn complete"
        );
        SearchContexts {
            pathway_context,
            protein_context,
        }
    }

    async fn pathway_branch(
        &self,
        question: &str,
        expanded_queries: &[String],
        mode: SearchMode,
    ) -> Result<String> {
        let retriever =
            GraphRagRetriever::new(Arc::clone(&self.pathway_vector), Self::pathway_config(mode))?
                .with_graph(Arc::clone(&self.graph))
                .with_render_format(self.format);
        let context = retriever.ainvoke(question, expanded_queries).await?;
        match mode {
            SearchMode::Simple => Ok(context),
            SearchMode::Complex => self.summarizer.summarize(question, &context).await,
        }
    }

    /// Close every long-lived client this orchestrator owns. Each
    /// close is attempted; the first failure is returned at the end.
    pub async fn close(&self) -> Result<()> {
        let mut first_err = None;
        if let Err(e) = self.pathway_vector.close().await {
            warn!(error = %e, "pathway vector close failed");
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.graph.close().await {
            warn!(error = %e, "graph close failed");
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.protein.close().await {
            warn!(error = %e, "protein close failed");
            first_err.get_or_insert(e);
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ribo_core::Document;
    use ribo_graph::MemoryGraphClient;
    use ribo_index::{Embedder, HashEmbedder, MemoryVectorStore};

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::default())
    }

    fn pathway_store() -> Arc<MemoryVectorStore> {
        let docs = vec![
            Document::new("p53 activation triggers apoptosis").with_metadata("stId", "R-HSA-1"),
        ];
        Arc::new(MemoryVectorStore::from_documents(docs, embedder()).unwrap())
    }

    fn protein_retriever() -> HybridRetriever {
        let docs = vec![
            Document::new("stable_id: P04637\nname: TP53\nfunction: tumor suppressor")
                .with_metadata("stable_id", "P04637"),
        ];
        HybridRetriever::from_documents(
            vec![("proteins".to_string(), docs)],
            embedder(),
            Default::default(),
        )
        .unwrap()
    }

    fn orchestrator() -> SearchOrchestrator {
        SearchOrchestrator::new(
            pathway_store(),
            Arc::new(MemoryGraphClient::new()),
            protein_retriever(),
            Arc::new(PassthroughSummarizer),
        )
    }

    #[tokio::test]
    async fn failed_pathway_branch_degrades_to_empty_context() {
        let orchestrator = orchestrator();
        // Closing the pathway store makes that branch fail while the
        // protein branch keeps working.
        orchestrator.pathway_vector.close().await.unwrap();
        let contexts = orchestrator
            .search("p53 tumor suppressor", &[], SearchMode::Simple)
            .await;
        assert_eq!(contexts.pathway_context, "");
        assert!(contexts.protein_context.contains("TP53"));
    }

    #[tokio::test]
    async fn empty_question_degrades_both_branches() {
        let orchestrator = orchestrator();
        let contexts = orchestrator.search("  ", &[], SearchMode::Simple).await;
        assert_eq!(contexts, SearchContexts::default());
    }

    #[tokio::test]
    async fn close_is_idempotent_across_clients() {
        let orchestrator = orchestrator();
        orchestrator.close().await.unwrap();
        // Second close: the stores are already closed and must not
        // panic or hang.
        let _ = orchestrator.close().await;
    }
}
