//! Graph-RAG retrieval: vector seed selection, then graph traversal.
//!
//! Call flow: vector search selects seed nodes; with no seeds the call
//! returns a fixed "nothing found" message (a normal outcome, not an
//! error); with no graph stage configured the vector documents render
//! directly; otherwise the configured strategy sequence runs, each
//! strategy seeded by the node ids of the previous one, and the final
//! strategy's output is rendered as JSON or prose.

use futures::future::try_join_all;
use ribo_core::config::PathwayRetrievalConfig;
use ribo_core::fusion::reciprocal_rank_fusion;
use ribo_core::{Document, Result, RiboError};
use ribo_graph::{render, GraphQueryClient, RenderFormat, StrategyRegistry, TraversalOutput};
use ribo_index::VectorSearchClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// Returned when vector search yields no usable seed identifiers.
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant nodes found in the knowledge graph for this query.";

/// See the module docs.
pub struct GraphRagRetriever {
    vector: Arc<dyn VectorSearchClient>,
    graph: Option<Arc<dyn GraphQueryClient>>,
    config: PathwayRetrievalConfig,
    format: RenderFormat,
}

impl GraphRagRetriever {
    pub fn new(
        vector: Arc<dyn VectorSearchClient>,
        config: PathwayRetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vector,
            graph: None,
            config,
            format: RenderFormat::Prose,
        })
    }

    /// Attach the graph client the traversal stage runs against.
    pub fn with_graph(mut self, graph: Arc<dyn GraphQueryClient>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_render_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    /// Run one retrieval call for a query and its paraphrases.
    pub async fn ainvoke(&self, query: &str, expanded_queries: &[String]) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RiboError::EmptyQuery);
        }

        let docs = self.vector_stage(query, expanded_queries).await?;

        // Documents without a resolvable identifier cannot seed the
        // graph and are filtered out here.
        let mut seeds: Vec<String> = Vec::new();
        for doc in &docs {
            if let Some(id) = doc.stable_id() {
                if !seeds.iter().any(|s| s == id) {
                    seeds.push(id.to_string());
                }
            }
        }
        if seeds.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }
        debug!(seeds = seeds.len(), "vector stage selected seeds");

        let Some(graph_config) = &self.config.graph else {
            // Vector-only call: the fused documents are the context.
            return Ok(docs
                .iter()
                .map(|doc| doc.page_content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"));
        };
        let graph = self.graph.as_deref().ok_or_else(|| {
            RiboError::invalid_config("graph", "graph stage configured without a graph client")
        })?;

        // Strategy chaining: the node ids of strategy i seed strategy
        // i+1. An id-less intermediate result stops the chain and the
        // last result with ids is what gets rendered.
        let mut rendered: Option<TraversalOutput> = None;
        let mut current_ids = seeds;
        for strategy in StrategyRegistry::build(graph_config) {
            let output = strategy.traverse(graph, &current_ids).await?;
            let ids = output.node_ids();
            debug!(
                strategy = strategy.name(),
                seeds = current_ids.len(),
                produced = ids.len(),
                "traversal step complete"
            );
            if ids.is_empty() {
                if rendered.is_none() {
                    rendered = Some(output);
                }
                break;
            }
            rendered = Some(output);
            current_ids = ids;
        }

        match rendered {
            Some(output) => render(&output, self.format),
            None => Ok(NO_RESULTS_MESSAGE.to_string()),
        }
    }

    /// Fused or single-shot vector search, per config.
    async fn vector_stage(&self, query: &str, expanded_queries: &[String]) -> Result<Vec<Document>> {
        let cfg = &self.config.vector;
        let mut query_set: Vec<&str> = vec![query];
        query_set.extend(
            expanded_queries
                .iter()
                .map(String::as_str)
                .filter(|q| !q.trim().is_empty()),
        );

        if cfg.use_rrf && query_set.len() >= 2 {
            let searches = query_set.iter().map(|q| {
                self.vector
                    .search_similar(q, cfg.rrf_per_query_k, Some(cfg.rrf_alpha))
            });
            let ranked_lists = try_join_all(searches).await?;
            let fused = reciprocal_rank_fusion(
                ranked_lists,
                |doc: &Document| doc.stable_id().map(str::to_owned),
                cfg.rrf_final_k,
                cfg.rrf_lambda,
                cfg.rrf_cutoff_k,
            );
            Ok(fused.items)
        } else {
            self.vector
                .search_similar(query, cfg.rrf_final_k, Some(cfg.alpha))
                .await
        }
    }

    /// Close the vector client, then the graph client. The second
    /// close always runs; the first failure wins, later ones are
    /// logged.
    pub async fn close(&self) -> Result<()> {
        let vector_outcome = self.vector.close().await;
        if let Err(e) = &vector_outcome {
            warn!(error = %e, "vector close failed");
        }
        if let Some(graph) = &self.graph {
            if let Err(e) = graph.close().await {
                warn!(error = %e, "graph close failed");
                vector_outcome?;
                return Err(e);
            }
        }
        vector_outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ribo_core::config::{GraphTraversalConfig, StrategyKind, VectorSearchConfig};
    use ribo_graph::{GraphValue, MemoryGraphClient};
    use ribo_index::{Embedder, HashEmbedder, MemoryVectorStore};
    use std::collections::BTreeMap;

    fn vector_store(docs: Vec<Document>) -> Arc<MemoryVectorStore> {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        Arc::new(MemoryVectorStore::from_documents(docs, embedder).unwrap())
    }

    fn pathway_docs() -> Vec<Document> {
        vec![
            Document::new("p53 activation triggers apoptosis in damaged cells")
                .with_metadata("stId", "R-HSA-1"),
            Document::new("MDM2 ubiquitinates p53 for degradation")
                .with_metadata("stId", "R-HSA-2"),
            Document::new("glucose breakdown through glycolysis")
                .with_metadata("stId", "R-HSA-3"),
        ]
    }

    fn named_props(name: &str) -> BTreeMap<String, GraphValue> {
        [("displayName".to_string(), GraphValue::from(name))]
            .into_iter()
            .collect()
    }

    // Hash embeddings score lower than a real model, so tests drop the
    // relevance floor entirely.
    fn loose_vector(final_k: usize) -> VectorSearchConfig {
        VectorSearchConfig {
            use_rrf: false,
            rrf_final_k: final_k,
            alpha: 0.0,
            rrf_alpha: 0.0,
            ..Default::default()
        }
    }

    fn vector_only_config() -> PathwayRetrievalConfig {
        PathwayRetrievalConfig {
            vector: loose_vector(2),
            graph: None,
        }
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let retriever =
            GraphRagRetriever::new(vector_store(pathway_docs()), vector_only_config()).unwrap();
        let err = retriever.ainvoke("", &[]).await.unwrap_err();
        assert!(matches!(err, RiboError::EmptyQuery));
    }

    #[tokio::test]
    async fn vector_only_call_renders_document_contents() {
        let retriever =
            GraphRagRetriever::new(vector_store(pathway_docs()), vector_only_config()).unwrap();
        let blob = retriever
            .ainvoke("p53 activation triggers apoptosis", &[])
            .await
            .unwrap();
        let paragraphs: Vec<&str> = blob.split("\n\n").collect();
        assert!(!paragraphs.is_empty() && paragraphs.len() <= 2);
        assert_eq!(
            paragraphs[0],
            "p53 activation triggers apoptosis in damaged cells"
        );
        let contents: Vec<String> = pathway_docs()
            .iter()
            .map(|d| d.page_content.clone())
            .collect();
        assert!(paragraphs.iter().all(|p| contents.iter().any(|c| c == p)));
    }

    #[tokio::test]
    async fn no_resolvable_seeds_yields_fixed_message() {
        let docs = vec![Document::new("identifier-free document")];
        let retriever = GraphRagRetriever::new(vector_store(docs), vector_only_config()).unwrap();
        let blob = retriever.ainvoke("anything", &[]).await.unwrap();
        assert_eq!(blob, NO_RESULTS_MESSAGE);
    }

    #[tokio::test]
    async fn graph_stage_without_client_is_a_config_error() {
        let config = PathwayRetrievalConfig {
            vector: loose_vector(2),
            graph: Some(GraphTraversalConfig::default()),
        };
        let retriever = GraphRagRetriever::new(vector_store(pathway_docs()), config).unwrap();
        let err = retriever
            .ainvoke("p53 activation triggers apoptosis", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RiboError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn one_hop_stage_renders_neighborhood_prose() {
        let graph = MemoryGraphClient::new();
        graph
            .add_node("R-HSA-1", &["Pathway"], named_props("Apoptosis"))
            .unwrap();
        graph
            .add_node("R-HSA-5", &["Pathway"], named_props("Intrinsic Pathway"))
            .unwrap();
        graph
            .add_scored_edge("R-HSA-5", "R-HSA-1", "PartOf", 0.9)
            .unwrap();

        let config = PathwayRetrievalConfig {
            vector: loose_vector(1),
            graph: Some(GraphTraversalConfig::default()),
        };
        let retriever = GraphRagRetriever::new(vector_store(pathway_docs()), config)
            .unwrap()
            .with_graph(Arc::new(graph));
        let blob = retriever
            .ainvoke("p53 activation triggers apoptosis", &[])
            .await
            .unwrap();
        assert!(blob.contains("Apoptosis (Pathway R-HSA-1):"));
        assert!(blob.contains("Intrinsic Pathway"));
    }

    #[tokio::test]
    async fn chain_stops_early_when_no_ids_survive() {
        // Seeds exist in the vector store but not in the graph, so the
        // first strategy yields an empty output and the chain stops.
        let graph = MemoryGraphClient::new();
        graph
            .add_node("R-HSA-99", &["Pathway"], named_props("Unrelated"))
            .unwrap();
        let config = PathwayRetrievalConfig {
            vector: loose_vector(2),
            graph: Some(GraphTraversalConfig {
                strategy_sequence: vec![StrategyKind::OneHop, StrategyKind::OneHop],
                ..Default::default()
            }),
        };
        let retriever = GraphRagRetriever::new(vector_store(pathway_docs()), config)
            .unwrap()
            .with_graph(Arc::new(graph));
        let blob = retriever
            .ainvoke("p53 activation triggers apoptosis", &[])
            .await
            .unwrap();
        assert_eq!(blob, "No seed nodes were found in the knowledge graph.");
    }

    #[tokio::test]
    async fn rrf_fuses_paraphrase_searches() {
        let config = PathwayRetrievalConfig {
            vector: VectorSearchConfig {
                rrf_final_k: 2,
                rrf_alpha: 0.0,
                ..Default::default()
            },
            graph: None,
        };
        let retriever = GraphRagRetriever::new(vector_store(pathway_docs()), config).unwrap();
        let expanded = vec!["p53 triggers apoptosis".to_string()];
        let blob = retriever
            .ainvoke("p53 activation apoptosis", &expanded)
            .await
            .unwrap();
        assert!(blob.contains("p53 activation triggers apoptosis"));
    }

    #[tokio::test]
    async fn close_shuts_both_clients_down() {
        let store = vector_store(pathway_docs());
        let graph = Arc::new(MemoryGraphClient::new());
        let retriever = GraphRagRetriever::new(store.clone(), vector_only_config())
            .unwrap()
            .with_graph(graph.clone());
        retriever.close().await.unwrap();
        assert!(store.search_similar("p53", 1, None).await.is_err());
        assert!(graph
            .invoke(ribo_graph::queries::SEED_NODES, Default::default(), None)
            .await
            .is_err());
    }
}
