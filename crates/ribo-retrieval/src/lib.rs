//! # Ribo Retrieval
//!
//! Evidence-gathering layer: hybrid lexical + vector retrieval over
//! corpus partitions, graph-RAG retrieval over the knowledge graph,
//! and the per-turn search orchestrator that runs both.
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | [`HybridRetriever`] | [`hybrid`] | per-partition BM25 + vector search, RRF-fused |
//! | [`GraphRagRetriever`] | [`graph_rag`] | vector seed selection, then graph traversal |
//! | [`SearchOrchestrator`] | [`orchestrator`] | runs both branches for one user turn |
//!
//! All components degrade rather than fail: a broken subsystem
//! contributes an empty result and a log line, never an aborted turn.

pub mod graph_rag;
pub mod hybrid;
pub mod orchestrator;

pub use graph_rag::{GraphRagRetriever, NO_RESULTS_MESSAGE};
pub use hybrid::HybridRetriever;
pub use orchestrator::{
    PassthroughSummarizer, SearchContexts, SearchMode, SearchOrchestrator, Summarizer,
};
