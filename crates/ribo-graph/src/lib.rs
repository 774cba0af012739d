//! # Ribo Graph
//!
//! Graph client interface and traversal strategies over the biomedical
//! knowledge graph.
//!
//! The [`GraphQueryClient`] trait is the only seam strategy code sees:
//! parameterized pattern-match queries in, typed records out. The
//! query text lives in [`queries`] and is an internal contract between
//! the strategies and whichever backend executes it — the bundled
//! [`MemoryGraphClient`] interprets exactly those query forms against
//! a petgraph-backed property graph, which keeps every strategy fully
//! testable in-process.
//!
//! Two traversal strategies ship:
//!
//! - [`OneHopStrategy`] — expand each seed to its direct neighbors,
//!   grouped by relation type under two independent caps.
//! - [`SteinerTreeStrategy`] — connect a multi-seed set with a
//!   minimum-weight tree, reporting unreached targets.
//!
//! Each strategy pairs with a renderer producing either JSON or
//! LLM-oriented prose ([`render`]).

pub mod client;
pub mod memory;
pub mod one_hop;
pub mod queries;
pub mod steiner;
pub mod strategy;

pub use client::{params, GraphQueryClient, GraphRecord, GraphValue, Params};
pub use memory::MemoryGraphClient;
pub use one_hop::OneHopStrategy;
pub use steiner::SteinerTreeStrategy;
pub use strategy::{
    render, NeighborInfo, NodeInfo, OneHopOutput, RelDirection, RelationGroup, RenderFormat,
    SeedNeighborhood, SteinerOutput, StrategyRegistry, TraversalOutput, TraversalStrategy,
    TreeEdge,
};
