//! # Ribo Core
//!
//! Core types shared by every Ribo retrieval component:
//!
//! - [`Document`] — the retrievable unit of text, carrying a stable
//!   entity identifier in its metadata.
//! - [`config`] — per-call retrieval configuration value objects,
//!   validated at construction.
//! - [`fusion`] — Reciprocal Rank Fusion over heterogeneous ranked
//!   lists.
//! - [`RiboError`] — the shared error taxonomy.
//!
//! Identity across the lexical index, the vector index and the
//! knowledge graph hangs on one invariant: every representation of the
//! same biological entity carries the identical stable identifier
//! string. Fusion and traversal correctness depend on it, so the
//! alias set recognised as "the identifier" lives here, in one place
//! ([`document::STABLE_ID_ALIASES`]).

pub mod config;
pub mod document;
pub mod error;
pub mod fusion;

pub use config::{
    GraphTraversalConfig, PathwayRetrievalConfig, ProteinRetrievalConfig, StrategyKind,
    VectorSearchConfig,
};
pub use document::Document;
pub use error::{Result, RiboError};
pub use fusion::{reciprocal_rank_fusion, FusionOutcome};
