//! # Ribo Index
//!
//! Lexical and vector index adapters over an on-disk corpus snapshot.
//!
//! The snapshot layout is one CSV file per sub-collection (one logical
//! entity-type partition of the corpus), produced by the upstream ETL
//! pipeline. Each partition gets one [`Bm25Index`] and one
//! [`MemoryVectorStore`], built lazily once per process and shared
//! read-only across concurrent calls.
//!
//! | Adapter | Module | Backend |
//! |---------|--------|---------|
//! | Lexical | [`lexical`] | Okapi BM25, in-process |
//! | Vector  | [`vector`]  | brute-force cosine, in-process |
//!
//! Both adapters return [`ribo_core::Document`] ranked lists; only
//! rank position is consumed downstream by fusion.

pub mod corpus;
pub mod embed;
pub mod lexical;
pub mod vector;

pub use corpus::{discover_partitions, load_csv_documents, PartitionSource};
pub use embed::{Embedder, HashEmbedder};
pub use lexical::Bm25Index;
pub use vector::{MemoryVectorStore, VectorSearchClient};
