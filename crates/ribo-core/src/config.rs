//! Per-call retrieval configuration.
//!
//! Config objects are immutable value objects: validated when
//! constructed (or deserialized — unknown fields are rejected) and
//! never mutated afterwards. Defaults mirror the production
//! deployment; environment loaders use the `RIBO_PATHWAY_*` and
//! `RIBO_PROTEIN_*` prefixes.

use crate::error::{Result, RiboError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known graph traversal strategies.
///
/// Strategy names are resolved against this enum at configuration
/// time, so an unknown name fails before any traversal runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Expand each seed to its directly connected neighbors.
    OneHop,
    /// Connect the seed set with a minimum-weight Steiner tree.
    SteinerTree,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::OneHop => "one_hop",
            StrategyKind::SteinerTree => "steiner_tree",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RiboError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "one_hop" => Ok(StrategyKind::OneHop),
            "steiner_tree" => Ok(StrategyKind::SteinerTree),
            other => Err(RiboError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Configuration for vector search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VectorSearchConfig {
    /// Fuse results across expanded queries with Reciprocal Rank
    /// Fusion. When false (or with fewer than two expanded queries) a
    /// single similarity search runs at `rrf_final_k`.
    pub use_rrf: bool,
    /// Fetch depth per query when fusing.
    pub rrf_per_query_k: usize,
    /// Final result count after fusion.
    pub rrf_final_k: usize,
    /// RRF damping constant (λ).
    pub rrf_lambda: f64,
    /// Relevance floor applied to each per-query search when fusing.
    pub rrf_alpha: f64,
    /// Per-list cutoff before fusion. `None` considers whole lists.
    pub rrf_cutoff_k: Option<usize>,
    /// Relevance floor for the simple (non-fused) similarity search.
    pub alpha: f64,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            use_rrf: true,
            rrf_per_query_k: 20,
            rrf_final_k: 10,
            rrf_lambda: 60.0,
            rrf_alpha: 0.8,
            rrf_cutoff_k: None,
            alpha: 0.8,
        }
    }
}

impl VectorSearchConfig {
    /// Validate invariants that serde typing cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rrf_final_k == 0 {
            return Err(RiboError::invalid_config("rrf_final_k", "must be >= 1"));
        }
        if self.rrf_per_query_k == 0 {
            return Err(RiboError::invalid_config("rrf_per_query_k", "must be >= 1"));
        }
        if !(self.rrf_lambda > 0.0) {
            return Err(RiboError::invalid_config("rrf_lambda", "must be > 0"));
        }
        for (field, value) in [("rrf_alpha", self.rrf_alpha), ("alpha", self.alpha)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiboError::invalid_config(field, "must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

/// Configuration for graph traversal operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GraphTraversalConfig {
    /// Ordered strategies to execute; the node-id set of strategy *i*
    /// seeds strategy *i+1*.
    pub strategy_sequence: Vec<StrategyKind>,
    /// One-hop: neighbor cap per relation type, applied per bucket
    /// before the global cap.
    pub max_neighbors_per_type: usize,
    /// One-hop: cumulative neighbor cap per seed across all relation
    /// types, applied greedily in precedence order.
    pub max_total: usize,
    /// Steiner tree: explicit source seed. `None` uses the first seed.
    pub source_id: Option<String>,
    /// Steiner tree: persistent named graph projection. `None`
    /// projects an ephemeral graph that is dropped after the call.
    pub gds_graph_name: Option<String>,
}

impl Default for GraphTraversalConfig {
    fn default() -> Self {
        Self {
            strategy_sequence: vec![StrategyKind::OneHop],
            max_neighbors_per_type: 2,
            max_total: 7,
            source_id: None,
            gds_graph_name: None,
        }
    }
}

impl GraphTraversalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.strategy_sequence.is_empty() {
            return Err(RiboError::invalid_config(
                "strategy_sequence",
                "must name at least one strategy",
            ));
        }
        if self.max_total == 0 {
            return Err(RiboError::invalid_config("max_total", "must be >= 1"));
        }
        if self.max_neighbors_per_type == 0 {
            return Err(RiboError::invalid_config(
                "max_neighbors_per_type",
                "must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for pathway knowledge-base retrieval (vector search
/// plus optional graph traversal).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathwayRetrievalConfig {
    pub vector: VectorSearchConfig,
    /// Absent for simple vector-only searches.
    pub graph: Option<GraphTraversalConfig>,
}

impl PathwayRetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        self.vector.validate()?;
        if let Some(graph) = &self.graph {
            graph.validate()?;
        }
        Ok(())
    }

    /// Build from `RIBO_PATHWAY_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            vector: vector_config_from_env("RIBO_PATHWAY")?,
            graph: Some(GraphTraversalConfig {
                strategy_sequence: strategy_sequence_from_env("RIBO_PATHWAY_STRATEGY")?,
                max_neighbors_per_type: env_parse("RIBO_PATHWAY_MAX_NEIGHBORS_PER_TYPE", 2)?,
                max_total: env_parse("RIBO_PATHWAY_MAX_TOTAL", 7)?,
                source_id: env_nonempty("RIBO_PATHWAY_SOURCE_ID"),
                gds_graph_name: env_nonempty("RIBO_PATHWAY_GDS_GRAPH_NAME"),
            }),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Configuration for protein knowledge-base retrieval (hybrid
/// lexical + vector, no graph stage).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProteinRetrievalConfig {
    pub vector: VectorSearchConfig,
}

impl ProteinRetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        self.vector.validate()
    }

    /// Build from `RIBO_PROTEIN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            vector: vector_config_from_env("RIBO_PROTEIN")?,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn vector_config_from_env(prefix: &str) -> Result<VectorSearchConfig> {
    let defaults = VectorSearchConfig::default();
    Ok(VectorSearchConfig {
        use_rrf: env_parse(&format!("{prefix}_USE_RRF"), defaults.use_rrf)?,
        rrf_per_query_k: env_parse(&format!("{prefix}_RRF_PER_QUERY_K"), defaults.rrf_per_query_k)?,
        rrf_final_k: env_parse(&format!("{prefix}_RRF_FINAL_K"), defaults.rrf_final_k)?,
        rrf_lambda: env_parse(&format!("{prefix}_RRF_LAMBDA"), defaults.rrf_lambda)?,
        rrf_alpha: env_parse(&format!("{prefix}_RRF_ALPHA"), defaults.rrf_alpha)?,
        rrf_cutoff_k: match env_parse::<usize>(&format!("{prefix}_RRF_CUTOFF_K"), 0)? {
            0 => None,
            k => Some(k),
        },
        alpha: env_parse(&format!("{prefix}_ALPHA"), defaults.alpha)?,
    })
}

fn strategy_sequence_from_env(var: &str) -> Result<Vec<StrategyKind>> {
    match env_nonempty(var) {
        None => Ok(vec![StrategyKind::OneHop]),
        Some(raw) => raw.split(',').map(StrategyKind::from_str).collect(),
    }
}

fn env_parse<T: FromStr>(var: &str, default: T) -> Result<T> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RiboError::invalid_config(var, format!("cannot parse {raw:?}"))),
    }
}

fn env_nonempty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
