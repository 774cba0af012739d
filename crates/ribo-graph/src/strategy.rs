//! Traversal strategy trait, shared output model and rendering.

use crate::client::{GraphQueryClient, GraphValue};
use async_trait::async_trait;
use ribo_core::config::{GraphTraversalConfig, StrategyKind};
use ribo_core::document::{NAME_ALIASES, STABLE_ID_ALIASES};
use ribo_core::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// A graph node as strategies report it: stable identifier, labels and
/// the full property map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub stable_id: String,
    pub labels: Vec<String>,
    pub props: BTreeMap<String, GraphValue>,
}

impl NodeInfo {
    pub fn new(
        stable_id: impl Into<String>,
        labels: Vec<String>,
        props: BTreeMap<String, GraphValue>,
    ) -> Self {
        Self {
            stable_id: stable_id.into(),
            labels,
            props,
        }
    }

    /// Display name under the usual aliases, falling back to the
    /// stable identifier.
    pub fn display_name(&self) -> &str {
        for alias in NAME_ALIASES {
            if let Some(name) = self.props.get(*alias).and_then(GraphValue::as_str) {
                return name;
            }
        }
        &self.stable_id
    }

    /// Stable identifier read back from the property map, preferring
    /// the canonical alias order.
    pub fn stable_id_from_props(props: &BTreeMap<String, GraphValue>) -> Option<String> {
        for alias in STABLE_ID_ALIASES {
            if let Some(id) = props.get(*alias).and_then(GraphValue::as_str) {
                return Some(id.to_string());
            }
        }
        None
    }

    fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or("Node")
    }

    /// `Name (Label STABLE-ID)` prose form.
    pub fn prose_ref(&self) -> String {
        format!(
            "{} ({} {})",
            self.display_name(),
            self.primary_label(),
            self.stable_id
        )
    }
}

/// Direction of a relation relative to the seed node. `Undirected` is
/// the fallback when the record names neither endpoint as the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelDirection {
    Outgoing,
    Incoming,
    Undirected,
}

/// One neighbor reached over a single relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborInfo {
    pub node: NodeInfo,
    pub direction: RelDirection,
    pub score: f64,
    pub rel_props: BTreeMap<String, GraphValue>,
}

/// Neighbors of one seed under one relation type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationGroup {
    pub rel_type: String,
    pub neighbors: Vec<NeighborInfo>,
}

/// Everything the one-hop expansion found around one seed. A requested
/// seed the graph does not contain still gets an entry, id-only with
/// `found` false: absence is a reportable result, not a silent drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedNeighborhood {
    pub seed: NodeInfo,
    pub found: bool,
    pub relations: Vec<RelationGroup>,
}

/// Output of the one-hop strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneHopOutput {
    pub seeds: Vec<SeedNeighborhood>,
}

/// One edge of a computed tree. `source` is the tree parent, `target`
/// the child; both are stable identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEdge {
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub rel_props: BTreeMap<String, GraphValue>,
}

/// Output of the Steiner-tree strategy. Only stable identifiers appear
/// here; the engine's internal numeric ids never leave the strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteinerOutput {
    /// The seed the tree grows from.
    pub source: String,
    pub nodes: Vec<NodeInfo>,
    pub edges: Vec<TreeEdge>,
    pub total_weight: f64,
    /// Targets connected to the source, in requested order.
    pub reached_targets: Vec<String>,
    /// Targets the tree could not connect to the source.
    pub unreached_targets: Vec<String>,
}

/// What a traversal produced, tagged by strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TraversalOutput {
    OneHop(OneHopOutput),
    SteinerTree(SteinerOutput),
}

impl TraversalOutput {
    /// Stable identifiers of every node in the output, deduplicated,
    /// in output order. Feeds the next strategy in a chain; seeds the
    /// graph did not contain are excluded.
    pub fn node_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        let mut push = |id: &str| {
            if seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        };
        match self {
            TraversalOutput::OneHop(out) => {
                for seed in &out.seeds {
                    if seed.found {
                        push(&seed.seed.stable_id);
                    }
                    for group in &seed.relations {
                        for neighbor in &group.neighbors {
                            push(&neighbor.node.stable_id);
                        }
                    }
                }
            }
            TraversalOutput::SteinerTree(out) => {
                for node in &out.nodes {
                    push(&node.stable_id);
                }
            }
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TraversalOutput::OneHop(out) => out.seeds.iter().all(|s| !s.found),
            TraversalOutput::SteinerTree(out) => out.nodes.is_empty(),
        }
    }
}

/// Output encoding for traversal results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    Json,
    Prose,
}

/// Render a traversal output, dispatching on what the traversal
/// actually produced rather than on which strategy was requested.
pub fn render(output: &TraversalOutput, format: RenderFormat) -> Result<String> {
    match format {
        RenderFormat::Json => Ok(serde_json::to_string_pretty(output)?),
        RenderFormat::Prose => Ok(match output {
            TraversalOutput::OneHop(out) => crate::one_hop::render_prose(out),
            TraversalOutput::SteinerTree(out) => crate::steiner::render_prose(out),
        }),
    }
}

/// One graph traversal step: seeds in, structured neighborhood or tree
/// out.
#[async_trait]
pub trait TraversalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn traverse(
        &self,
        client: &dyn GraphQueryClient,
        seed_ids: &[String],
    ) -> Result<TraversalOutput>;
}

/// Builds the configured strategy chain.
pub struct StrategyRegistry;

impl StrategyRegistry {
    /// Instantiate strategies in the order the config lists them.
    /// Unknown names were already rejected when the config was parsed.
    pub fn build(config: &GraphTraversalConfig) -> Vec<Box<dyn TraversalStrategy>> {
        config
            .strategy_sequence
            .iter()
            .map(|kind| match kind {
                StrategyKind::OneHop => Box::new(crate::OneHopStrategy::new(
                    config.max_neighbors_per_type,
                    config.max_total,
                )) as Box<dyn TraversalStrategy>,
                StrategyKind::SteinerTree => Box::new(crate::SteinerTreeStrategy::new(
                    config.source_id.clone(),
                    config.gds_graph_name.clone(),
                )) as Box<dyn TraversalStrategy>,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str) -> NodeInfo {
        NodeInfo::new(
            id,
            vec!["Pathway".to_string()],
            [("displayName".to_string(), GraphValue::from(name))]
                .into_iter()
                .collect(),
        )
    }

    #[test]
    fn display_name_prefers_alias_order() {
        let mut info = node("R-HSA-1", "Apoptosis");
        info.props
            .insert("name".to_string(), GraphValue::from("other"));
        assert_eq!(info.display_name(), "Apoptosis");
        info.props.remove("displayName");
        assert_eq!(info.display_name(), "other");
        info.props.remove("name");
        assert_eq!(info.display_name(), "R-HSA-1");
    }

    #[test]
    fn node_ids_deduplicate_in_output_order() {
        let output = TraversalOutput::SteinerTree(SteinerOutput {
            source: "B".to_string(),
            nodes: vec![node("B", "b"), node("A", "a"), node("B", "b")],
            edges: Vec::new(),
            total_weight: 0.0,
            reached_targets: vec!["A".to_string()],
            unreached_targets: Vec::new(),
        });
        assert_eq!(output.node_ids(), vec!["B", "A"]);
    }

    #[test]
    fn registry_follows_configured_order() {
        let config = GraphTraversalConfig {
            strategy_sequence: vec![StrategyKind::SteinerTree, StrategyKind::OneHop],
            ..GraphTraversalConfig::default()
        };
        let chain = StrategyRegistry::build(&config);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].name(), "steiner_tree");
        assert_eq!(chain[1].name(), "one_hop");
    }
}
