//! One-hop neighborhood expansion.
//!
//! Expands each seed to its directly connected neighbors, grouped by
//! relation type. Two caps apply: `per_type` limits each relation
//! bucket (enforced by the query), and `max_total` caps the cumulative
//! neighbor count per seed, spent greedily over relation types in
//! biological precedence order. Requested seeds the graph does not
//! contain keep an id-only entry in the output.

use crate::client::{params, GraphQueryClient, GraphValue};
use crate::queries;
use crate::strategy::{
    NeighborInfo, NodeInfo, OneHopOutput, RelDirection, RelationGroup, SeedNeighborhood,
    TraversalOutput, TraversalStrategy,
};
use async_trait::async_trait;
use ribo_core::Result;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Relation types in precedence order. Structural containment first,
/// then participation, then looser associations. Types not listed sort
/// after these, alphabetically.
const REL_TYPE_PRIORITY: &[&str] = &[
    "PartOf",
    "SubPathwayOf",
    "HasInput",
    "HasOutput",
    "HasCatalyst",
    "HasComponent",
    "AssociatedWith",
    "Treats",
    "HasDiseaseVariant",
    "ActsOn",
    "Precedes",
];

/// See the module docs for capping semantics.
#[derive(Debug, Clone)]
pub struct OneHopStrategy {
    per_type: usize,
    max_total: usize,
    priority: Vec<String>,
}

impl OneHopStrategy {
    pub fn new(per_type: usize, max_total: usize) -> Self {
        Self {
            per_type,
            max_total,
            priority: REL_TYPE_PRIORITY.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the relation-type precedence order. The default is a
    /// tunable, not an invariant; types absent from the list sort
    /// after it, alphabetically.
    pub fn with_priority(mut self, priority: Vec<String>) -> Self {
        self.priority = priority;
        self
    }

    fn rel_precedence<'a>(&self, rel_type: &'a str) -> (usize, &'a str) {
        let rank = self
            .priority
            .iter()
            .position(|known| known == rel_type)
            .unwrap_or(self.priority.len());
        (rank, rel_type)
    }
}

#[async_trait]
impl TraversalStrategy for OneHopStrategy {
    fn name(&self) -> &'static str {
        "one_hop"
    }

    async fn traverse(
        &self,
        client: &dyn GraphQueryClient,
        seed_ids: &[String],
    ) -> Result<TraversalOutput> {
        let seed_records = client
            .invoke(
                queries::SEED_NODES,
                params([(
                    "ids",
                    GraphValue::from(seed_ids.to_vec()),
                )]),
                None,
            )
            .await?;

        let mut seed_nodes: BTreeMap<String, NodeInfo> = BTreeMap::new();
        for record in &seed_records {
            let id = record.require_str("node_id")?.to_string();
            seed_nodes.insert(
                id.clone(),
                NodeInfo::new(id, record.str_list("labels"), record.map_field("props")),
            );
        }
        let found: Vec<String> = seed_ids
            .iter()
            .filter(|id| seed_nodes.contains_key(*id))
            .cloned()
            .collect();
        debug!(
            requested = seed_ids.len(),
            found = found.len(),
            "one-hop seed lookup"
        );

        // seed -> rel_type -> neighbors, preserving the backend's
        // per-bucket ordering (score desc, id asc).
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<NeighborInfo>>> = BTreeMap::new();
        if !found.is_empty() {
            let neighbor_records = client
                .invoke(
                    queries::ONE_HOP_NEIGHBORS,
                    params([
                        ("seed_ids", GraphValue::from(found.clone())),
                        ("per_type", GraphValue::from(self.per_type as i64)),
                    ]),
                    None,
                )
                .await?;
            for record in &neighbor_records {
                let seed_id = record.require_str("seed_id")?.to_string();
                let rel_type = record.require_str("rel_type")?.to_string();
                let neighbor = NodeInfo::new(
                    record.require_str("neighbor_id")?,
                    record.str_list("neighbor_labels"),
                    record.map_field("neighbor_props"),
                );
                let direction = if record.require_str("rel_start_id")? == seed_id {
                    RelDirection::Outgoing
                } else if record.require_str("rel_end_id")? == seed_id {
                    RelDirection::Incoming
                } else {
                    RelDirection::Undirected
                };
                grouped
                    .entry(seed_id)
                    .or_default()
                    .entry(rel_type)
                    .or_default()
                    .push(NeighborInfo {
                        node: neighbor,
                        direction,
                        score: record.require_float("rel_score")?,
                        rel_props: record.map_field("rel_props"),
                    });
            }
        }

        // Every requested seed appears in the output, in request
        // order. Seeds absent from the graph get an id-only entry.
        let mut seeds = Vec::with_capacity(seed_ids.len());
        let mut emitted: HashSet<&str> = HashSet::new();
        for seed_id in seed_ids {
            if !emitted.insert(seed_id.as_str()) {
                continue;
            }
            let Some(seed) = seed_nodes.remove(seed_id) else {
                seeds.push(SeedNeighborhood {
                    seed: NodeInfo::new(seed_id.clone(), Vec::new(), BTreeMap::new()),
                    found: false,
                    relations: Vec::new(),
                });
                continue;
            };
            let buckets = grouped.remove(seed_id).unwrap_or_default();

            let mut ordered: Vec<(String, Vec<NeighborInfo>)> = buckets.into_iter().collect();
            ordered.sort_by(|a, b| self.rel_precedence(&a.0).cmp(&self.rel_precedence(&b.0)));

            // Spend the per-seed budget greedily in precedence order.
            let mut budget = self.max_total;
            let mut relations = Vec::new();
            for (rel_type, mut neighbors) in ordered {
                if budget == 0 {
                    break;
                }
                neighbors.truncate(budget);
                budget -= neighbors.len();
                if !neighbors.is_empty() {
                    relations.push(RelationGroup {
                        rel_type,
                        neighbors,
                    });
                }
            }
            seeds.push(SeedNeighborhood {
                seed,
                found: true,
                relations,
            });
        }

        Ok(TraversalOutput::OneHop(OneHopOutput { seeds }))
    }
}

/// Prose rendering of a one-hop neighborhood, one line per relation.
pub(crate) fn render_prose(output: &OneHopOutput) -> String {
    if output.seeds.iter().all(|s| !s.found) {
        return "No seed nodes were found in the knowledge graph.".to_string();
    }
    let mut lines = Vec::new();
    for seed in &output.seeds {
        if !seed.found {
            lines.push(format!(
                "{}: not found in the knowledge graph",
                seed.seed.stable_id
            ));
            continue;
        }
        lines.push(format!("{}:", seed.seed.prose_ref()));
        if seed.relations.is_empty() {
            lines.push("  (no neighbors)".to_string());
            continue;
        }
        for group in &seed.relations {
            for neighbor in &group.neighbors {
                let mut target = neighbor.node.prose_ref();
                if let Some(url) = neighbor.node.props.get("url").and_then(GraphValue::as_str) {
                    target.push_str(&format!(" ({url})"));
                }
                let line = match neighbor.direction {
                    RelDirection::Outgoing => {
                        format!("  -[{}]-> {}", group.rel_type, target)
                    }
                    RelDirection::Incoming => {
                        format!("  <-[{}]- {}", group.rel_type, target)
                    }
                    RelDirection::Undirected => {
                        format!("  -[{}]- {}", group.rel_type, target)
                    }
                };
                lines.push(line);
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraphClient;

    fn named_props(name: &str) -> BTreeMap<String, GraphValue> {
        [("displayName".to_string(), GraphValue::from(name))]
            .into_iter()
            .collect()
    }

    fn fixture() -> MemoryGraphClient {
        let client = MemoryGraphClient::new();
        client
            .add_node("R-HSA-1", &["Pathway"], named_props("Apoptosis"))
            .unwrap();
        client
            .add_node("R-HSA-2", &["Pathway"], named_props("Intrinsic Pathway"))
            .unwrap();
        client
            .add_node("R-HSA-3", &["Reaction"], named_props("Caspase activation"))
            .unwrap();
        client
            .add_node("R-HSA-4", &["Pathway"], named_props("Signaling"))
            .unwrap();
        client
            .add_scored_edge("R-HSA-2", "R-HSA-1", "PartOf", 0.9)
            .unwrap();
        client
            .add_scored_edge("R-HSA-1", "R-HSA-3", "HasInput", 0.7)
            .unwrap();
        client
            .add_scored_edge("R-HSA-1", "R-HSA-4", "AssociatedWith", 0.4)
            .unwrap();
        client
    }

    #[tokio::test]
    async fn groups_follow_precedence_order() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(&client, &["R-HSA-1".to_string()])
            .await
            .unwrap();
        let TraversalOutput::OneHop(out) = output else {
            panic!("wrong variant");
        };
        let rel_types: Vec<&str> = out.seeds[0]
            .relations
            .iter()
            .map(|g| g.rel_type.as_str())
            .collect();
        assert_eq!(rel_types, vec!["PartOf", "HasInput", "AssociatedWith"]);
    }

    #[tokio::test]
    async fn max_total_is_spent_in_precedence_order() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 2);
        let output = strategy
            .traverse(&client, &["R-HSA-1".to_string()])
            .await
            .unwrap();
        let TraversalOutput::OneHop(out) = output else {
            panic!("wrong variant");
        };
        let total: usize = out.seeds[0]
            .relations
            .iter()
            .map(|g| g.neighbors.len())
            .sum();
        assert_eq!(total, 2);
        // The lowest-precedence relation is the one dropped.
        assert!(out.seeds[0]
            .relations
            .iter()
            .all(|g| g.rel_type != "AssociatedWith"));
    }

    #[tokio::test]
    async fn priority_override_reorders_relation_groups() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7).with_priority(vec![
            "AssociatedWith".to_string(),
            "HasInput".to_string(),
        ]);
        let output = strategy
            .traverse(&client, &["R-HSA-1".to_string()])
            .await
            .unwrap();
        let TraversalOutput::OneHop(out) = output else {
            panic!("wrong variant");
        };
        let rel_types: Vec<&str> = out.seeds[0]
            .relations
            .iter()
            .map(|g| g.rel_type.as_str())
            .collect();
        // Unlisted types trail the override, alphabetically.
        assert_eq!(rel_types, vec!["AssociatedWith", "HasInput", "PartOf"]);
    }

    #[tokio::test]
    async fn direction_is_relative_to_the_seed() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(&client, &["R-HSA-1".to_string()])
            .await
            .unwrap();
        let TraversalOutput::OneHop(out) = output else {
            panic!("wrong variant");
        };
        let part_of = &out.seeds[0].relations[0];
        assert_eq!(part_of.rel_type, "PartOf");
        assert_eq!(part_of.neighbors[0].direction, RelDirection::Incoming);
        let has_input = &out.seeds[0].relations[1];
        assert_eq!(has_input.neighbors[0].direction, RelDirection::Outgoing);
    }

    #[tokio::test]
    async fn missing_seeds_are_reported_not_dropped() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(
                &client,
                &["R-HSA-1".to_string(), "R-HSA-404".to_string()],
            )
            .await
            .unwrap();
        // Absent seeds never feed the next strategy in a chain.
        assert!(!output.node_ids().contains(&"R-HSA-404".to_string()));
        let TraversalOutput::OneHop(out) = &output else {
            panic!("wrong variant");
        };
        assert_eq!(out.seeds.len(), 2);
        let missing = &out.seeds[1];
        assert_eq!(missing.seed.stable_id, "R-HSA-404");
        assert!(!missing.found);
        assert!(missing.relations.is_empty());
        let prose =
            crate::strategy::render(&output, crate::strategy::RenderFormat::Prose).unwrap();
        assert!(prose.contains("R-HSA-404: not found in the knowledge graph"));
    }

    #[tokio::test]
    async fn isolated_seed_still_appears_in_output() {
        let client = fixture();
        client
            .add_node("R-HSA-9", &["Pathway"], named_props("Lonely"))
            .unwrap();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(&client, &["R-HSA-9".to_string()])
            .await
            .unwrap();
        let TraversalOutput::OneHop(out) = &output else {
            panic!("wrong variant");
        };
        assert_eq!(out.seeds.len(), 1);
        assert!(out.seeds[0].relations.is_empty());
        let prose =
            crate::strategy::render(&output, crate::strategy::RenderFormat::Prose).unwrap();
        assert!(prose.contains("Lonely (Pathway R-HSA-9):"));
        assert!(prose.contains("(no neighbors)"));
    }

    #[tokio::test]
    async fn no_seeds_found_yields_empty_output() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(&client, &["R-HSA-404".to_string()])
            .await
            .unwrap();
        assert!(output.is_empty());
        assert!(output.node_ids().is_empty());
        assert_eq!(
            crate::strategy::render(&output, crate::strategy::RenderFormat::Prose).unwrap(),
            "No seed nodes were found in the knowledge graph."
        );
    }

    #[tokio::test]
    async fn prose_names_seed_and_neighbors() {
        let client = fixture();
        let strategy = OneHopStrategy::new(2, 7);
        let output = strategy
            .traverse(&client, &["R-HSA-1".to_string()])
            .await
            .unwrap();
        let prose =
            crate::strategy::render(&output, crate::strategy::RenderFormat::Prose).unwrap();
        assert!(prose.contains("Apoptosis (Pathway R-HSA-1):"));
        assert!(prose.contains("<-[PartOf]- Intrinsic Pathway (Pathway R-HSA-2)"));
        assert!(prose.contains("-[HasInput]-> Caspase activation (Reaction R-HSA-3)"));
    }
}
