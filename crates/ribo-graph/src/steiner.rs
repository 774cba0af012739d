//! Steiner-tree traversal: connect a multi-seed set with a
//! minimum-weight tree.
//!
//! The engine's tree computation speaks internal numeric node ids, so
//! this module translates stable identifiers to internal ids on the
//! way in and back on the way out. Internal ids never appear in
//! [`SteinerOutput`].
//!
//! Tree computations run over a named graph projection. When no
//! persistent projection is configured, an ephemeral one is projected
//! for the call and dropped afterwards, on the failure path too.

use crate::client::{params, GraphQueryClient, GraphValue};
use crate::queries;
use crate::strategy::{NodeInfo, SteinerOutput, TraversalOutput, TraversalStrategy, TreeEdge};
use async_trait::async_trait;
use ribo_core::{Result, RiboError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Minimum seed count for a tree computation.
const MIN_SEEDS: usize = 2;

/// See the module docs.
#[derive(Debug, Clone)]
pub struct SteinerTreeStrategy {
    source_id: Option<String>,
    gds_graph_name: Option<String>,
}

impl SteinerTreeStrategy {
    pub fn new(source_id: Option<String>, gds_graph_name: Option<String>) -> Self {
        Self {
            source_id,
            gds_graph_name,
        }
    }

    async fn compute(
        &self,
        client: &dyn GraphQueryClient,
        gname: &str,
        seed_ids: &[String],
    ) -> Result<SteinerOutput> {
        // Stable -> internal translation. Seeds absent from the graph
        // stay untranslated and are reported as unreached.
        let mut wanted: Vec<String> = seed_ids.to_vec();
        if let Some(source) = &self.source_id {
            if !wanted.contains(source) {
                wanted.push(source.clone());
            }
        }
        let translation = client
            .invoke(
                queries::STABLE_TO_INTERNAL,
                params([("stable_ids", GraphValue::from(wanted))]),
                None,
            )
            .await?;
        let mut to_internal: HashMap<String, i64> = HashMap::new();
        let mut to_stable: HashMap<i64, String> = HashMap::new();
        for record in &translation {
            let stable = record.require_str("stable_id")?.to_string();
            let internal = record.require_int("internal_id")?;
            to_internal.insert(stable.clone(), internal);
            to_stable.insert(internal, stable);
        }

        // Duplicate seed ids collapse to one target.
        let mut distinct: HashSet<&str> = HashSet::new();
        let translated: Vec<&String> = seed_ids
            .iter()
            .filter(|id| to_internal.contains_key(*id))
            .filter(|id| distinct.insert(id.as_str()))
            .collect();
        if translated.len() < MIN_SEEDS {
            return Err(RiboError::InsufficientSeeds {
                required: MIN_SEEDS,
                found: translated.len(),
            });
        }

        // A configured source that the graph does not contain falls
        // back to the first resolvable seed.
        let source_stable = match &self.source_id {
            Some(source) if to_internal.contains_key(source) => source.clone(),
            Some(source) => {
                warn!(source = %source, "configured source not in graph, using first seed");
                translated[0].clone()
            }
            None => translated[0].clone(),
        };
        let source = *to_internal.get(&source_stable).ok_or_else(|| {
            RiboError::QueryFailed(format!("source node not in graph: {source_stable}"))
        })?;
        let targets: Vec<i64> = translated
            .iter()
            .filter(|id| id.as_str() != source_stable)
            .filter_map(|id| to_internal.get(*id).copied())
            .collect();

        let rows = client
            .invoke(
                queries::STEINER_TREE_STREAM,
                params([
                    ("gname", GraphValue::from(gname)),
                    ("source", GraphValue::from(source)),
                    (
                        "targets",
                        GraphValue::from(
                            targets.iter().map(|t| GraphValue::from(*t)).collect::<Vec<_>>(),
                        ),
                    ),
                ]),
                None,
            )
            .await?;

        let mut tree_nodes: BTreeSet<i64> = BTreeSet::new();
        // Parent -> child pairs, in stream order.
        let mut edge_pairs: Vec<(i64, i64)> = Vec::new();
        let mut total_weight = 0.0;
        for row in &rows {
            let node = row.require_int("nodeId")?;
            let parent = row.require_int("parentId")?;
            tree_nodes.insert(node);
            tree_nodes.insert(parent);
            if node != parent {
                edge_pairs.push((parent, node));
                total_weight += row.require_float("weight")?;
            }
        }
        debug!(
            nodes = tree_nodes.len(),
            edges = edge_pairs.len(),
            total_weight,
            "steiner tree streamed"
        );

        // Split targets into reached and unreached, in request order.
        // Seeds the graph does not contain at all count as unreached.
        let mut reached: Vec<String> = Vec::new();
        let mut unreached: Vec<String> = Vec::new();
        let mut classified: HashSet<&str> = HashSet::new();
        for id in seed_ids {
            if *id == source_stable || !classified.insert(id.as_str()) {
                continue;
            }
            match to_internal.get(id) {
                Some(internal) if tree_nodes.contains(internal) => reached.push(id.clone()),
                _ => unreached.push(id.clone()),
            }
        }

        let detail_records = client
            .invoke(
                queries::TREE_NODE_DETAILS,
                params([(
                    "ids",
                    GraphValue::from(
                        tree_nodes.iter().map(|n| GraphValue::from(*n)).collect::<Vec<_>>(),
                    ),
                )]),
                None,
            )
            .await?;
        let mut nodes_by_internal: BTreeMap<i64, NodeInfo> = BTreeMap::new();
        for record in &detail_records {
            let internal = record.require_int("id")?;
            let props = record.map_field("props");
            let stable = NodeInfo::stable_id_from_props(&props).ok_or_else(|| {
                RiboError::MalformedRecord(format!(
                    "tree node {internal} carries no stable identifier"
                ))
            })?;
            to_stable.insert(internal, stable.clone());
            nodes_by_internal.insert(
                internal,
                NodeInfo::new(stable, record.str_list("labels"), props),
            );
        }

        let mut edges = Vec::new();
        if !edge_pairs.is_empty() {
            let resolved = client
                .invoke(
                    queries::RESOLVE_TREE_EDGES,
                    params([(
                        "pairs",
                        GraphValue::from(
                            edge_pairs
                                .iter()
                                .map(|(u, v)| {
                                    GraphValue::from(vec![
                                        GraphValue::from(*u),
                                        GraphValue::from(*v),
                                    ])
                                })
                                .collect::<Vec<_>>(),
                        ),
                    )]),
                    None,
                )
                .await?;
            // Keep the tree's parent/child orientation from the pair
            // echo, not the stored edge's own direction.
            for record in &resolved {
                let parent = record.require_int("u")?;
                let child = record.require_int("v")?;
                let (Some(source), Some(target)) =
                    (to_stable.get(&parent), to_stable.get(&child))
                else {
                    continue;
                };
                edges.push(TreeEdge {
                    source: source.clone(),
                    target: target.clone(),
                    rel_type: record.require_str("rel_type")?.to_string(),
                    rel_props: record.map_field("rel_props"),
                });
            }
        }

        Ok(SteinerOutput {
            source: source_stable,
            nodes: nodes_by_internal.into_values().collect(),
            edges,
            total_weight,
            reached_targets: reached,
            unreached_targets: unreached,
        })
    }
}

#[async_trait]
impl TraversalStrategy for SteinerTreeStrategy {
    fn name(&self) -> &'static str {
        "steiner_tree"
    }

    async fn traverse(
        &self,
        client: &dyn GraphQueryClient,
        seed_ids: &[String],
    ) -> Result<TraversalOutput> {
        // Duplicates do not count toward the minimum.
        let distinct: HashSet<&str> = seed_ids.iter().map(String::as_str).collect();
        if distinct.len() < MIN_SEEDS {
            return Err(RiboError::InsufficientSeeds {
                required: MIN_SEEDS,
                found: distinct.len(),
            });
        }

        match &self.gds_graph_name {
            Some(gname) => {
                let output = self.compute(client, gname, seed_ids).await?;
                Ok(TraversalOutput::SteinerTree(output))
            }
            None => {
                // Call-unique name: concurrent calls never observe or
                // reuse each other's projection.
                let gname = format!("ribo-steiner-{}", Uuid::new_v4());
                client
                    .invoke(
                        queries::PROJECT_EPHEMERAL_GRAPH,
                        params([("gname", GraphValue::from(gname.clone()))]),
                        None,
                    )
                    .await?;
                let result = self.compute(client, &gname, seed_ids).await;
                // Drop the projection on both paths; a drop failure is
                // logged but never masks the traversal result.
                let dropped = client
                    .invoke(
                        queries::DROP_GRAPH,
                        params([("gname", GraphValue::from(gname.clone()))]),
                        None,
                    )
                    .await;
                if let Err(err) = dropped {
                    warn!(graph = %gname, error = %err, "failed to drop ephemeral projection");
                }
                result.map(TraversalOutput::SteinerTree)
            }
        }
    }
}

/// Prose rendering: one annotated path per reached target, then any
/// targets the tree could not reach.
pub(crate) fn render_prose(output: &SteinerOutput) -> String {
    if output.nodes.is_empty() {
        return "No connecting tree could be computed.".to_string();
    }
    let names: BTreeMap<&str, String> = output
        .nodes
        .iter()
        .map(|n| (n.stable_id.as_str(), n.prose_ref()))
        .collect();
    let describe = |id: &str| {
        names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    };
    // Child -> (parent, relation) from the tree edges.
    let parent_of: BTreeMap<&str, (&str, &str)> = output
        .edges
        .iter()
        .map(|e| (e.target.as_str(), (e.source.as_str(), e.rel_type.as_str())))
        .collect();

    let mut lines = Vec::new();
    lines.push(format!(
        "Connecting tree from {} (total weight {}):",
        describe(&output.source),
        output.total_weight
    ));
    for target in &output.reached_targets {
        // Walk parents back to the source, then print forward.
        let mut hops: Vec<(&str, &str)> = Vec::new(); // (relation, child)
        let mut current = target.as_str();
        while let Some((parent, rel)) = parent_of.get(current) {
            hops.push((rel, current));
            current = parent;
        }
        let mut path = describe(current);
        for (rel, child) in hops.into_iter().rev() {
            path.push_str(&format!(" -[{}]-> {}", rel, describe(child)));
        }
        lines.push(format!("  Path to {}: {}", describe(target), path));
    }
    if !output.unreached_targets.is_empty() {
        lines.push(format!(
            "Targets not reached by the tree: {}",
            output.unreached_targets.join(", ")
        ));
    }
    lines.join("\n")
}
