//! In-memory property-graph backend.
//!
//! Executes the query forms documented in [`crate::queries`] against a
//! petgraph-backed labeled property graph. It fills the role an
//! embedded test database would: always available, fully
//! deterministic, and faithful to the remote engine's observable
//! behavior — including internal numeric node ids, named graph
//! projections and the Steiner-tree stream shape.

use crate::client::{GraphQueryClient, GraphRecord, GraphValue, Params};
use crate::queries;
use async_trait::async_trait;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;
use ribo_core::{Result, RiboError};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct NodeData {
    stable_id: String,
    labels: Vec<String>,
    props: BTreeMap<String, GraphValue>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    rel_type: String,
    props: BTreeMap<String, GraphValue>,
}

impl EdgeData {
    fn score(&self) -> f64 {
        self.props
            .get("score")
            .and_then(GraphValue::as_float)
            .unwrap_or(0.0)
    }
}

struct Inner {
    graph: StableDiGraph<NodeData, EdgeData>,
    by_stable: HashMap<String, NodeIndex>,
    projections: HashSet<String>,
    closed: bool,
}

/// In-memory labeled property graph implementing [`GraphQueryClient`].
///
/// Nodes are keyed by stable identifier; edges are directed in storage
/// and treated as undirected by neighbor discovery and tree
/// computations, matching the remote engine's traversal semantics.
pub struct MemoryGraphClient {
    inner: RwLock<Inner>,
}

impl Default for MemoryGraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphClient {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                graph: StableDiGraph::new(),
                by_stable: HashMap::new(),
                projections: HashSet::new(),
                closed: false,
            }),
        }
    }

    /// Add a node. Stable identifiers must be unique.
    pub fn add_node(
        &self,
        stable_id: impl Into<String>,
        labels: &[&str],
        props: BTreeMap<String, GraphValue>,
    ) -> Result<()> {
        let stable_id = stable_id.into();
        let mut inner = self.write()?;
        if inner.by_stable.contains_key(&stable_id) {
            return Err(RiboError::invalid_config(
                "node",
                format!("duplicate stable id {stable_id:?}"),
            ));
        }
        let mut props = props;
        props.insert("stId".to_string(), GraphValue::from(stable_id.clone()));
        let idx = inner.graph.add_node(NodeData {
            stable_id: stable_id.clone(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            props,
        });
        inner.by_stable.insert(stable_id, idx);
        Ok(())
    }

    /// Add a directed edge between two existing nodes.
    pub fn add_edge(
        &self,
        src: &str,
        dst: &str,
        rel_type: impl Into<String>,
        props: BTreeMap<String, GraphValue>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let from = *inner
            .by_stable
            .get(src)
            .ok_or_else(|| RiboError::invalid_config("edge", format!("unknown node {src:?}")))?;
        let to = *inner
            .by_stable
            .get(dst)
            .ok_or_else(|| RiboError::invalid_config("edge", format!("unknown node {dst:?}")))?;
        inner.graph.add_edge(
            from,
            to,
            EdgeData {
                rel_type: rel_type.into(),
                props,
            },
        );
        Ok(())
    }

    /// Add an edge with just a `score` property.
    pub fn add_scored_edge(
        &self,
        src: &str,
        dst: &str,
        rel_type: impl Into<String>,
        score: f64,
    ) -> Result<()> {
        let mut props = BTreeMap::new();
        props.insert("score".to_string(), GraphValue::from(score));
        self.add_edge(src, dst, rel_type, props)
    }

    /// Whether a named projection currently exists. Used by tests to
    /// verify ephemeral projections are dropped after traversal.
    pub fn has_projection(&self, name: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.projections.contains(name))
            .unwrap_or(false)
    }

    /// Number of live projections.
    pub fn projection_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.projections.len())
            .unwrap_or(0)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| RiboError::QueryFailed(format!("graph lock poisoned: {e}")))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| RiboError::QueryFailed(format!("graph lock poisoned: {e}")))
    }
}

fn param_str(params: &Params, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(GraphValue::as_str)
        .map(str::to_owned)
        .ok_or_else(|| RiboError::QueryFailed(format!("missing string parameter ${name}")))
}

fn param_int(params: &Params, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(GraphValue::as_int)
        .ok_or_else(|| RiboError::QueryFailed(format!("missing int parameter ${name}")))
}

fn param_str_list(params: &Params, name: &str) -> Result<Vec<String>> {
    params
        .get(name)
        .and_then(GraphValue::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .ok_or_else(|| RiboError::QueryFailed(format!("missing list parameter ${name}")))
}

fn param_int_list(params: &Params, name: &str) -> Result<Vec<i64>> {
    params
        .get(name)
        .and_then(GraphValue::as_list)
        .map(|items| items.iter().filter_map(GraphValue::as_int).collect())
        .ok_or_else(|| RiboError::QueryFailed(format!("missing list parameter ${name}")))
}

fn record<const N: usize>(fields: [(&str, GraphValue); N]) -> GraphRecord {
    GraphRecord::new(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

impl Inner {
    fn node_by_internal(&self, internal: i64) -> Option<(NodeIndex, &NodeData)> {
        if internal < 0 {
            return None;
        }
        let idx = NodeIndex::new(internal as usize);
        self.graph.node_weight(idx).map(|data| (idx, data))
    }

    /// Undirected neighbor ids of `idx`, sorted for deterministic BFS.
    fn undirected_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(idx, Direction::Incoming))
            .filter(|n| *n != idx)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn seed_nodes(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let ids = param_str_list(params, "ids")?;
        let mut records = Vec::new();
        for id in ids {
            if let Some(&idx) = self.by_stable.get(&id) {
                let data = &self.graph[idx];
                records.push(record([
                    ("node_id", GraphValue::from(data.stable_id.clone())),
                    (
                        "labels",
                        GraphValue::from(
                            data.labels
                                .iter()
                                .map(|l| GraphValue::from(l.clone()))
                                .collect::<Vec<_>>(),
                        ),
                    ),
                    ("props", GraphValue::Map(data.props.clone())),
                ]));
            }
        }
        Ok(records)
    }

    fn one_hop_neighbors(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let seed_ids = param_str_list(params, "seed_ids")?;
        let per_type = param_int(params, "per_type")?.max(0) as usize;

        let mut records = Vec::new();
        for seed_id in seed_ids {
            let Some(&seed_idx) = self.by_stable.get(&seed_id) else {
                continue;
            };

            // (score desc, neighbor id asc, edge id asc) per type.
            let mut buckets: BTreeMap<String, Vec<(f64, String, EdgeIndex, NodeIndex)>> =
                BTreeMap::new();
            for direction in [Direction::Outgoing, Direction::Incoming] {
                for edge in self.graph.edges_directed(seed_idx, direction) {
                    use petgraph::visit::EdgeRef;
                    let nbr_idx = if direction == Direction::Outgoing {
                        edge.target()
                    } else {
                        edge.source()
                    };
                    if nbr_idx == seed_idx {
                        continue;
                    }
                    let data = edge.weight();
                    buckets.entry(data.rel_type.clone()).or_default().push((
                        data.score(),
                        self.graph[nbr_idx].stable_id.clone(),
                        edge.id(),
                        nbr_idx,
                    ));
                }
            }

            for (rel_type, mut entries) in buckets {
                entries.sort_by(|a, b| {
                    b.0.total_cmp(&a.0)
                        .then_with(|| a.1.cmp(&b.1))
                        .then(a.2.cmp(&b.2))
                });
                for (score, nbr_id, edge_idx, nbr_idx) in entries.into_iter().take(per_type) {
                    let nbr = &self.graph[nbr_idx];
                    let (start, end) = self
                        .graph
                        .edge_endpoints(edge_idx)
                        .ok_or_else(|| RiboError::QueryFailed("edge vanished".to_string()))?;
                    let edge_data = &self.graph[edge_idx];
                    records.push(record([
                        ("seed_id", GraphValue::from(seed_id.clone())),
                        ("rel_type", GraphValue::from(rel_type.clone())),
                        ("neighbor_id", GraphValue::from(nbr_id)),
                        (
                            "neighbor_labels",
                            GraphValue::from(
                                nbr.labels
                                    .iter()
                                    .map(|l| GraphValue::from(l.clone()))
                                    .collect::<Vec<_>>(),
                            ),
                        ),
                        ("neighbor_props", GraphValue::Map(nbr.props.clone())),
                        (
                            "rel_start_id",
                            GraphValue::from(self.graph[start].stable_id.clone()),
                        ),
                        (
                            "rel_end_id",
                            GraphValue::from(self.graph[end].stable_id.clone()),
                        ),
                        ("rel_score", GraphValue::from(score)),
                        ("rel_props", GraphValue::Map(edge_data.props.clone())),
                    ]));
                }
            }
        }
        Ok(records)
    }

    fn stable_to_internal(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let stable_ids = param_str_list(params, "stable_ids")?;
        let mut records = Vec::new();
        for id in stable_ids {
            if let Some(&idx) = self.by_stable.get(&id) {
                records.push(record([
                    ("stable_id", GraphValue::from(id)),
                    ("internal_id", GraphValue::from(idx.index() as i64)),
                ]));
            }
        }
        Ok(records)
    }

    fn internal_to_stable(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let internal_ids = param_int_list(params, "internal_ids")?;
        let mut records = Vec::new();
        for internal in internal_ids {
            if let Some((_, data)) = self.node_by_internal(internal) {
                records.push(record([
                    ("internal_id", GraphValue::from(internal)),
                    ("stable_id", GraphValue::from(data.stable_id.clone())),
                ]));
            }
        }
        Ok(records)
    }

    fn steiner_stream(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let gname = param_str(params, "gname")?;
        if !self.projections.contains(&gname) {
            return Err(RiboError::QueryFailed(format!(
                "graph projection not found: {gname}"
            )));
        }
        let source = param_int(params, "source")?;
        let targets = param_int_list(params, "targets")?;
        let (source_idx, _) = self.node_by_internal(source).ok_or_else(|| {
            RiboError::QueryFailed(format!("source node not found: {source}"))
        })?;

        // Shortest-path heuristic: grow the tree by attaching each
        // target through its nearest tree node, unit edge weights.
        let mut tree: HashSet<NodeIndex> = HashSet::new();
        tree.insert(source_idx);
        let mut rows: Vec<(i64, i64, f64)> = vec![(source, source, 0.0)];

        for target in &targets {
            let Some((target_idx, _)) = self.node_by_internal(*target) else {
                continue;
            };
            if tree.contains(&target_idx) {
                continue;
            }

            // BFS outward from the target until a tree node appears;
            // bfs_parent points one step back toward the target.
            let mut bfs_parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
            let mut visited: HashSet<NodeIndex> = HashSet::new();
            let mut queue = VecDeque::new();
            visited.insert(target_idx);
            queue.push_back(target_idx);
            let mut attach: Option<NodeIndex> = None;
            'bfs: while let Some(current) = queue.pop_front() {
                for nbr in self.undirected_neighbors(current) {
                    if visited.contains(&nbr) {
                        continue;
                    }
                    visited.insert(nbr);
                    bfs_parent.insert(nbr, current);
                    if tree.contains(&nbr) {
                        attach = Some(nbr);
                        break 'bfs;
                    }
                    queue.push_back(nbr);
                }
            }

            let Some(attach_idx) = attach else {
                continue; // unreachable target produces no rows
            };

            // Walk back toward the target, adding each node with its
            // tree parent.
            let mut tree_parent = attach_idx;
            let mut current = bfs_parent.get(&attach_idx).copied();
            while let Some(node) = current {
                rows.push((node.index() as i64, tree_parent.index() as i64, 1.0));
                tree.insert(node);
                if node == target_idx {
                    break;
                }
                tree_parent = node;
                current = bfs_parent.get(&node).copied();
            }
        }

        Ok(rows
            .into_iter()
            .map(|(node_id, parent_id, weight)| {
                record([
                    ("nodeId", GraphValue::from(node_id)),
                    ("parentId", GraphValue::from(parent_id)),
                    ("weight", GraphValue::from(weight)),
                ])
            })
            .collect())
    }

    fn resolve_tree_edges(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let pairs = params
            .get("pairs")
            .and_then(GraphValue::as_list)
            .ok_or_else(|| RiboError::QueryFailed("missing list parameter $pairs".to_string()))?;

        let mut records = Vec::new();
        for pair in pairs {
            let Some(items) = pair.as_list() else {
                continue;
            };
            let (Some(u), Some(v)) = (
                items.first().and_then(GraphValue::as_int),
                items.get(1).and_then(GraphValue::as_int),
            ) else {
                continue;
            };
            let (Some((u_idx, _)), Some((v_idx, _))) =
                (self.node_by_internal(u), self.node_by_internal(v))
            else {
                continue;
            };

            // Either orientation; parallel edges resolve to the lowest
            // internal edge id.
            let best = self
                .graph
                .edges_connecting(u_idx, v_idx)
                .chain(self.graph.edges_connecting(v_idx, u_idx))
                .min_by_key(|edge| {
                    use petgraph::visit::EdgeRef;
                    edge.id()
                });
            let Some(edge) = best else {
                continue;
            };
            use petgraph::visit::EdgeRef;
            let data = edge.weight();
            records.push(record([
                ("u", GraphValue::from(u)),
                ("v", GraphValue::from(v)),
                ("rid", GraphValue::from(edge.id().index() as i64)),
                ("rel_type", GraphValue::from(data.rel_type.clone())),
                ("rel_props", GraphValue::Map(data.props.clone())),
                ("s", GraphValue::from(edge.source().index() as i64)),
                ("t", GraphValue::from(edge.target().index() as i64)),
            ]));
        }
        Ok(records)
    }

    fn tree_node_details(&self, params: &Params) -> Result<Vec<GraphRecord>> {
        let ids = param_int_list(params, "ids")?;
        let mut records = Vec::new();
        for internal in ids {
            if let Some((_, data)) = self.node_by_internal(internal) {
                records.push(record([
                    ("id", GraphValue::from(internal)),
                    (
                        "labels",
                        GraphValue::from(
                            data.labels
                                .iter()
                                .map(|l| GraphValue::from(l.clone()))
                                .collect::<Vec<_>>(),
                        ),
                    ),
                    ("props", GraphValue::Map(data.props.clone())),
                ]));
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl GraphQueryClient for MemoryGraphClient {
    async fn invoke(
        &self,
        query: &str,
        params: Params,
        _database: Option<&str>,
    ) -> Result<Vec<GraphRecord>> {
        {
            let inner = self.read()?;
            if inner.closed {
                return Err(RiboError::ClientClosed("memory graph".to_string()));
            }
        }

        match query {
            queries::SEED_NODES => self.read()?.seed_nodes(&params),
            queries::ONE_HOP_NEIGHBORS => self.read()?.one_hop_neighbors(&params),
            queries::STABLE_TO_INTERNAL => self.read()?.stable_to_internal(&params),
            queries::INTERNAL_TO_STABLE => self.read()?.internal_to_stable(&params),
            queries::STEINER_TREE_STREAM => self.read()?.steiner_stream(&params),
            queries::RESOLVE_TREE_EDGES => self.read()?.resolve_tree_edges(&params),
            queries::TREE_NODE_DETAILS => self.read()?.tree_node_details(&params),
            queries::PROJECT_EPHEMERAL_GRAPH => {
                let gname = param_str(&params, "gname")?;
                let mut inner = self.write()?;
                if !inner.projections.insert(gname.clone()) {
                    return Err(RiboError::QueryFailed(format!(
                        "graph projection already exists: {gname}"
                    )));
                }
                Ok(vec![record([("graphName", GraphValue::from(gname))])])
            }
            queries::DROP_GRAPH => {
                let gname = param_str(&params, "gname")?;
                let mut inner = self.write()?;
                if !inner.projections.remove(&gname) {
                    return Err(RiboError::QueryFailed(format!(
                        "graph projection not found: {gname}"
                    )));
                }
                Ok(Vec::new())
            }
            other => Err(RiboError::UnsupportedQuery(
                other.lines().next().unwrap_or(other).to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::params;

    fn fixture() -> MemoryGraphClient {
        let client = MemoryGraphClient::new();
        for id in ["A", "B", "C", "D"] {
            client.add_node(id, &["Pathway"], BTreeMap::new()).unwrap();
        }
        client.add_scored_edge("A", "B", "PartOf", 0.9).unwrap();
        client.add_scored_edge("B", "C", "HasInput", 0.5).unwrap();
        client.add_scored_edge("A", "C", "AssociatedWith", 0.1).unwrap();
        client
    }

    #[tokio::test]
    async fn seed_lookup_skips_missing_ids() {
        let client = fixture();
        let records = client
            .invoke(
                queries::SEED_NODES,
                params([("ids", GraphValue::from(vec!["A", "missing"]))]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].require_str("node_id").unwrap(), "A");
    }

    #[tokio::test]
    async fn one_hop_respects_per_type_slice() {
        let client = fixture();
        client.add_scored_edge("A", "D", "PartOf", 0.2).unwrap();
        let records = client
            .invoke(
                queries::ONE_HOP_NEIGHBORS,
                params([
                    ("seed_ids", GraphValue::from(vec!["A"])),
                    ("per_type", GraphValue::from(1i64)),
                ]),
                None,
            )
            .await
            .unwrap();
        let part_of: Vec<_> = records
            .iter()
            .filter(|r| r.require_str("rel_type").unwrap() == "PartOf")
            .collect();
        assert_eq!(part_of.len(), 1);
        // Higher score wins the slice.
        assert_eq!(part_of[0].require_str("neighbor_id").unwrap(), "B");
    }

    #[tokio::test]
    async fn steiner_stream_requires_projection() {
        let client = fixture();
        let err = client
            .invoke(
                queries::STEINER_TREE_STREAM,
                params([
                    ("gname", GraphValue::from("nope")),
                    ("source", GraphValue::from(0i64)),
                    ("targets", GraphValue::from(vec![GraphValue::from(1i64)])),
                ]),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RiboError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn projection_lifecycle() {
        let client = fixture();
        client
            .invoke(
                queries::PROJECT_EPHEMERAL_GRAPH,
                params([("gname", GraphValue::from("g1"))]),
                None,
            )
            .await
            .unwrap();
        assert!(client.has_projection("g1"));
        client
            .invoke(
                queries::DROP_GRAPH,
                params([("gname", GraphValue::from("g1"))]),
                None,
            )
            .await
            .unwrap();
        assert!(!client.has_projection("g1"));
    }

    #[tokio::test]
    async fn unsupported_query_is_distinguishable() {
        let client = fixture();
        let err = client
            .invoke("MATCH (n) RETURN n", Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RiboError::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn closed_client_rejects_queries() {
        let client = fixture();
        client.close().await.unwrap();
        let err = client
            .invoke(queries::SEED_NODES, Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RiboError::ClientClosed(_)));
    }
}
