//! Query text used by the traversal strategies.
//!
//! These strings are an internal contract between the strategies and
//! the graph backend, not a stable external API. The bundled
//! [`crate::MemoryGraphClient`] recognises exactly these forms; a
//! remote backend passes them through to its query engine verbatim.

/// Fetch seed nodes by stable identifier.
/// Params: `ids` (list of string).
pub const SEED_NODES: &str = "\
MATCH (n) WHERE n.stId IN $ids
RETURN n.stId AS node_id, labels(n) AS labels, properties(n) AS props";

/// Direct neighbors of each seed, sliced per relation type.
/// Params: `seed_ids` (list of string), `per_type` (int).
pub const ONE_HOP_NEIGHBORS: &str = "\
UNWIND $seed_ids AS seed_id
MATCH (seed {stId: seed_id})-[rel]-(nbr)
WHERE seed <> nbr
WITH seed_id, type(rel) AS rel_type, rel, nbr
ORDER BY coalesce(rel.score, 0.0) DESC, nbr.stId ASC, id(rel) ASC
WITH seed_id, rel_type, collect({nbr: nbr, rel: rel})[0..$per_type] AS pairs
UNWIND pairs AS pair
RETURN
  seed_id,
  rel_type,
  pair.nbr.stId AS neighbor_id,
  labels(pair.nbr) AS neighbor_labels,
  properties(pair.nbr) AS neighbor_props,
  startNode(pair.rel).stId AS rel_start_id,
  endNode(pair.rel).stId AS rel_end_id,
  coalesce(pair.rel.score, 0.0) AS rel_score,
  properties(pair.rel) AS rel_props";

/// Translate stable identifiers to the engine's internal node ids.
/// Params: `stable_ids` (list of string).
pub const STABLE_TO_INTERNAL: &str = "\
UNWIND $stable_ids AS stable_id
MATCH (n {stId: stable_id})
RETURN stable_id, id(n) AS internal_id";

/// Translate internal node ids back to stable identifiers.
/// Params: `internal_ids` (list of int).
pub const INTERNAL_TO_STABLE: &str = "\
UNWIND $internal_ids AS internal_id
MATCH (n) WHERE id(n) = internal_id
RETURN id(n) AS internal_id, n.stId AS stable_id";

/// Project an ephemeral undirected graph for tree computations.
/// Params: `gname` (string).
pub const PROJECT_EPHEMERAL_GRAPH: &str = "\
CALL gds.graph.project($gname, '*',
  {ALL: {type: '*', orientation: 'UNDIRECTED'}}
)
YIELD graphName";

/// Stream a minimum-weight Steiner tree over a named projection.
/// Params: `gname` (string), `source` (int), `targets` (list of int).
pub const STEINER_TREE_STREAM: &str = "\
CALL gds.steinerTree.stream($gname, {
  sourceNode: $source,
  targetNodes: $targets
})
YIELD nodeId, parentId, weight
RETURN nodeId, parentId, weight";

/// Resolve parent/child node pairs to concrete edges, picking the
/// lowest internal edge id when parallel edges exist.
/// Params: `pairs` (list of `[parent, child]` int pairs).
pub const RESOLVE_TREE_EDGES: &str = "\
UNWIND $pairs AS p
WITH p[0] AS u, p[1] AS v
MATCH (a) WHERE id(a) = u
MATCH (b) WHERE id(b) = v
MATCH (a)-[r]-(b)
WITH u, v, r
ORDER BY id(r) ASC
WITH u, v, head(collect(r)) AS r
RETURN
  u, v,
  id(r) AS rid,
  type(r) AS rel_type,
  properties(r) AS rel_props,
  id(startNode(r)) AS s,
  id(endNode(r)) AS t";

/// Labels and properties for a set of internal node ids.
/// Params: `ids` (list of int).
pub const TREE_NODE_DETAILS: &str = "\
UNWIND $ids AS nid
MATCH (n) WHERE id(n) = nid
RETURN id(n) AS id, labels(n) AS labels, properties(n) AS props";

/// Drop a named graph projection.
/// Params: `gname` (string).
pub const DROP_GRAPH: &str = "CALL gds.graph.drop($gname)";
