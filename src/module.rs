use std::collections::HashMap;

use log::debug;

use crate::error::SpliceError;
use crate::graph::{EdgeId, ExonId, SpliceGraph};

/// One alternative-splicing module: a non-trivial biconnected component of
/// the gene's splice graph, materialised as a checked subgraph.
///
/// Nodes are kept in genomic order; `rank` (the index into that order) is
/// the working coordinate for the selector and estimator. The genomic order
/// is also a topological order, because every edge goes forward.
///
/// Checked at construction:
/// - the subgraph is weakly connected and biconnected
/// - exactly one node has in-degree 0 (the module source) and exactly one
///   has out-degree 0 (the module sink); anything else is an AFE/ALE-like
///   event and is rejected as `ModuleTopology`
#[derive(Debug, Clone)]
pub struct Module {
    nodes: Vec<ExonId>,
    rank_of: HashMap<ExonId, usize>,

    /// rank -> child ranks, ascending
    succ: Vec<Vec<usize>>,
    /// rank -> parent ranks, ascending
    pred: Vec<Vec<usize>>,

    /// local edge list: (tail rank, head rank, graph edge id)
    edges: Vec<(usize, usize, EdgeId)>,
    edge_at: HashMap<(usize, usize), usize>,

    span: (u32, u32),
}

impl Module {
    /// Materialise a component (any node order) into a checked module.
    pub fn build(graph: &SpliceGraph, component: &[ExonId]) -> Result<Self, SpliceError> {
        if component.len() <= 2 {
            return Err(SpliceError::InvalidGraph {
                reason: format!(
                    "component with {} exon(s) carries no alternative-splicing information",
                    component.len()
                ),
            });
        }

        let mut nodes: Vec<ExonId> = component.to_vec();
        nodes.sort_by_key(|&id| graph.exon(id));
        nodes.dedup();

        let rank_of: HashMap<ExonId, usize> =
            nodes.iter().enumerate().map(|(r, &id)| (id, r)).collect();

        let n = nodes.len();
        let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut edges: Vec<(usize, usize, EdgeId)> = Vec::new();

        for (tail, &id) in nodes.iter().enumerate() {
            for &next in graph.successors(id) {
                if let Some(&head) = rank_of.get(&next) {
                    let e = graph
                        .edge_between(id, next)
                        .expect("successor implies edge");
                    edges.push((tail, head, e));
                    succ[tail].push(head);
                    pred[head].push(tail);
                }
            }
        }
        edges.sort_unstable_by_key(|&(t, h, _)| (t, h));
        for s in &mut succ {
            s.sort_unstable();
        }
        for p in &mut pred {
            p.sort_unstable();
        }

        let edge_at: HashMap<(usize, usize), usize> = edges
            .iter()
            .enumerate()
            .map(|(i, &(t, h, _))| ((t, h), i))
            .collect();

        let span = (
            graph.exon(nodes[0]).start,
            graph.exon(nodes[n - 1]).end,
        );
        let label = format!("{}-{}", span.0, span.1);

        // Undirected view for the connectivity checks.
        let mut undirected: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(t, h, _) in &edges {
            undirected[t].push(h);
            undirected[h].push(t);
        }

        if !is_connected(&undirected) {
            return Err(SpliceError::InvalidGraph {
                reason: format!("module {} is not weakly connected", label),
            });
        }
        let bcc = biconnected_components(&undirected);
        if !(bcc.len() == 1 && bcc[0].len() == n) {
            return Err(SpliceError::InvalidGraph {
                reason: format!("module {} is not biconnected", label),
            });
        }

        let sources: Vec<usize> = (0..n).filter(|&r| pred[r].is_empty()).collect();
        let sinks: Vec<usize> = (0..n).filter(|&r| succ[r].is_empty()).collect();
        if sources.len() != 1 {
            return Err(SpliceError::ModuleTopology {
                module: label,
                reason: format!("{} entry exons (AFE-like event)", sources.len()),
            });
        }
        if sinks.len() != 1 {
            return Err(SpliceError::ModuleTopology {
                module: label,
                reason: format!("{} terminal exons (ALE-like event)", sinks.len()),
            });
        }

        Ok(Self {
            nodes,
            rank_of,
            succ,
            pred,
            edges,
            edge_at,
            span,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Module nodes in genomic (= topological) order.
    pub fn nodes(&self) -> &[ExonId] {
        &self.nodes
    }

    pub fn node_at(&self, rank: usize) -> ExonId {
        self.nodes[rank]
    }

    pub fn rank_of(&self, id: ExonId) -> Option<usize> {
        self.rank_of.get(&id).copied()
    }

    pub fn contains(&self, id: ExonId) -> bool {
        self.rank_of.contains_key(&id)
    }

    /// The single entry exon (in-degree 0).
    pub fn source(&self) -> ExonId {
        self.nodes[0]
    }

    /// The single terminal exon (out-degree 0).
    pub fn sink(&self) -> ExonId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn successors(&self, rank: usize) -> &[usize] {
        &self.succ[rank]
    }

    pub fn predecessors(&self, rank: usize) -> &[usize] {
        &self.pred[rank]
    }

    /// Local edges as (tail rank, head rank, graph edge id).
    pub fn edges(&self) -> &[(usize, usize, EdgeId)] {
        &self.edges
    }

    pub fn edge_between(&self, tail: usize, head: usize) -> Option<usize> {
        self.edge_at.get(&(tail, head)).copied()
    }

    pub fn graph_edge(&self, local: usize) -> EdgeId {
        self.edges[local].2
    }

    /// Observed read support per local edge, read off the immutable graph
    /// weights.
    pub fn observed_weights(&self, graph: &SpliceGraph) -> Vec<f64> {
        self.edges
            .iter()
            .map(|&(_, _, e)| graph.edge(e).weight)
            .collect()
    }

    /// Genomic span `[start, end)` from first node start to last node end.
    pub fn span(&self) -> (u32, u32) {
        self.span
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.span.0, self.span.1)
    }

    pub fn path_to_exon_ids(&self, ranks: &[usize]) -> Vec<ExonId> {
        ranks.iter().map(|&r| self.nodes[r]).collect()
    }
}

/// Split a gene's splice graph into alternative-splicing components:
/// biconnected components of the undirected view, with trivial dyads
/// (≤ 2 nodes) discarded. No side effects on the graph.
///
/// Node sets are returned in genomic order, components ordered by span, so
/// repeated runs on the same graph yield identical output.
pub fn partition_components(graph: &SpliceGraph) -> Result<Vec<Vec<ExonId>>, SpliceError> {
    if graph.is_empty() {
        return Err(SpliceError::InvalidGraph {
            reason: "graph has no exons".to_string(),
        });
    }

    // Work in genomic-rank space for deterministic traversal.
    let mut order: Vec<ExonId> = (0..graph.exon_count()).collect();
    order.sort_by_key(|&id| graph.exon(id));
    let mut rank_of: HashMap<ExonId, usize> = HashMap::with_capacity(order.len());
    for (r, &id) in order.iter().enumerate() {
        rank_of.insert(id, r);
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
    for edge in graph.edges() {
        let t = rank_of[&edge.from];
        let h = rank_of[&edge.to];
        adj[t].push(h);
        adj[h].push(t);
    }
    for a in &mut adj {
        a.sort_unstable();
        a.dedup();
    }

    let mut components: Vec<Vec<ExonId>> = biconnected_components(&adj)
        .into_iter()
        .filter(|c| c.len() > 2)
        .map(|ranks| ranks.into_iter().map(|r| order[r]).collect())
        .collect();
    components.sort_by_key(|c| graph.exon(c[0]));

    debug!(
        "partitioned {} exons / {} junctions into {} module component(s)",
        graph.exon_count(),
        graph.edge_count(),
        components.len()
    );
    Ok(components)
}

/// Partition and materialise every module, keeping per-module failures
/// isolated so the remaining modules of the gene can still be processed.
pub fn partition_modules(
    graph: &SpliceGraph,
) -> Result<Vec<Result<Module, SpliceError>>, SpliceError> {
    let components = partition_components(graph)?;
    Ok(components
        .iter()
        .map(|c| Module::build(graph, c))
        .collect())
}

fn is_connected(adj: &[Vec<usize>]) -> bool {
    if adj.is_empty() {
        return false;
    }
    let mut seen = vec![false; adj.len()];
    let mut stack = vec![0usize];
    seen[0] = true;
    let mut count = 1;
    while let Some(v) = stack.pop() {
        for &w in &adj[v] {
            if !seen[w] {
                seen[w] = true;
                count += 1;
                stack.push(w);
            }
        }
    }
    count == adj.len()
}

/// Biconnected components of an undirected graph (iterative Hopcroft-Tarjan).
///
/// Returns each component as a sorted vertex set. Isolated vertices yield no
/// component; a bridge yields its two-vertex dyad.
fn biconnected_components(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    const UNSEEN: usize = usize::MAX;

    let mut disc = vec![UNSEEN; n];
    let mut low = vec![0usize; n];
    let mut parent = vec![UNSEEN; n];
    let mut next_child = vec![0usize; n];

    let mut edge_stack: Vec<(usize, usize)> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut time = 0usize;

    for root in 0..n {
        if disc[root] != UNSEEN {
            continue;
        }
        disc[root] = time;
        low[root] = time;
        time += 1;

        let mut stack = vec![root];
        while let Some(&v) = stack.last() {
            if next_child[v] < adj[v].len() {
                let w = adj[v][next_child[v]];
                next_child[v] += 1;

                if disc[w] == UNSEEN {
                    parent[w] = v;
                    disc[w] = time;
                    low[w] = time;
                    time += 1;
                    edge_stack.push((v, w));
                    stack.push(w);
                } else if w != parent[v] && disc[w] < disc[v] {
                    // back edge, recorded once from the descendant side
                    edge_stack.push((v, w));
                    low[v] = low[v].min(disc[w]);
                }
            } else {
                stack.pop();
                if let Some(&u) = stack.last() {
                    low[u] = low[u].min(low[v]);
                    if low[v] >= disc[u] {
                        // u closes a biconnected component rooted at edge (u, v)
                        let mut members: Vec<usize> = Vec::new();
                        while let Some(&(a, b)) = edge_stack.last() {
                            edge_stack.pop();
                            members.push(a);
                            members.push(b);
                            if (a, b) == (u, v) {
                                break;
                            }
                        }
                        members.sort_unstable();
                        members.dedup();
                        if !members.is_empty() {
                            components.push(members);
                        }
                    }
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Exon, Strand};

    fn ex(s: u32, e: u32) -> Exon {
        Exon::new(s, e)
    }

    /// Skipped-exon gene: flanks (0,10) and (50,60), cassette (20,30),
    /// plus a distal constitutive exon (100,110) attached by a single edge.
    fn skipped_exon_graph() -> SpliceGraph {
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60), ex(100, 110)])
            .unwrap();
        g.add_transcript_path(&[ex(0, 10), ex(50, 60), ex(100, 110)])
            .unwrap();
        g
    }

    #[test]
    fn partition_discards_trivial_dyads() {
        let g = skipped_exon_graph();
        let comps = partition_components(&g).unwrap();

        // the (50,60)-(100,110) bridge is a dyad and must be dropped
        assert_eq!(comps.len(), 1);
        let exons: Vec<Exon> = comps[0].iter().map(|&id| g.exon(id)).collect();
        assert_eq!(exons, vec![ex(0, 10), ex(20, 30), ex(50, 60)]);
    }

    #[test]
    fn partition_is_idempotent() {
        let g = skipped_exon_graph();
        let a = partition_components(&g).unwrap();
        let b = partition_components(&g).unwrap();
        assert_eq!(a, b);

        // node insertion order must not matter: same gene, paths reversed
        let mut g2 = SpliceGraph::new("chr1", Strand::Plus);
        g2.add_transcript_path(&[ex(0, 10), ex(50, 60), ex(100, 110)])
            .unwrap();
        g2.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60), ex(100, 110)])
            .unwrap();
        let c = partition_components(&g2).unwrap();
        let to_exons = |g: &SpliceGraph, comps: &[Vec<ExonId>]| -> Vec<Vec<Exon>> {
            comps
                .iter()
                .map(|c| c.iter().map(|&id| g.exon(id)).collect())
                .collect()
        };
        assert_eq!(to_exons(&g, &a), to_exons(&g2, &c));
    }

    #[test]
    fn partition_rejects_empty_graph() {
        let g = SpliceGraph::new("chr1", Strand::Plus);
        assert!(matches!(
            partition_components(&g),
            Err(SpliceError::InvalidGraph { .. })
        ));
    }

    #[test]
    fn module_identifies_source_and_sink() {
        let g = skipped_exon_graph();
        let comps = partition_components(&g).unwrap();
        let m = Module::build(&g, &comps[0]).unwrap();

        assert_eq!(m.num_nodes(), 3);
        assert_eq!(m.num_edges(), 3);
        assert_eq!(g.exon(m.source()), ex(0, 10));
        assert_eq!(g.exon(m.sink()), ex(50, 60));
        assert_eq!(m.span(), (0, 60));

        // genomic order is topological order
        assert_eq!(m.successors(0), &[1, 2]);
        assert_eq!(m.successors(1), &[2]);
        assert!(m.successors(2).is_empty());
    }

    #[test]
    fn module_with_two_sources_and_sinks_is_rejected() {
        // K2,2-like event: two entry exons, two terminal exons. Undirected
        // it is a cycle (biconnected), so only the topology check trips.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        let (a, b, c, d) = (ex(0, 10), ex(20, 30), ex(40, 50), ex(60, 70));
        g.add_junction(a, c).unwrap();
        g.add_junction(a, d).unwrap();
        g.add_junction(b, c).unwrap();
        g.add_junction(b, d).unwrap();

        let comps = partition_components(&g).unwrap();
        assert_eq!(comps.len(), 1);
        let err = Module::build(&g, &comps[0]).unwrap_err();
        assert!(matches!(err, SpliceError::ModuleTopology { .. }));
    }

    #[test]
    fn module_build_rejects_trivial_component() {
        let g = skipped_exon_graph();
        let ids: Vec<ExonId> = vec![
            g.exon_id(ex(50, 60)).unwrap(),
            g.exon_id(ex(100, 110)).unwrap(),
        ];
        assert!(matches!(
            Module::build(&g, &ids),
            Err(SpliceError::InvalidGraph { .. })
        ));
    }

    #[test]
    fn multi_module_gene_splits_into_independent_events() {
        // Two cassette events sharing the constitutive exon (50,60).
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[
            ex(0, 10),
            ex(20, 30),
            ex(50, 60),
            ex(70, 80),
            ex(90, 100),
        ])
        .unwrap();
        g.add_transcript_path(&[ex(0, 10), ex(50, 60), ex(90, 100)])
            .unwrap();

        let comps = partition_components(&g).unwrap();
        assert_eq!(comps.len(), 2);

        let m0 = Module::build(&g, &comps[0]).unwrap();
        let m1 = Module::build(&g, &comps[1]).unwrap();
        assert_eq!(m0.span(), (0, 60));
        assert_eq!(m1.span(), (50, 100));
        // the shared constitutive exon sits on both module boundaries
        assert_eq!(g.exon(m0.sink()), ex(50, 60));
        assert_eq!(g.exon(m1.source()), ex(50, 60));
    }
}
