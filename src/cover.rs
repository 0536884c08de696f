use std::collections::BTreeSet;

use log::debug;

use crate::error::SpliceError;
use crate::graph::{ExonId, SpliceGraph};
use crate::module::Module;
use crate::types::EngineOptions;

/// Grow a minimal practical isoform set for one module: every junction must
/// be explained by at least one isoform, annotated paths are preferred, and
/// as few novel paths as possible are introduced.
///
/// The selector works on its own mutable copy of the edge weights (the
/// "priority" weights); the graph's observed weights are never touched, so
/// the abundance estimator later sees undecayed counts.
///
/// Returned paths are exon-id sequences from module source to sink,
/// deduplicated, with clipped annotation paths first and novel paths in
/// selection order.
pub fn select_isoforms(
    graph: &SpliceGraph,
    module: &Module,
    opts: EngineOptions,
) -> Result<Vec<Vec<ExonId>>, SpliceError> {
    let num_edges = module.num_edges();
    let mut explained = vec![false; num_edges];
    let mut explained_count = 0usize;

    let seeds = clip_annotation_paths(graph, module);
    for path in &seeds {
        for w in path.windows(2) {
            if let Some(e) = module.edge_between(w[0], w[1]) {
                if !explained[e] {
                    explained[e] = true;
                    explained_count += 1;
                }
            }
        }
    }
    debug!(
        "module {}: {} annotated path(s) explain {}/{} junction(s)",
        module.label(),
        seeds.len(),
        explained_count,
        num_edges
    );

    // Working copy; decayed per selection, never written back to the graph.
    let mut priority = module.observed_weights(graph);

    let mut isoforms: Vec<Vec<usize>> = seeds;
    while explained_count < num_edges {
        let path = longest_unexplained_path(module, &priority, &explained);

        let newly: usize = path
            .windows(2)
            .map(|w| edge_of(module, w))
            .filter(|&e| !explained[e])
            .count();
        if newly == 0 {
            // Highest-priority path is fully explained but junctions remain:
            // the leftover edges cannot be reached with any positive score.
            return Err(SpliceError::CoveringStall {
                module: module.label(),
                unexplained: num_edges - explained_count,
            });
        }

        for w in path.windows(2) {
            let e = edge_of(module, w);
            if !explained[e] {
                explained[e] = true;
                explained_count += 1;
            }
            // Down-scale so this path stops dominating later relaxations.
            priority[e] /= opts.decay_factor;
        }

        debug!(
            "module {}: novel isoform explains {} junction(s) ({}/{} covered)",
            module.label(),
            newly,
            explained_count,
            num_edges
        );
        isoforms.push(path);
    }

    // De-duplicate while preserving order (annotated first, then novel).
    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut out: Vec<Vec<ExonId>> = Vec::new();
    for path in isoforms {
        if seen.insert(path.clone()) {
            out.push(module.path_to_exon_ids(&path));
        }
    }
    Ok(out)
}

/// Annotation transcript paths clipped to the module: paths traversing both
/// the module source and sink are truncated to that window, deduplicated and
/// returned in genomic order (as module ranks).
fn clip_annotation_paths(graph: &SpliceGraph, module: &Module) -> Vec<Vec<usize>> {
    let src = module.source();
    let snk = module.sink();

    let mut unique: BTreeSet<Vec<usize>> = BTreeSet::new();
    for path in graph.annotation_paths() {
        let Some(i) = path.iter().position(|&id| id == src) else {
            continue;
        };
        let Some(j) = path.iter().position(|&id| id == snk) else {
            continue;
        };
        if j <= i {
            continue;
        }

        let ranks: Option<Vec<usize>> = path[i..=j]
            .iter()
            .map(|&id| module.rank_of(id))
            .collect();
        if let Some(ranks) = ranks {
            unique.insert(ranks);
        }
    }
    unique.into_iter().collect()
}

fn edge_of(module: &Module, pair: &[usize]) -> usize {
    module
        .edge_between(pair[0], pair[1])
        .expect("path follows module edges")
}

/// Single topological pass of a longest-path relaxation from module source
/// to sink, in node rank order (genomic order, source first).
///
/// Explained edges contribute zero, forcing the search toward novel
/// junctions; unexplained edges contribute their current priority weight.
/// Ties at a head node are broken toward the incoming edge with the larger
/// raw edge weight (not the accumulated path score), which retains
/// evidence-dense branches.
fn longest_unexplained_path(
    module: &Module,
    priority: &[f64],
    explained: &[bool],
) -> Vec<usize> {
    let n = module.num_nodes();
    let mut score = vec![f64::NEG_INFINITY; n];
    let mut best_pred: Vec<Option<usize>> = vec![None; n];
    score[0] = 0.0;

    for tail in 0..n {
        if score[tail] == f64::NEG_INFINITY {
            continue;
        }
        for &head in module.successors(tail) {
            let e = module
                .edge_between(tail, head)
                .expect("successor implies edge");
            let contribution = if explained[e] { 0.0 } else { priority[e] };
            let cand = score[tail] + contribution;

            if cand > score[head] {
                score[head] = cand;
                best_pred[head] = Some(tail);
            } else if cand == score[head] {
                if let Some(prev) = best_pred[head] {
                    let prev_e = module
                        .edge_between(prev, head)
                        .expect("predecessor implies edge");
                    if priority[e] > priority[prev_e] {
                        best_pred[head] = Some(tail);
                    }
                }
            }
        }
    }

    let mut path = vec![n - 1];
    let mut cur = n - 1;
    while cur != 0 {
        // The module is weakly connected with a single source, so every node
        // is reachable and the chain terminates at rank 0.
        cur = best_pred[cur].expect("sink reachable from module source");
        path.push(cur);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::partition_components;
    use crate::types::{Exon, Strand};

    fn ex(s: u32, e: u32) -> Exon {
        Exon::new(s, e)
    }

    fn build_module(g: &SpliceGraph) -> Module {
        let comps = partition_components(g).unwrap();
        assert_eq!(comps.len(), 1);
        Module::build(g, &comps[0]).unwrap()
    }

    fn as_exons(g: &SpliceGraph, paths: &[Vec<ExonId>]) -> Vec<Vec<Exon>> {
        paths
            .iter()
            .map(|p| p.iter().map(|&id| g.exon(id)).collect())
            .collect()
    }

    #[test]
    fn annotated_paths_covering_everything_add_no_novel_isoforms() {
        // Scenario: annotation already explains every junction.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60)])
            .unwrap();
        g.add_transcript_path(&[ex(0, 10), ex(50, 60)]).unwrap();
        g.set_junction_weight(ex(0, 10), ex(20, 30), 2.0).unwrap();
        g.set_junction_weight(ex(20, 30), ex(50, 60), 2.0).unwrap();
        g.set_junction_weight(ex(0, 10), ex(50, 60), 8.0).unwrap();

        let m = build_module(&g);
        let isoforms = select_isoforms(&g, &m, EngineOptions::default()).unwrap();

        assert_eq!(
            as_exons(&g, &isoforms),
            vec![
                vec![ex(0, 10), ex(20, 30), ex(50, 60)],
                vec![ex(0, 10), ex(50, 60)],
            ]
        );
    }

    #[test]
    fn novel_junction_yields_exactly_one_novel_isoform() {
        // Annotation knows only the inclusion path; the skipping junction is
        // observed in RNA-seq only.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[ex(0, 10), ex(20, 30), ex(50, 60)])
            .unwrap();
        g.set_junction_weight(ex(0, 10), ex(20, 30), 2.0).unwrap();
        g.set_junction_weight(ex(20, 30), ex(50, 60), 2.0).unwrap();
        g.set_junction_weight(ex(0, 10), ex(50, 60), 8.0).unwrap();

        let m = build_module(&g);
        let isoforms = select_isoforms(&g, &m, EngineOptions::default()).unwrap();

        assert_eq!(
            as_exons(&g, &isoforms),
            vec![
                vec![ex(0, 10), ex(20, 30), ex(50, 60)],
                vec![ex(0, 10), ex(50, 60)],
            ]
        );
    }

    #[test]
    fn every_junction_is_explained_after_selection() {
        // Five-node module with a shared trunk junction and no annotation.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        let (s, a, b, c, k) = (ex(0, 10), ex(20, 30), ex(40, 50), ex(60, 70), ex(80, 90));
        g.set_junction_weight(s, a, 6.0).unwrap();
        g.set_junction_weight(a, b, 4.0).unwrap();
        g.set_junction_weight(a, c, 2.0).unwrap();
        g.set_junction_weight(b, k, 4.0).unwrap();
        g.set_junction_weight(c, k, 2.0).unwrap();
        g.set_junction_weight(s, k, 3.0).unwrap();

        let m = build_module(&g);
        let isoforms = select_isoforms(&g, &m, EngineOptions::default()).unwrap();

        let mut covered = vec![false; m.num_edges()];
        for path in &isoforms {
            for w in path.windows(2) {
                let t = m.rank_of(w[0]).unwrap();
                let h = m.rank_of(w[1]).unwrap();
                covered[m.edge_between(t, h).unwrap()] = true;
            }
        }
        assert!(covered.iter().all(|&c| c), "uncovered junction remains");
    }

    #[test]
    fn ties_prefer_the_heavier_incoming_edge() {
        // Diamond where both arms score 10; the arm whose edge into the sink
        // is heavier must win.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        let (s, a, b, k) = (ex(0, 10), ex(20, 30), ex(40, 50), ex(60, 70));
        g.set_junction_weight(s, a, 5.0).unwrap();
        g.set_junction_weight(a, k, 5.0).unwrap();
        g.set_junction_weight(s, b, 4.0).unwrap();
        g.set_junction_weight(b, k, 6.0).unwrap();

        let m = build_module(&g);
        let isoforms = select_isoforms(&g, &m, EngineOptions::default()).unwrap();

        // first selected path goes through b: 6.0 beats 5.0 into the sink
        assert_eq!(
            as_exons(&g, &isoforms)[0],
            vec![ex(0, 10), ex(40, 50), ex(60, 70)]
        );
        assert_eq!(isoforms.len(), 2);
    }

    #[test]
    fn unexplainable_zero_weight_junctions_stall_the_covering() {
        // Triangle where the only novel junctions have zero weight: the
        // relaxation keeps picking the explained direct path.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        let (s, a, k) = (ex(0, 10), ex(20, 30), ex(50, 60));
        g.add_transcript_path(&[s, k]).unwrap();
        g.add_junction(s, a).unwrap();
        g.add_junction(a, k).unwrap();
        g.set_junction_weight(s, k, 8.0).unwrap();

        let m = build_module(&g);
        let err = select_isoforms(&g, &m, EngineOptions::default()).unwrap_err();
        match err {
            SpliceError::CoveringStall { unexplained, .. } => assert_eq!(unexplained, 2),
            other => panic!("expected CoveringStall, got {other}"),
        }
    }

    #[test]
    fn clipping_truncates_annotation_at_module_boundaries() {
        // Transcripts extend past the module on both sides.
        let mut g = SpliceGraph::new("chr1", Strand::Plus);
        g.add_transcript_path(&[
            ex(0, 5),
            ex(10, 20),
            ex(30, 40),
            ex(50, 60),
            ex(70, 80),
        ])
        .unwrap();
        g.add_transcript_path(&[ex(0, 5), ex(10, 20), ex(50, 60), ex(70, 80)])
            .unwrap();

        let comps = partition_components(&g).unwrap();
        let m = Module::build(&g, &comps[0]).unwrap();
        assert_eq!(m.span(), (10, 60));

        let clipped = clip_annotation_paths(&g, &m);
        let clipped: Vec<Vec<Exon>> = clipped
            .iter()
            .map(|p| p.iter().map(|&r| g.exon(m.node_at(r))).collect())
            .collect();
        assert_eq!(
            clipped,
            vec![
                vec![ex(10, 20), ex(30, 40), ex(50, 60)],
                vec![ex(10, 20), ex(50, 60)],
            ]
        );
    }
}
