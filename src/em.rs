use std::fmt;

use log::debug;
use serde::{Serialize, Serializer};

use crate::graph::{ExonId, SpliceGraph};
use crate::module::Module;
use crate::types::EngineOptions;

/// Percent-Spliced-In of a target exon.
///
/// Zero estimated reads on both the inclusion and skipping side is an
/// expected condition under low coverage, so it is a value, not an error:
/// `Undefined` is reported explicitly instead of being coerced to 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Psi {
    Defined(f64),
    Undefined,
}

impl Psi {
    pub fn value(self) -> Option<f64> {
        match self {
            Psi::Defined(v) => Some(v),
            Psi::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Psi::Defined(_))
    }
}

impl fmt::Display for Psi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Psi::Defined(v) => write!(f, "{:.4}", v),
            Psi::Undefined => write!(f, "NA"),
        }
    }
}

// JSON: a number, or null when not computable.
impl Serialize for Psi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Psi::Defined(v) => serializer.serialize_some(v),
            Psi::Undefined => serializer.serialize_none(),
        }
    }
}

/// Estimate per-isoform read counts by iterative proportional reassignment.
///
/// An edge-by-isoform incidence matrix is seeded with each edge's *observed*
/// count wherever an isoform traverses it (the graph weights are never the
/// selector's decayed copy). Each E-step reassigns every edge row in
/// proportion to the current isoform probabilities, renormalised so the row
/// still sums to the edge's observed count; the M-step recomputes the
/// probabilities from the column sums. Iteration stops when the total
/// absolute probability change drops below `opts.em_epsilon`, or at
/// `opts.em_max_iters`.
///
/// Returns one estimated count per isoform (`total_reads * p_i`). With no
/// isoforms or no reads, all abundances are zero; no division happens.
pub fn estimate_read_counts(
    graph: &SpliceGraph,
    module: &Module,
    isoforms: &[Vec<ExonId>],
    opts: EngineOptions,
) -> Vec<f64> {
    let num_tx = isoforms.len();
    if num_tx == 0 {
        return Vec::new();
    }

    let read_counts = module.observed_weights(graph);
    let total: f64 = read_counts.iter().sum();
    if total <= 0.0 {
        return vec![0.0; num_tx];
    }

    // Incidence matrix: edge row x isoform column.
    let mut y = vec![vec![0.0f64; num_tx]; read_counts.len()];
    for (tx, path) in isoforms.iter().enumerate() {
        for w in path.windows(2) {
            let (Some(t), Some(h)) = (module.rank_of(w[0]), module.rank_of(w[1])) else {
                continue;
            };
            if let Some(e) = module.edge_between(t, h) {
                y[e][tx] = read_counts[e];
            }
        }
    }

    let mut p = vec![1.0 / num_tx as f64; num_tx];
    for iteration in 0..opts.em_max_iters {
        // E-step: soft-assign each edge's reads across its isoforms.
        for (e, row) in y.iter_mut().enumerate() {
            let denom: f64 = row.iter().zip(&p).map(|(v, pi)| v * pi).sum();
            if denom <= 0.0 {
                continue; // no isoform carries mass for this edge
            }
            for (v, &pi) in row.iter_mut().zip(&p) {
                *v = *v * pi / denom * read_counts[e];
            }
        }

        // M-step: probabilities from column sums.
        let mut p_new = vec![0.0f64; num_tx];
        for row in &y {
            for (acc, &v) in p_new.iter_mut().zip(row) {
                *acc += v;
            }
        }
        for v in &mut p_new {
            *v /= total;
        }

        let epsilon: f64 = p_new.iter().zip(&p).map(|(a, b)| (a - b).abs()).sum();
        p = p_new;
        if epsilon < opts.em_epsilon {
            debug!(
                "module {}: EM converged after {} iteration(s)",
                module.label(),
                iteration + 1
            );
            break;
        }
    }

    p.iter().map(|&pi| total * pi).collect()
}

/// PSI of the target exon from estimated isoform counts.
///
/// Each isoform's count is normalised by its junction count (edges per path)
/// before summing, removing the path-length bias between long inclusion
/// isoforms and short skipping ones.
pub fn estimate_psi(target: ExonId, isoforms: &[Vec<ExonId>], counts: &[f64]) -> Psi {
    let mut inclusion = 0.0f64;
    let mut skipping = 0.0f64;

    for (path, &count) in isoforms.iter().zip(counts) {
        if path.len() < 2 {
            continue;
        }
        let per_junction = count / (path.len() - 1) as f64;
        if path.contains(&target) {
            inclusion += per_junction;
        } else {
            skipping += per_junction;
        }
    }

    let denom = inclusion + skipping;
    if denom > 0.0 {
        Psi::Defined(inclusion / denom)
    } else {
        Psi::Undefined
    }
}
