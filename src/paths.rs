use crate::graph::{ExonId, SpliceGraph};
use crate::module::Module;

/// Lazy depth-first enumeration of all simple directed paths from a module's
/// source exon to its sink exon.
///
/// Modules describe biologically local events, so the path count stays small
/// (tens, rarely hundreds); no pruning beyond "no repeated nodes" is applied,
/// and since the genomic order is topological, repetition cannot occur.
pub struct SimplePaths<'a> {
    module: &'a Module,
    /// (rank, index of the next child to try)
    stack: Vec<(usize, usize)>,
}

impl<'a> SimplePaths<'a> {
    pub fn new(module: &'a Module) -> Self {
        let stack = if module.num_nodes() == 0 {
            Vec::new()
        } else {
            vec![(0, 0)]
        };
        Self { module, stack }
    }
}

impl<'a> Iterator for SimplePaths<'a> {
    type Item = Vec<ExonId>;

    fn next(&mut self) -> Option<Self::Item> {
        let sink = self.module.num_nodes().checked_sub(1)?;

        while let Some(&(rank, child)) = self.stack.last() {
            if rank == sink {
                let path = self
                    .stack
                    .iter()
                    .map(|&(r, _)| self.module.node_at(r))
                    .collect();
                self.stack.pop();
                return Some(path);
            }

            let succ = self.module.successors(rank);
            if child < succ.len() {
                self.stack.last_mut().unwrap().1 += 1;
                self.stack.push((succ[child], 0));
            } else {
                self.stack.pop();
            }
        }
        None
    }
}

/// All source-to-sink paths of one module, with the target-exon bookkeeping
/// needed downstream: inclusion/skipping classification and the interior
/// sequence lengths used for primer-product arithmetic.
#[derive(Debug, Clone)]
pub struct ModulePaths {
    paths: Vec<Vec<ExonId>>,
}

impl ModulePaths {
    /// Eagerly collect every simple path of the module.
    pub fn enumerate(module: &Module) -> Self {
        Self {
            paths: SimplePaths::new(module).collect(),
        }
    }

    /// Wrap an already-selected isoform set (paths must run source to sink).
    pub fn from_paths(paths: Vec<Vec<ExonId>>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[Vec<ExonId>] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Does path `i` splice the target exon in?
    pub fn includes_target(&self, i: usize, target: ExonId) -> bool {
        self.paths[i].contains(&target)
    }

    /// Interior sequence length of each path, split by target inclusion.
    ///
    /// The two boundary (constitutive) exons and the target exon itself are
    /// excluded: what remains is the variable sequence between the primer
    /// anchor points, which is what product-size arithmetic needs.
    pub fn inclusion_skip_lengths(
        &self,
        graph: &SpliceGraph,
        target: ExonId,
    ) -> (Vec<u32>, Vec<u32>) {
        let mut inclusion = Vec::new();
        let mut skipping = Vec::new();

        for path in &self.paths {
            let interior = if path.len() > 2 {
                &path[1..path.len() - 1]
            } else {
                &[][..]
            };
            let length: u32 = interior
                .iter()
                .filter(|&&id| id != target)
                .map(|&id| graph.exon(id).len())
                .sum();

            if path.contains(&target) {
                inclusion.push(length);
            } else {
                skipping.push(length);
            }
        }
        (inclusion, skipping)
    }

    /// The path with the least total exonic sequence, used when primers are
    /// designed against the shortest isoform.
    pub fn shortest_path(&self, graph: &SpliceGraph) -> Option<&[ExonId]> {
        self.paths
            .iter()
            .min_by_key(|path| {
                path.iter().map(|&id| graph.exon(id).len() as u64).sum::<u64>()
            })
            .map(|p| p.as_slice())
    }

    /// Genomic coordinates of each path, for rendering and sequence lookup.
    pub fn path_coordinates(&self, graph: &SpliceGraph) -> Vec<Vec<(u32, u32)>> {
        self.paths
            .iter()
            .map(|path| {
                path.iter()
                    .map(|&id| {
                        let e = graph.exon(id);
                        (e.start, e.end)
                    })
                    .collect()
            })
            .collect()
    }
}
