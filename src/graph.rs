use std::collections::HashMap;

use crate::error::SpliceError;
use crate::types::{Exon, Strand};

/// Internal numeric IDs (indexes into Vecs).
pub type ExonId = usize;
pub type EdgeId = usize;

/// A directed splice junction between two exons, with its observed read /
/// annotation support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: ExonId,
    pub to: ExonId,
    pub weight: f64,
}

/// Directed acyclic splice graph for one gene.
///
/// Nodes are exons interned to `ExonId`s; edges are junctions kept in an
/// indexed edge list so invariants are checkable at construction time:
///
/// - every exon satisfies start < end (enforced by [`Exon::new`])
/// - every edge goes forward in `(start, end)` genomic order, so the graph
///   is a DAG by construction; a back edge is rejected as `InvalidGraph`
/// - edge weights are non-negative
///
/// Observed edge weights are read-mostly: the covering-path selector works
/// on its own priority copy and never mutates them, so the same graph can
/// feed the abundance estimator afterwards.
#[derive(Debug, Clone)]
pub struct SpliceGraph {
    chr: String,
    strand: Strand,

    exons: Vec<Exon>,
    exon_index: HashMap<Exon, ExonId>,

    edges: Vec<Edge>,
    edge_index: HashMap<(ExonId, ExonId), EdgeId>,

    succ: Vec<Vec<ExonId>>,
    pred: Vec<Vec<ExonId>>,

    /// Annotated transcript paths, as interned exon sequences.
    annotation: Vec<Vec<ExonId>>,
}

impl SpliceGraph {
    pub fn new(chr: impl Into<String>, strand: Strand) -> Self {
        Self {
            chr: chr.into(),
            strand,
            exons: Vec::new(),
            exon_index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            succ: Vec::new(),
            pred: Vec::new(),
            annotation: Vec::new(),
        }
    }

    pub fn chr(&self) -> &str {
        &self.chr
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn exon_count(&self) -> usize {
        self.exons.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exons.is_empty()
    }

    pub fn exon(&self, id: ExonId) -> Exon {
        self.exons[id]
    }

    pub fn exons(&self) -> &[Exon] {
        &self.exons
    }

    pub fn exon_id(&self, exon: Exon) -> Option<ExonId> {
        self.exon_index.get(&exon).copied()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_between(&self, from: ExonId, to: ExonId) -> Option<EdgeId> {
        self.edge_index.get(&(from, to)).copied()
    }

    pub fn successors(&self, id: ExonId) -> &[ExonId] {
        &self.succ[id]
    }

    pub fn predecessors(&self, id: ExonId) -> &[ExonId] {
        &self.pred[id]
    }

    pub fn annotation_paths(&self) -> &[Vec<ExonId>] {
        &self.annotation
    }

    /// Add one annotated transcript as an ordered exon path.
    ///
    /// Exons must be strictly increasing in `(start, end)` order. New
    /// junction edges start with weight 0; observed support arrives later
    /// via [`SpliceGraph::set_junction_weight`].
    pub fn add_transcript_path(&mut self, path: &[Exon]) -> Result<(), SpliceError> {
        if path.is_empty() {
            return Err(SpliceError::InvalidGraph {
                reason: "empty transcript path".to_string(),
            });
        }
        for w in path.windows(2) {
            if w[1] <= w[0] {
                return Err(SpliceError::InvalidGraph {
                    reason: format!(
                        "transcript path is not in genomic order: {} before {}",
                        w[0], w[1]
                    ),
                });
            }
        }

        let ids: Vec<ExonId> = path.iter().map(|&e| self.intern_exon(e)).collect();
        for w in ids.windows(2) {
            self.ensure_edge(w[0], w[1]);
        }
        self.annotation.push(ids);
        Ok(())
    }

    /// Add (or keep) a junction edge between two exons, interning the exons
    /// as needed. The edge must go forward in genomic order.
    pub fn add_junction(&mut self, from: Exon, to: Exon) -> Result<EdgeId, SpliceError> {
        if to <= from {
            return Err(SpliceError::InvalidGraph {
                reason: format!("back edge {} -> {} violates genomic order", from, to),
            });
        }
        let u = self.intern_exon(from);
        let v = self.intern_exon(to);
        Ok(self.ensure_edge(u, v))
    }

    /// Update the observed read support of a junction, creating the edge if
    /// it does not exist yet (a novel junction seen only in RNA-seq).
    pub fn set_junction_weight(
        &mut self,
        from: Exon,
        to: Exon,
        weight: f64,
    ) -> Result<EdgeId, SpliceError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SpliceError::InvalidGraph {
                reason: format!("junction {} -> {} has invalid weight {}", from, to, weight),
            });
        }
        let e = self.add_junction(from, to)?;
        self.edges[e].weight = weight;
        Ok(e)
    }

    fn intern_exon(&mut self, exon: Exon) -> ExonId {
        if let Some(&id) = self.exon_index.get(&exon) {
            return id;
        }
        let id = self.exons.len();
        self.exons.push(exon);
        self.exon_index.insert(exon, id);
        self.succ.push(Vec::new());
        self.pred.push(Vec::new());
        id
    }

    fn ensure_edge(&mut self, from: ExonId, to: ExonId) -> EdgeId {
        if let Some(&e) = self.edge_index.get(&(from, to)) {
            return e;
        }
        let e = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            weight: 0.0,
        });
        self.edge_index.insert((from, to), e);
        self.succ[from].push(to);
        self.pred[to].push(from);
        e
    }
}
