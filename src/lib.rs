//! splice_psi
//!
//! Splice-graph decomposition and isoform abundance estimation for a single
//! gene, aimed at isoform-aware PCR primer design. Exons are genomic blocks
//! (0-based, half-open); junction read counts weight the edges.
//!
//! The pipeline partitions the gene's exon/junction graph into alternative-
//! splicing modules (non-trivial biconnected components), selects a minimal
//! covering isoform set per module, estimates isoform abundances by EM over
//! the junction counts, and reports a target exon's Percent-Spliced-In
//! together with the interior product lengths primer design needs.

pub mod analysis;
pub mod cover;
pub mod em;
pub mod error;
pub mod graph;
pub mod module;
pub mod paths;
pub mod types;

pub use analysis::{analyze_gene, analyze_target, ModuleSummary, TargetReport};
pub use cover::select_isoforms;
pub use em::{estimate_psi, estimate_read_counts, Psi};
pub use error::SpliceError;
pub use graph::{Edge, EdgeId, ExonId, SpliceGraph};
pub use module::{partition_components, partition_modules, Module};
pub use paths::{ModulePaths, SimplePaths};
pub use types::{EngineOptions, Exon, Strand};
