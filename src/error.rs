use thiserror::Error;

/// Errors produced while decomposing a splice graph and estimating isoform
/// abundances.
///
/// Structural errors (`InvalidGraph`, `ModuleTopology`) indicate a malformed
/// upstream graph and are not retried. `CoveringStall` flags a graph
/// inconsistency detected during covering-path selection. Zero-read numeric
/// edge cases are *not* errors; they are reported as explicit result values
/// (see [`crate::em::Psi`]).
#[derive(Debug, Error)]
pub enum SpliceError {
    /// Empty or structurally malformed input graph. Fatal for the gene.
    #[error("invalid splice graph: {reason}")]
    InvalidGraph { reason: String },

    /// Strand value outside {+, -}. Fatal for the region.
    #[error("invalid strand {value:?}: expected '+' or '-'")]
    InvalidStrand { value: String },

    /// A module violates the single-source/single-sink assumption
    /// (AFE/ALE-like event). Fatal for that module; other modules of the
    /// same gene may still proceed.
    #[error("module {module} violates the single-entry/single-exit assumption: {reason}")]
    ModuleTopology { module: String, reason: String },

    /// The covering loop selected a path that explains no new junction while
    /// unexplained junctions remain (e.g. an unreachable zero-weight edge).
    #[error("covering stalled in module {module}: {unexplained} junction(s) cannot be explained by any source-to-sink path")]
    CoveringStall { module: String, unexplained: usize },
}
