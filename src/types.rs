use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpliceError;

/// Genomic strand/orientation.
///
/// Only `+` and `-` are representable: alternative-splicing modules are
/// strand-scoped, so an unknown strand cannot be analyzed. Parsing any other
/// value fails with [`SpliceError::InvalidStrand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Strand {
    Plus,
    Minus,
}

impl FromStr for Strand {
    type Err = SpliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            other => Err(SpliceError::InvalidStrand {
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Strand {
    type Error = SpliceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Strand> for String {
    fn from(s: Strand) -> String {
        s.to_string()
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

/// An exon: a contiguous genomic interval retained in mature RNA.
/// Coordinates are 0-based, half-open: [start, end)
///
/// Exons are immutable once created and identified by their coordinates,
/// scoped to one chromosome and strand (carried by the owning graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Exon {
    pub start: u32,
    pub end: u32,
}

impl Exon {
    /// Create a new exon. Panics if start >= end.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(start < end, "Exon requires start < end");
        Self { start, end }
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn overlaps(self, other: Exon) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[inline]
    pub fn contains(self, other: Exon) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Base pairs separating two exons; 0 when they overlap or touch.
    pub fn distance_to(self, other: Exon) -> u32 {
        if self.overlaps(other) {
            0
        } else if self.end <= other.start {
            other.start - self.end
        } else {
            self.start - other.end
        }
    }
}

impl fmt::Display for Exon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Tunable thresholds for the covering-path selector and the abundance
/// estimator.
///
/// These are explicit values passed into the engine (not module constants)
/// so tests and callers can override them per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Divisor applied to a selected path's priority weights after each
    /// covering iteration, steering later iterations toward unexplained
    /// junctions.
    pub decay_factor: f64,

    /// EM stops once the element-wise total absolute change of the isoform
    /// probability vector falls below this threshold.
    pub em_epsilon: f64,

    /// Hard cap on EM iterations, independent of convergence.
    pub em_max_iters: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            decay_factor: 10.0,
            em_epsilon: 1e-4,
            em_max_iters: 1000,
        }
    }
}
