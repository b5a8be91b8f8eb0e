//! Overlap records produced by an overlap/alignment service.
use crate::graph::EdgeId;
use serde::{Deserialize, Serialize};

/// The direction of the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    /// The target coordinates are on the reverse complement of the target.
    Reverse,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A local alignment between a query and a target.
/// Coordinates are 0-based and half-open: [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapRange<T> {
    pub target: T,
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub target_len: usize,
    pub strand: Strand,
    /// Number of seed hits (or any monotone alignment score).
    pub score: usize,
}

impl<T: std::fmt::Display> std::fmt::Display for OverlapRange<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}-{}\t{}{}:{}-{}({})\t{}",
            self.query_start,
            self.query_end,
            self.strand,
            self.target,
            self.target_start,
            self.target_end,
            self.target_len,
            self.score
        )
    }
}

impl<T: Copy> OverlapRange<T> {
    /// Both intervals are ordered and the target interval lies within the target.
    pub fn is_well_formed(&self) -> bool {
        self.query_start <= self.query_end
            && self.target_start <= self.target_end
            && self.target_end <= self.target_len
    }
    pub fn query_span(&self) -> usize {
        self.query_end - self.query_start
    }
    pub fn target_span(&self) -> usize {
        self.target_end - self.target_start
    }
    /// The length of the overlap, the shorter of both spans.
    pub fn len(&self) -> usize {
        self.query_span().min(self.target_span())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Rewrites a reverse-strand overlap as a forward one against `rc_target`.
    pub fn to_forward(&self, rc_target: T) -> Self {
        match self.strand {
            Strand::Forward => *self,
            Strand::Reverse => Self {
                target: rc_target,
                target_start: self.target_len - self.target_end,
                target_end: self.target_len - self.target_start,
                strand: Strand::Forward,
                ..*self
            },
        }
    }
}

/// Given a query sequence, returns candidate overlaps against the graph edges.
/// Implementations must be free of side effects, as reads are aligned in parallel.
pub trait OverlapService: Sync {
    fn overlaps(&self, query: &[u8]) -> Vec<OverlapRange<EdgeId>>;
}
