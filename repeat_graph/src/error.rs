use crate::graph::{EdgeId, NodeId};
use crate::sequence::SeqId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepeatGraphError>;

#[derive(Error, Debug)]
pub enum RepeatGraphError {
    #[error("sequence {0} is not in the container")]
    NotFound(SeqId),
    #[error("sequence {name} contains an invalid character {base:?} at {position}")]
    InvalidSequence {
        name: String,
        base: char,
        position: usize,
    },
    #[error("edge {edge} is still referenced by {references} alignment(s)")]
    DanglingReference { edge: EdgeId, references: usize },
    #[error("edge {0} does not exist in the graph")]
    UnknownEdge(EdgeId),
    #[error("node {0} does not exist in the graph")]
    UnknownNode(NodeId),
    #[error("graph invariant violated: {0}")]
    InvariantViolation(String),
    #[error("could not allocate worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl RepeatGraphError {
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        RepeatGraphError::InvariantViolation(msg.into())
    }
    /// Whether the error means the graph can no longer be trusted.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            RepeatGraphError::DanglingReference { .. }
                | RepeatGraphError::UnknownEdge(_)
                | RepeatGraphError::UnknownNode(_)
                | RepeatGraphError::InvariantViolation(_)
        )
    }
}
