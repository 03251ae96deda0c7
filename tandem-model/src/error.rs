//! Error types for the document model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Position {pos} out of range (content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("Range {from}..{to} is inverted")]
    InvertedRange { from: usize, to: usize },

    #[error("Cannot replace {from}..{to}: range cuts through structure that cannot be joined")]
    UnsupportedReplace { from: usize, to: usize },

    #[error("Position {0} does not point into a textblock")]
    NotInTextblock(usize),

    #[error("No node starts at position {0}")]
    NoNodeAt(usize),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown mark type: {0}")]
    UnknownMarkType(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
