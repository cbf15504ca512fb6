//! Error types for DAG construction.
//!
//! Structural violations of the caller contract are surfaced immediately,
//! carrying the offending shapes so the message can name both sides.
//! Cycles and dangling inputs have no error variants: the arena makes them
//! unrepresentable.

use crate::shape::Shape;
use thiserror::Error;

/// Error type for graph construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Two index spaces were required to agree and do not.
    #[error("shape mismatch in {context}: {left} vs {right}")]
    ShapeMismatch { context: &'static str, left: Shape, right: Shape },

    /// Two ranks were required to agree and do not.
    #[error("rank mismatch in {context}: {left} vs {right}")]
    RankMismatch { context: &'static str, left: usize, right: usize },

    /// A map over no inputs.
    #[error("{0} requires at least one input")]
    NoInputs(&'static str),

    /// A fuse of no inputs.
    #[error("fuse requires at least one input")]
    EmptyFuse,

    /// Fuse inputs that overlap instead of partitioning.
    #[error("fuse inputs overlap: {left} and {right}")]
    OverlappingFuse { left: Shape, right: Shape },

    /// Fuse inputs whose union is not a rectangular index space.
    #[error("fuse inputs do not cover a rectangular index space")]
    NotRectangular,

    /// A multi-value reference whose input is not a multi-valued map.
    #[error("multi-value reference into a single-valued node")]
    NotMultiValued,

    /// A multi-value reference past the producer's value count.
    #[error("value index {value} out of range for an operator producing {nvalues} values")]
    ValueOutOfRange { value: u32, nvalues: u32 },

    /// A reduction of a rank-0 array.
    #[error("cannot reduce a rank-0 array")]
    ReduceRankZero,
}

/// Result type alias for graph construction.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
