//! Error types.
//!
//! Every failure surfaces to the caller; nothing is retried or zero-filled.

use std::path::PathBuf;

use thiserror::Error;

use crate::opcode::OpCode;

/// The derivative of the requested order does not exist at the current point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum NonDifferentiableError {
    /// The differentiated output does not depend on the input batch.
    #[error("selected model output is detached from the input batch")]
    Detached,
    /// The model declares a lower differentiability order than requested.
    #[error("derivative of order {requested} requested, model is differentiable to order {supported}")]
    OrderNotSupported { requested: usize, supported: usize },
    /// An `abs`, `min` or `max` was evaluated on its switching point.
    #[error("{op:?} at tape entry {tape_index} evaluated at its kink")]
    Kink { op: OpCode, tape_index: u32 },
}

/// An evaluation request or output selection is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidSelectionError {
    #[error("feature index {index} out of range for {num_features} features")]
    IndexOutOfRange { index: usize, num_features: usize },
    #[error("feature index {index} is not among the considered variables")]
    NotConsidered { index: usize },
    #[error("considered variable {index} listed more than once")]
    DuplicateVariable { index: usize },
    #[error("index tuple {indices:?} is not non-decreasing")]
    NotAscending { indices: Vec<usize> },
    #[error("index tuple {indices:?} does not match derivative order {order}")]
    ArityMismatch { order: usize, indices: Vec<usize> },
    #[error("empty index tuple")]
    EmptyTuple,
    #[error("output node {node} out of range for {num_outputs} outputs")]
    OutputOutOfRange { node: usize, num_outputs: usize },
}

/// Variable names do not line up with the considered variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{names} variable names given for {considered} considered variables")]
pub struct LabelMismatchError {
    pub names: usize,
    pub considered: usize,
}

/// The input batch or the model output has the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ShapeError {
    #[error("input batch is empty")]
    EmptyBatch,
    #[error("input batch has {found} features, model expects {expected}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("model returned shape {found:?}, expected {expected:?}")]
    OutputShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Derivative order outside `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("derivative order must be 1, 2 or 3, got {0}")]
pub struct InvalidOrder(pub usize);

/// A figure could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RenderError {
    #[error("unsupported image format for {path:?} (expected .svg or .png)")]
    UnsupportedFormat { path: PathBuf },
    #[error("nothing to plot")]
    Empty,
    #[error("drawing backend failed: {0}")]
    Backend(String),
}

/// Configuration could not be parsed.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(#[from] pub toml::de::Error);

/// Crate-level error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    NonDifferentiable(#[from] NonDifferentiableError),
    #[error(transparent)]
    InvalidSelection(#[from] InvalidSelectionError),
    #[error(transparent)]
    LabelMismatch(#[from] LabelMismatchError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    InvalidOrder(#[from] InvalidOrder),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
