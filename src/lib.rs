//! Taylor-coefficient sensitivity analysis for differentiable models.
//!
//! A model implements [`Model`] once, generically over [`Scalar`]. The
//! [`DerivativeEngine`] records the model over a whole input batch onto a
//! bytecode tape and computes batch-mean absolute first, second and third
//! order derivatives from it. [`TaylorAnalysis`] ties the engine to an
//! [`AnalysisConfig`] and a [`CheckpointStore`] for tracking coefficients
//! over training.

pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod dual;
pub mod engine;
pub mod error;
pub mod float;
pub mod model;
pub mod nonsmooth;
pub mod opcode;
#[cfg(feature = "render")]
pub mod render;
pub mod scalar;
pub mod selection;
pub mod snapshot;
pub mod tape;
mod traits;
pub mod var;

pub use analysis::TaylorAnalysis;
pub use checkpoint::{format_label, CheckpointStore, CoefficientKey};
pub use config::AnalysisConfig;
pub use dual::Dual;
pub use engine::{CoefficientVector, DerivativeEngine, RecordedBatch};
pub use error::{
    ConfigError, Error, InvalidOrder, InvalidSelectionError, LabelMismatchError,
    NonDifferentiableError, RenderError, Result, ShapeError,
};
pub use float::Float;
pub use model::{Model, ModelAdapter, OutputSelection};
#[cfg(feature = "render")]
pub use render::{render_series, render_snapshot, RenderConfig};
pub use scalar::Scalar;
pub use selection::{DerivativeOrder, EvalRequest, EvaluationPoint, SelectionEnumerator, VariableSet};
pub use snapshot::{Snapshot, SnapshotEntry};
pub use tape::BytecodeTape;
pub use var::Var;

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for recording variables over `f64`.
pub type Var64 = Var<f64>;
/// Type alias for recording variables over `f32`.
pub type Var32 = Var<f32>;
