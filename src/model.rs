//! Model contract and the differentiable-function adapter.

use std::fmt;
use std::marker::PhantomData;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidSelectionError, Result, ShapeError};
use crate::float::Float;
use crate::scalar::Scalar;

/// A differentiable model evaluated over a whole batch.
///
/// `forward` is generic over the [`Scalar`] it runs on, so the same code
/// serves plain prediction (`S = F`) and recording (`S = Var<F>`). Samples
/// may interact within the batch (e.g. batch normalization); the derivative
/// engine differentiates the batch exactly as `forward` computes it.
///
/// # Example
///
/// ```
/// use ndarray::{Array2, ArrayView2};
/// use taylor_analysis::{Model, Scalar};
///
/// struct Product;
///
/// impl Model<f64> for Product {
///     fn num_inputs(&self) -> usize {
///         2
///     }
///
///     fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
///         let y: Vec<S> = x.rows().into_iter().map(|r| r[0] * r[1]).collect();
///         Array2::from_shape_fn((y.len(), 1), |(b, _)| y[b])
///     }
/// }
/// ```
pub trait Model<F: Float> {
    /// Number of input features.
    fn num_inputs(&self) -> usize;

    /// Number of output nodes.
    fn num_outputs(&self) -> usize {
        1
    }

    /// Evaluate the model on a `(batch, num_inputs)` array, returning
    /// `(batch, num_outputs)`.
    fn forward<S: Scalar<Float = F>>(&self, x: ArrayView2<S>) -> Array2<S>;

    /// Highest derivative order the model is differentiable to.
    fn supported_order(&self) -> usize {
        3
    }
}

impl<F: Float, M: Model<F> + ?Sized> Model<F> for &M {
    fn num_inputs(&self) -> usize {
        (**self).num_inputs()
    }

    fn num_outputs(&self) -> usize {
        (**self).num_outputs()
    }

    fn forward<S: Scalar<Float = F>>(&self, x: ArrayView2<S>) -> Array2<S> {
        (**self).forward(x)
    }

    fn supported_order(&self) -> usize {
        (**self).supported_order()
    }
}

/// Shared handle to a caller-owned model.
///
/// Pure delegation: the adapter adds shape checks and nothing else.
pub struct ModelAdapter<'m, F: Float, M: Model<F>> {
    model: &'m M,
    _float: PhantomData<F>,
}

impl<'m, F: Float, M: Model<F>> ModelAdapter<'m, F, M> {
    pub fn new(model: &'m M) -> Self {
        ModelAdapter {
            model,
            _float: PhantomData,
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &'m M {
        self.model
    }

    pub fn num_inputs(&self) -> usize {
        self.model.num_inputs()
    }

    pub fn num_outputs(&self) -> usize {
        self.model.num_outputs()
    }

    /// Evaluate the wrapped model on plain values.
    ///
    /// # Errors
    ///
    /// [`ShapeError`] if `x` has the wrong width or the model returns an
    /// array that is not `(batch, num_outputs)`.
    pub fn forward(&self, x: ArrayView2<F>) -> Result<Array2<F>>
    where
        F: Scalar<Float = F>,
    {
        self.forward_generic(x)
    }

    /// Width check, then delegation with an output shape check.
    pub(crate) fn forward_generic<S: Scalar<Float = F>>(&self, x: ArrayView2<S>) -> Result<Array2<S>> {
        self.check_width(x.ncols())?;
        let y = self.model.forward(x.view());
        let expected = (x.nrows(), self.model.num_outputs());
        if y.dim() != expected {
            return Err(ShapeError::OutputShape {
                expected,
                found: y.dim(),
            }
            .into());
        }
        Ok(y)
    }

    pub(crate) fn check_width(&self, width: usize) -> Result<(), ShapeError> {
        let expected = self.model.num_inputs();
        if width != expected {
            return Err(ShapeError::WidthMismatch {
                expected,
                found: width,
            });
        }
        Ok(())
    }
}

impl<F: Float, M: Model<F>> Clone for ModelAdapter<'_, F, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Float, M: Model<F>> Copy for ModelAdapter<'_, F, M> {}

impl<F: Float, M: Model<F>> fmt::Debug for ModelAdapter<'_, F, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("num_inputs", &self.num_inputs())
            .field("num_outputs", &self.num_outputs())
            .finish()
    }
}

/// Which output nodes are summed into the differentiated scalar.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawOutput", into = "RawOutput")]
pub enum OutputSelection {
    /// Every output node.
    #[default]
    All,
    /// A single output node.
    Node(usize),
    /// A set of output nodes.
    Nodes(Vec<usize>),
}

impl OutputSelection {
    /// True if output node `k` contributes to the differentiated scalar.
    pub fn includes(&self, k: usize) -> bool {
        match self {
            OutputSelection::All => true,
            OutputSelection::Node(node) => *node == k,
            OutputSelection::Nodes(nodes) => nodes.contains(&k),
        }
    }

    /// Check every referenced node against the model's output count.
    pub fn validate(&self, num_outputs: usize) -> Result<(), InvalidSelectionError> {
        let nodes: &[usize] = match self {
            OutputSelection::All => &[],
            OutputSelection::Node(node) => std::slice::from_ref(node),
            OutputSelection::Nodes(nodes) => nodes,
        };
        if let Some(&node) = nodes.iter().find(|&&node| node >= num_outputs) {
            return Err(InvalidSelectionError::OutputOutOfRange { node, num_outputs });
        }
        Ok(())
    }

    /// Label suffix identifying the selection; empty for [`OutputSelection::All`].
    pub fn label_suffix(&self) -> String {
        match self {
            OutputSelection::All => String::new(),
            OutputSelection::Node(node) => format!(" [node {node}]"),
            OutputSelection::Nodes(nodes) => {
                let list: Vec<String> = nodes.iter().map(ToString::to_string).collect();
                format!(" [nodes {}]", list.join(","))
            }
        }
    }
}

/// Wire form: `"all"`, a node index, or a list of node indices.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawOutput {
    Node(usize),
    Nodes(Vec<usize>),
    Keyword(String),
}

impl TryFrom<RawOutput> for OutputSelection {
    type Error = String;

    fn try_from(raw: RawOutput) -> Result<Self, Self::Error> {
        match raw {
            RawOutput::Node(node) => Ok(OutputSelection::Node(node)),
            RawOutput::Nodes(nodes) => Ok(OutputSelection::Nodes(nodes)),
            RawOutput::Keyword(word) if word.eq_ignore_ascii_case("all") => {
                Ok(OutputSelection::All)
            }
            RawOutput::Keyword(word) => Err(format!("unknown output selection {word:?}")),
        }
    }
}

impl From<OutputSelection> for RawOutput {
    fn from(selection: OutputSelection) -> Self {
        match selection {
            OutputSelection::All => RawOutput::Keyword("all".to_owned()),
            OutputSelection::Node(node) => RawOutput::Node(node),
            OutputSelection::Nodes(nodes) => RawOutput::Nodes(nodes),
        }
    }
}
