//! The [`Scalar`] trait for writing AD-generic models.
//!
//! A model written as `fn forward<S: Scalar<Float = F>>(..)` runs on plain
//! `f32`/`f64` for prediction and on [`Var<F>`] while the derivative engine
//! records it.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::float::Float;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

/// Numeric bound of [`Model::forward`](crate::Model::forward).
///
/// Plain floats are their own primal; [`Var<F>`] lifts constants as
/// untracked tape values.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    type Float: Float;

    /// Lift a plain float; it carries no derivative.
    fn from_f(val: Self::Float) -> Self;

    fn value(&self) -> Self::Float;
}

macro_rules! plain_scalar {
    ($($f:ty),*) => {
        $(
            impl Scalar for $f {
                type Float = $f;

                #[inline]
                fn from_f(val: $f) -> Self {
                    val
                }

                #[inline]
                fn value(&self) -> $f {
                    *self
                }
            }
        )*
    };
}

plain_scalar!(f32, f64);

impl<F: TapeThreadLocal> Scalar for Var<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Var::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }
}
