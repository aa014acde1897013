use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

use crate::dual::Dual;

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed by the tape and the engine.
/// Only primitive float types implement this; AD wrapper types do not.
pub trait Float:
    NumFloat
    + FloatConst
    + FromPrimitive
    + IsAllZero
    + Lift<Self>
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}

/// Exact all-components-zero test for adjoint skipping in the reverse sweep.
///
/// `Zero::is_zero` on a [`Dual`] only inspects the primal, which would drop
/// tangent contributions of an adjoint whose primal happens to be zero.
pub trait IsAllZero {
    fn is_all_zero(&self) -> bool;
}

impl IsAllZero for f32 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}

impl IsAllZero for f64 {
    #[inline]
    fn is_all_zero(&self) -> bool {
        *self == 0.0
    }
}

impl<T: NumFloat + IsAllZero> IsAllZero for Dual<T> {
    #[inline]
    fn is_all_zero(&self) -> bool {
        self.re.is_all_zero() && self.eps.is_all_zero()
    }
}

/// Lift a primal constant into a tangent-carrying number (zero tangent).
///
/// Lets the tangent sweeps materialize `Const` tape entries at any nesting
/// depth without a fallible `NumCast`.
pub trait Lift<F>: NumFloat + IsAllZero {
    fn lift(value: F) -> Self;
}

impl Lift<f32> for f32 {
    #[inline]
    fn lift(value: f32) -> Self {
        value
    }
}

impl Lift<f64> for f64 {
    #[inline]
    fn lift(value: f64) -> Self {
        value
    }
}

impl<F, T: Lift<F>> Lift<F> for Dual<T> {
    #[inline]
    fn lift(value: F) -> Self {
        Dual::constant(T::lift(value))
    }
}
