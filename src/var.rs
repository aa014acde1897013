//! Recording variable for the bytecode tape.
//!
//! [`Var<F>`] carries a primal value and the tape index it was recorded at.
//! Every arithmetic or transcendental operation on a `Var` pushes an opcode
//! to the thread-local [`BytecodeTape`], so the tape can later be swept in
//! reverse and, with tangent-carrying numbers, to second and third order.

use std::fmt::{self, Display};

use crate::float::Float;
use crate::opcode::{OpCode, UNUSED};
use crate::tape::{self, BytecodeTape, TapeThreadLocal, CONSTANT};

/// Recording variable.
///
/// 8 bytes for `f32`, 12 for `f64`, `Copy`. Values created outside a
/// recording (constants) carry the [`CONSTANT`] index and are promoted to
/// `Const` tape entries the first time they meet a recorded value.
#[derive(Clone, Copy, Debug)]
pub struct Var<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> Var<F> {
    /// Create a constant (not tracked on tape).
    #[inline]
    pub fn constant(value: F) -> Self {
        Var {
            value,
            index: CONSTANT,
        }
    }

    /// Create from a tape allocation (internal use).
    #[inline]
    pub(crate) fn from_tape(value: F, index: u32) -> Self {
        Var { value, index }
    }

    /// Primal value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Tape index, or [`CONSTANT`] for untracked values.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<F: Float> Display for Var<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Var<F> {
    fn default() -> Self {
        Var::constant(F::zero())
    }
}

/// Ensure an operand has a valid tape index, promoting a constant to a
/// `Const` entry when needed.
#[inline]
pub(crate) fn ensure_on_tape<F: Float>(x: &Var<F>, tape: &mut BytecodeTape<F>) -> u32 {
    if x.index == CONSTANT {
        tape.push_const(x.value)
    } else {
        x.index
    }
}

/// Record a unary opcode.
#[inline]
pub(crate) fn record_unary<F: TapeThreadLocal>(x: Var<F>, op: OpCode, value: F) -> Var<F> {
    let index = tape::with_active_tape(|t| {
        let xi = ensure_on_tape(&x, t);
        t.push_op(op, xi, UNUSED, value)
    });
    Var { value, index }
}

/// Record a binary opcode.
#[inline]
pub(crate) fn record_binary<F: TapeThreadLocal>(
    lhs: Var<F>,
    rhs: Var<F>,
    op: OpCode,
    value: F,
) -> Var<F> {
    let index = tape::with_active_tape(|t| {
        let li = ensure_on_tape(&lhs, t);
        let ri = ensure_on_tape(&rhs, t);
        t.push_op(op, li, ri, value)
    });
    Var { value, index }
}

/// Record an integer power.
#[inline]
pub(crate) fn record_powi<F: TapeThreadLocal>(x: Var<F>, exp: i32, value: F) -> Var<F> {
    let index = tape::with_active_tape(|t| {
        let xi = ensure_on_tape(&x, t);
        t.push_powi(xi, exp, value)
    });
    Var { value, index }
}
