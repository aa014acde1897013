//! Bytecode opcodes for the bytecode tape.
//!
//! Each opcode represents an elementary operation. [`eval_forward`] and
//! [`reverse_partials`] evaluate and differentiate a single opcode; both are
//! generic over `num_traits::Float` so the same tables drive the plain,
//! `Dual<F>` and `Dual<Dual<F>>` sweeps.

use num_traits::Float;

/// Sentinel used in `arg_indices[1]` for unary ops (the second argument slot is unused).
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes for the bytecode tape.
///
/// Binary ops use both `arg_indices` slots; unary ops use slot 0 only
/// (slot 1 = [`UNUSED`], except for [`OpCode::Powi`] which stores the `i32`
/// exponent reinterpreted as `u32` in slot 1).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ── Structural ──
    /// Input variable (leaf node).
    Input,
    /// Scalar constant.
    Const,

    // ── Binary arithmetic ──
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Powf,
    Atan2,
    Hypot,
    Max,
    Min,

    // ── Unary ──
    Neg,
    Recip,
    Sqrt,
    Cbrt,
    /// Integer power. Exponent stored in `arg_indices[1]` as `exp as u32`.
    Powi,

    // ── Exp / Log ──
    Exp,
    Exp2,
    ExpM1,
    Ln,
    Log2,
    Log10,
    Ln1p,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    // ── Hyperbolic ──
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,

    // ── Misc ──
    Abs,
    /// Zero derivative but needed for re-evaluation.
    Signum,
    /// Zero derivative but needed for re-evaluation.
    Floor,
    /// Zero derivative but needed for re-evaluation.
    Ceil,
    /// Zero derivative but needed for re-evaluation.
    Round,
    /// Zero derivative but needed for re-evaluation.
    Trunc,
    Fract,
}

impl OpCode {
    /// True for ops that read `arg_indices[1]` as a tape index.
    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Rem
                | OpCode::Powf
                | OpCode::Atan2
                | OpCode::Hypot
                | OpCode::Max
                | OpCode::Min
        )
    }
}

/// Returns true if this opcode has a kink where the derivative is undefined
/// (`abs` at zero, `min`/`max` at a tie).
#[inline]
pub fn is_nonsmooth(op: OpCode) -> bool {
    matches!(op, OpCode::Abs | OpCode::Min | OpCode::Max)
}

/// Evaluate a single opcode in the forward direction.
///
/// For binary ops, `a` and `b` are the two operand values. For unary ops,
/// `b` is ignored. [`OpCode::Powi`] is dispatched through [`eval_powi`].
#[inline]
pub fn eval_forward<T: Float>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Input | OpCode::Const => {
            unreachable!("Input/Const should not be re-evaluated via eval_forward")
        }
        OpCode::Powi => unreachable!("Powi carries its exponent out of band, use eval_powi"),

        // Binary arithmetic
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Rem => a % b,
        OpCode::Powf => a.powf(b),
        OpCode::Atan2 => a.atan2(b),
        OpCode::Hypot => a.hypot(b),
        OpCode::Max => {
            if a >= b {
                a
            } else {
                b
            }
        }
        OpCode::Min => {
            if a <= b {
                a
            } else {
                b
            }
        }

        // Unary
        OpCode::Neg => -a,
        OpCode::Recip => a.recip(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Cbrt => a.cbrt(),

        // Exp/Log
        OpCode::Exp => a.exp(),
        OpCode::Exp2 => a.exp2(),
        OpCode::ExpM1 => a.exp_m1(),
        OpCode::Ln => a.ln(),
        OpCode::Log2 => a.log2(),
        OpCode::Log10 => a.log10(),
        OpCode::Ln1p => a.ln_1p(),

        // Trig
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),

        // Hyperbolic
        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Asinh => a.asinh(),
        OpCode::Acosh => a.acosh(),
        OpCode::Atanh => a.atanh(),

        // Misc
        OpCode::Abs => a.abs(),
        OpCode::Signum => a.signum(),
        OpCode::Floor => a.floor(),
        OpCode::Ceil => a.ceil(),
        OpCode::Round => a.round(),
        OpCode::Trunc => a.trunc(),
        OpCode::Fract => a.fract(),
    }
}

/// Compute reverse-mode partial derivatives for a single opcode.
///
/// Returns `(∂result/∂arg0, ∂result/∂arg1)`; the second partial is zero for
/// unary ops. `a`, `b` are the operand values and `r` the result value.
///
/// Called with `Dual<F>` or `Dual<Dual<F>>` operands the partials carry their
/// own tangents, which is what makes forward-over-reverse exact.
#[inline]
pub fn reverse_partials<T: Float>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    let two = one + one;
    match op {
        OpCode::Input | OpCode::Const => (zero, zero),
        OpCode::Powi => unreachable!("Powi carries its exponent out of band, use powi_partial"),

        // Binary
        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        OpCode::Rem => (one, -(a / b).trunc()),
        OpCode::Powf => {
            // d/da a^b = b a^(b-1), d/db a^b = a^b ln(a)
            let da = b * a.powf(b - one);
            let db = r * a.ln();
            (da, db)
        }
        OpCode::Atan2 => {
            let denom = a * a + b * b;
            (b / denom, -a / denom)
        }
        OpCode::Hypot => (a / r, b / r),
        OpCode::Max => {
            if a >= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Min => {
            if a <= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }

        // Unary
        OpCode::Neg => (-one, zero),
        OpCode::Recip => {
            let inv = one / a;
            (-inv * inv, zero)
        }
        OpCode::Sqrt => (one / (two * r), zero),
        OpCode::Cbrt => {
            let three = two + one;
            (one / (three * r * r), zero)
        }

        // Exp/Log
        OpCode::Exp => (r, zero),
        OpCode::Exp2 => (r * two.ln(), zero),
        OpCode::ExpM1 => (r + one, zero),
        OpCode::Ln => (one / a, zero),
        OpCode::Log2 => (one / (a * two.ln()), zero),
        OpCode::Log10 => {
            let ten = two * (two * two + one);
            (one / (a * ten.ln()), zero)
        }
        OpCode::Ln1p => (one / (one + a), zero),

        // Trig
        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Tan => {
            let c = a.cos();
            (one / (c * c), zero)
        }
        OpCode::Asin => (one / (one - a * a).sqrt(), zero),
        OpCode::Acos => (-one / (one - a * a).sqrt(), zero),
        OpCode::Atan => (one / (one + a * a), zero),

        // Hyperbolic
        OpCode::Sinh => (a.cosh(), zero),
        OpCode::Cosh => (a.sinh(), zero),
        OpCode::Tanh => (one - r * r, zero),
        OpCode::Asinh => (one / (a * a + one).sqrt(), zero),
        OpCode::Acosh => (one / (a * a - one).sqrt(), zero),
        OpCode::Atanh => (one / (one - a * a), zero),

        // Misc
        OpCode::Abs => (a.signum(), zero),
        OpCode::Signum | OpCode::Floor | OpCode::Ceil | OpCode::Round | OpCode::Trunc => {
            (zero, zero)
        }
        OpCode::Fract => (one, zero),
    }
}

/// Evaluate `a^exp` for an integer exponent.
#[inline]
pub fn eval_powi<T: Float>(a: T, exp: i32) -> T {
    a.powi(exp)
}

/// Partial derivative of `a^exp` with respect to `a`.
#[inline]
pub fn powi_partial<T: Float>(a: T, exp: i32) -> T {
    if exp == 0 {
        return T::zero();
    }
    match T::from(exp) {
        Some(n) => n * a.powi(exp - 1),
        None => T::nan(),
    }
}

/// Encode a `powi` exponent so it can be stored in `arg_indices[1]`.
#[inline]
pub fn powi_exp_encode(exp: i32) -> u32 {
    exp as u32
}

/// Recover a `powi` exponent stored by [`powi_exp_encode`].
#[inline]
pub fn powi_exp_decode(slot: u32) -> i32 {
    slot as i32
}
