//! `num_traits` surface of [`Var<F>`].
//!
//! Constants and predicates act on the primal. Anything with a derivative is
//! one recorded opcode.

use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero,
};

use crate::float::Float;
use crate::opcode::OpCode;
use crate::tape::TapeThreadLocal;
use crate::var::{record_binary, record_powi, record_unary, Var};

/// Untracked constants of the primal type.
macro_rules! untracked {
    ($($name:ident),* $(,)?) => {
        $(
            #[inline]
            fn $name() -> Self {
                Var::constant(F::$name())
            }
        )*
    };
}

/// Queries answered by the primal alone.
macro_rules! on_primal {
    ($($name:ident -> $ret:ty),* $(,)?) => {
        $(
            #[inline]
            fn $name(self) -> $ret {
                self.value.$name()
            }
        )*
    };
}

/// Unary elementals, one opcode each.
macro_rules! recorded {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[inline]
            fn $name(self) -> Self {
                record_unary(self, OpCode::$op, self.value.$name())
            }
        )*
    };
}

impl<F: TapeThreadLocal> Zero for Var<F> {
    untracked!(zero);

    #[inline]
    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<F: TapeThreadLocal> One for Var<F> {
    untracked!(one);
}

impl<F: TapeThreadLocal> Num for Var<F> {
    type FromStrRadixErr = F::FromStrRadixErr;

    fn from_str_radix(s: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        F::from_str_radix(s, radix).map(Var::constant)
    }
}

impl<F: Float> FromPrimitive for Var<F> {
    fn from_i64(n: i64) -> Option<Self> {
        F::from_i64(n).map(Var::constant)
    }

    fn from_u64(n: u64) -> Option<Self> {
        F::from_u64(n).map(Var::constant)
    }

    fn from_f64(n: f64) -> Option<Self> {
        F::from_f64(n).map(Var::constant)
    }
}

// to_f32/to_f64 must not fall back to the integer defaults.
impl<F: Float> ToPrimitive for Var<F> {
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }

    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    fn to_f32(&self) -> Option<f32> {
        self.value.to_f32()
    }

    fn to_f64(&self) -> Option<f64> {
        self.value.to_f64()
    }
}

impl<F: TapeThreadLocal> NumCast for Var<F> {
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        <F as NumCast>::from(n).map(Var::constant)
    }
}

impl<F: TapeThreadLocal> FloatConst for Var<F> {
    untracked!(
        E, FRAC_1_PI, FRAC_1_SQRT_2, FRAC_2_PI, FRAC_2_SQRT_PI, FRAC_PI_2, FRAC_PI_3,
        FRAC_PI_4, FRAC_PI_6, FRAC_PI_8, LN_10, LN_2, LOG10_E, LOG2_E, PI, SQRT_2, TAU,
        LOG10_2, LOG2_10,
    );
}

impl<F: TapeThreadLocal> NumFloat for Var<F> {
    untracked!(
        nan,
        infinity,
        neg_infinity,
        neg_zero,
        min_value,
        min_positive_value,
        max_value,
        epsilon,
    );

    on_primal!(
        is_nan -> bool,
        is_infinite -> bool,
        is_finite -> bool,
        is_normal -> bool,
        is_sign_positive -> bool,
        is_sign_negative -> bool,
        classify -> FpCategory,
        integer_decode -> (u64, i16, i8),
    );

    recorded!(
        floor => Floor,
        ceil => Ceil,
        round => Round,
        trunc => Trunc,
        fract => Fract,
        abs => Abs,
        signum => Signum,
        recip => Recip,
        sqrt => Sqrt,
        cbrt => Cbrt,
        exp => Exp,
        exp2 => Exp2,
        exp_m1 => ExpM1,
        ln => Ln,
        log2 => Log2,
        log10 => Log10,
        ln_1p => Ln1p,
        sin => Sin,
        cos => Cos,
        tan => Tan,
        asin => Asin,
        acos => Acos,
        atan => Atan,
        sinh => Sinh,
        cosh => Cosh,
        tanh => Tanh,
        asinh => Asinh,
        acosh => Acosh,
        atanh => Atanh,
    );

    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn powi(self, n: i32) -> Self {
        record_powi(self, n, self.value.powi(n))
    }

    fn powf(self, n: Self) -> Self {
        record_binary(self, n, OpCode::Powf, self.value.powf(n.value))
    }

    fn atan2(self, other: Self) -> Self {
        record_binary(self, other, OpCode::Atan2, self.value.atan2(other.value))
    }

    fn hypot(self, other: Self) -> Self {
        record_binary(self, other, OpCode::Hypot, self.value.hypot(other.value))
    }

    // Ties pick the left operand, matching the recorded partials.
    fn max(self, other: Self) -> Self {
        let value = if self.value >= other.value { self.value } else { other.value };
        record_binary(self, other, OpCode::Max, value)
    }

    fn min(self, other: Self) -> Self {
        let value = if self.value <= other.value { self.value } else { other.value };
        record_binary(self, other, OpCode::Min, value)
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }

    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value {
            self - other
        } else {
            Self::zero()
        }
    }

    fn to_degrees(self) -> Self {
        self * Var::constant(F::one().to_degrees())
    }

    fn to_radians(self) -> Self {
        self * Var::constant(F::one().to_radians())
    }
}
