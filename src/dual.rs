use std::fmt::{self, Display};

use num_traits::Float as NumFloat;

use crate::float::IsAllZero;

/// Forward-mode dual number: a value paired with its tangent (derivative).
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`.
///
/// Generic over any `num_traits::Float`, so duals nest: the tape's
/// third-order sweep runs on `Dual<Dual<F>>`, the inner tangent carrying the
/// first direction and the outer tangent the second.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dual<T> {
    /// Primal (real) value.
    pub re: T,
    /// Tangent (derivative) value.
    pub eps: T,
}

impl<T: NumFloat + Display> Display for Dual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<T: NumFloat + IsAllZero> Dual<T> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: T, eps: T) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: T) -> Self {
        Dual { re, eps: T::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: T) -> Self {
        Dual { re, eps: T::one() }
    }

    /// Apply the chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    fn chain(self, f_val: T, f_deriv: T) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }

    #[inline]
    fn two() -> T {
        T::one() + T::one()
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        let inv = self.re.recip();
        self.chain(inv, -inv * inv)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, (Self::two() * s).recip())
    }

    #[inline]
    pub fn cbrt(self) -> Self {
        let c = self.re.cbrt();
        let three = Self::two() + T::one();
        self.chain(c, (three * c * c).recip())
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = self.re.powi(n);
        let deriv = match T::from(n) {
            _ if n == 0 => T::zero(),
            Some(nf) => nf * self.re.powi(n - 1),
            None => T::nan(),
        };
        self.chain(val, deriv)
    }

    #[inline]
    pub fn powf(self, n: Self) -> Self {
        // d(x^y) = y x^(y-1) dx + x^y ln(x) dy
        let val = self.re.powf(n.re);
        let dx = if self.eps.is_all_zero() {
            T::zero()
        } else {
            n.re * self.re.powf(n.re - T::one()) * self.eps
        };
        let dy = if n.eps.is_all_zero() {
            T::zero()
        } else {
            val * self.re.ln() * n.eps
        };
        Dual { re: val, eps: dx + dy }
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    #[inline]
    pub fn exp2(self) -> Self {
        let e = self.re.exp2();
        self.chain(e, e * Self::two().ln())
    }

    #[inline]
    pub fn exp_m1(self) -> Self {
        self.chain(self.re.exp_m1(), self.re.exp())
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(self.re.ln(), self.re.recip())
    }

    #[inline]
    pub fn log2(self) -> Self {
        self.chain(self.re.log2(), (self.re * Self::two().ln()).recip())
    }

    #[inline]
    pub fn log10(self) -> Self {
        let ten = Self::two() * (Self::two() * Self::two() + T::one());
        self.chain(self.re.log10(), (self.re * ten.ln()).recip())
    }

    #[inline]
    pub fn ln_1p(self) -> Self {
        self.chain(self.re.ln_1p(), (T::one() + self.re).recip())
    }

    // ── Trig ──

    #[inline]
    pub fn sin(self) -> Self {
        self.chain(self.re.sin(), self.re.cos())
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.chain(self.re.cos(), -self.re.sin())
    }

    #[inline]
    pub fn tan(self) -> Self {
        let c = self.re.cos();
        self.chain(self.re.tan(), (c * c).recip())
    }

    #[inline]
    pub fn asin(self) -> Self {
        self.chain(self.re.asin(), (T::one() - self.re * self.re).sqrt().recip())
    }

    #[inline]
    pub fn acos(self) -> Self {
        self.chain(self.re.acos(), -(T::one() - self.re * self.re).sqrt().recip())
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.chain(self.re.atan(), (T::one() + self.re * self.re).recip())
    }

    #[inline]
    pub fn atan2(self, other: Self) -> Self {
        // d atan2(y, x) = (x dy - y dx) / (x² + y²)
        let denom = self.re * self.re + other.re * other.re;
        Dual {
            re: self.re.atan2(other.re),
            eps: (other.re * self.eps - self.re * other.eps) / denom,
        }
    }

    // ── Hyperbolic ──

    #[inline]
    pub fn sinh(self) -> Self {
        self.chain(self.re.sinh(), self.re.cosh())
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.chain(self.re.cosh(), self.re.sinh())
    }

    #[inline]
    pub fn tanh(self) -> Self {
        let t = self.re.tanh();
        self.chain(t, T::one() - t * t)
    }

    #[inline]
    pub fn asinh(self) -> Self {
        self.chain(self.re.asinh(), (self.re * self.re + T::one()).sqrt().recip())
    }

    #[inline]
    pub fn acosh(self) -> Self {
        self.chain(self.re.acosh(), (self.re * self.re - T::one()).sqrt().recip())
    }

    #[inline]
    pub fn atanh(self) -> Self {
        self.chain(self.re.atanh(), (T::one() - self.re * self.re).recip())
    }

    // ── Misc ──

    #[inline]
    pub fn abs(self) -> Self {
        self.chain(self.re.abs(), self.re.signum())
    }

    #[inline]
    pub fn signum(self) -> Self {
        Dual::constant(self.re.signum())
    }

    #[inline]
    pub fn floor(self) -> Self {
        Dual::constant(self.re.floor())
    }

    #[inline]
    pub fn ceil(self) -> Self {
        Dual::constant(self.re.ceil())
    }

    #[inline]
    pub fn round(self) -> Self {
        Dual::constant(self.re.round())
    }

    #[inline]
    pub fn trunc(self) -> Self {
        Dual::constant(self.re.trunc())
    }

    #[inline]
    pub fn fract(self) -> Self {
        Dual {
            re: self.re.fract(),
            eps: self.eps,
        }
    }

    #[inline]
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        Dual {
            re: self.re.mul_add(a.re, b.re),
            eps: self.eps * a.re + self.re * a.eps + b.eps,
        }
    }

    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        let h = self.re.hypot(other.re);
        Dual {
            re: h,
            eps: (self.re * self.eps + other.re * other.eps) / h,
        }
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.re >= other.re {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.re <= other.re {
            self
        } else {
            other
        }
    }
}
