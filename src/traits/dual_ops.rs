//! Tangent arithmetic for [`Dual<T>`]: product and quotient rules on the
//! `eps` part, plain arithmetic on `re`.

use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use num_traits::Float as NumFloat;

use crate::dual::Dual;

impl<T: NumFloat> Add for Dual<T> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<T: NumFloat> Sub for Dual<T> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<T: NumFloat> Mul for Dual<T> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<T: NumFloat> Div for Dual<T> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let q = self.re / rhs.re;
        Dual {
            re: q,
            eps: (self.eps - q * rhs.eps) / rhs.re,
        }
    }
}

impl<T: NumFloat> Neg for Dual<T> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl<T: NumFloat> Rem for Dual<T> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        // a % b = a - trunc(a / b) * b; the trunc factor is locally constant.
        Dual {
            re: self.re % rhs.re,
            eps: self.eps - (self.re / rhs.re).trunc() * rhs.eps,
        }
    }
}

macro_rules! assign_via {
    ($($assign:ident :: $assign_method:ident => $op:ident :: $method:ident),* $(,)?) => {
        $(
            impl<T: NumFloat> $assign for Dual<T> {
                #[inline]
                fn $assign_method(&mut self, rhs: Self) {
                    *self = $op::$method(*self, rhs);
                }
            }
        )*
    };
}

assign_via!(
    AddAssign::add_assign => Add::add,
    SubAssign::sub_assign => Sub::sub,
    MulAssign::mul_assign => Mul::mul,
    DivAssign::div_assign => Div::div,
    RemAssign::rem_assign => Rem::rem,
);

// ── Comparison (primal only) ──

impl<T: NumFloat> PartialEq for Dual<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl<T: NumFloat> PartialOrd for Dual<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.re.partial_cmp(&other.re)
    }
}
