//! Arithmetic operators and comparisons for [`Var<F>`].

use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::float::Float;
use crate::opcode::OpCode;
use crate::tape::TapeThreadLocal;
use crate::var::{record_binary, record_unary, Var};

/// `Var ∘ Var`, its compound assignment, and both mixed forms with a
/// primitive operand. Primitives enter as untracked constants.
macro_rules! binary_op {
    ($trait:ident :: $method:ident, $assign:ident :: $assign_method:ident, $op:ident, $sym:tt) => {
        impl<F: TapeThreadLocal> $trait for Var<F> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                record_binary(self, rhs, OpCode::$op, self.value $sym rhs.value)
            }
        }

        impl<F: TapeThreadLocal> $assign for Var<F> {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                *self = $trait::$method(*self, rhs);
            }
        }

        binary_op!(@mixed $trait::$method, f32);
        binary_op!(@mixed $trait::$method, f64);
    };
    (@mixed $trait:ident :: $method:ident, $f:ty) => {
        impl $trait<$f> for Var<$f> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: $f) -> Self {
                $trait::$method(self, Var::constant(rhs))
            }
        }

        impl $trait<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn $method(self, rhs: Var<$f>) -> Var<$f> {
                $trait::$method(Var::constant(self), rhs)
            }
        }
    };
}

binary_op!(Add::add, AddAssign::add_assign, Add, +);
binary_op!(Sub::sub, SubAssign::sub_assign, Sub, -);
binary_op!(Mul::mul, MulAssign::mul_assign, Mul, *);
binary_op!(Div::div, DivAssign::div_assign, Div, /);
binary_op!(Rem::rem, RemAssign::rem_assign, Rem, %);

impl<F: TapeThreadLocal> Neg for Var<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        record_unary(self, OpCode::Neg, -self.value)
    }
}

// Branching in model code follows the primal.
impl<F: Float> PartialEq for Var<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Var<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
