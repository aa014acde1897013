//! Kink detection for `abs`, `min` and `max`.
//!
//! A recorded tape freezes the branch taken at each nonsmooth operation.
//! When an operation sits exactly on its switching point the one-sided
//! derivatives disagree and the derivative engine refuses to report a
//! coefficient.

use num_traits::Float;

use crate::opcode::OpCode;

/// A single kink encountered on the tape.
#[derive(Clone, Debug)]
pub struct KinkEntry<F: Float> {
    /// Index into the tape's opcode/value arrays.
    pub tape_index: u32,
    /// The nonsmooth opcode (Abs, Min, or Max).
    pub opcode: OpCode,
    /// Distance from the kink point:
    /// - Abs: `x` (kink at `x = 0`)
    /// - Min/Max: `a - b` (kink at `a = b`)
    pub switching_value: F,
    /// Which branch was taken:
    /// - Abs: `+1` if `x >= 0`, `-1` if `x < 0`
    /// - Max: `+1` if `a >= b` (first wins), `-1` if `b > a`
    /// - Min: `+1` if `a <= b` (first wins), `-1` if `b < a`
    pub branch: i8,
}

/// All nonsmooth operations of a tape, in tape order.
#[derive(Clone, Debug)]
pub struct NonsmoothInfo<F: Float> {
    pub kinks: Vec<KinkEntry<F>>,
}

impl<F: Float> NonsmoothInfo<F> {
    /// Kink entries whose switching value lies within `tol` of zero
    /// (inclusive, so `tol = 0` catches exact ties). A negative `tol`
    /// matches nothing.
    pub fn active_kinks(&self, tol: F) -> Vec<&KinkEntry<F>> {
        self.kinks
            .iter()
            .filter(|k| k.switching_value.abs() <= tol)
            .collect()
    }

    /// True if no kinks are active within the given tolerance.
    pub fn is_smooth(&self, tol: F) -> bool {
        self.kinks.iter().all(|k| k.switching_value.abs() > tol)
    }

    /// Branch signature: `(tape_index, branch)` pairs for all kinks.
    pub fn signature(&self) -> Vec<(u32, i8)> {
        self.kinks.iter().map(|k| (k.tape_index, k.branch)).collect()
    }
}
