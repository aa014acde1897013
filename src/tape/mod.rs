//! Bytecode tape for higher-order reverse-mode AD.
//!
//! The tape stores opcodes rather than precomputed multipliers, so the same
//! recording can be swept with plain floats (gradient), with `Dual<F>`
//! (Hessian-vector products) and with `Dual<Dual<F>>` (third-order
//! directional derivatives).
//!
//! # Limitations
//!
//! The tape records one execution path. Branches taken on primal values
//! (`if x > 0 { .. }`) are frozen into the recording; the kink scan in
//! [`BytecodeTape::kinks`] reports the `abs`/`min`/`max` switches that sit
//! exactly on such a boundary.

use std::convert::Infallible;

use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};
use crate::var::{self, Var};

// Submodules, each adds impl blocks to BytecodeTape<F>
mod kinks;
mod reverse;
mod tangent;

mod thread_local;
pub use self::thread_local::{with_active_tape, TapeGuard, TapeThreadLocal};

/// Sentinel index for constant entries (not tracked).
pub const CONSTANT: u32 = u32::MAX;

/// A recorded computation.
///
/// Created via [`record`]. Entries `0..num_inputs` are the inputs, in the
/// order they were registered.
#[derive(Clone, Debug)]
pub struct BytecodeTape<F: Float> {
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    pub(crate) values: Vec<F>,
    pub(crate) num_inputs: u32,
    pub(crate) num_variables: u32,
    pub(crate) output_index: u32,
}

impl<F: Float> BytecodeTape<F> {
    /// Create an empty bytecode tape.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a bytecode tape with pre-allocated capacity.
    pub fn with_capacity(est_ops: usize) -> Self {
        BytecodeTape {
            opcodes: Vec::with_capacity(est_ops),
            arg_indices: Vec::with_capacity(est_ops),
            values: Vec::with_capacity(est_ops),
            num_inputs: 0,
            num_variables: 0,
            output_index: 0,
        }
    }

    /// Register a new input variable. Returns its index.
    ///
    /// Inputs must be registered before any constant or operation.
    #[inline]
    pub fn new_input(&mut self, value: F) -> u32 {
        debug_assert_eq!(
            self.num_inputs, self.num_variables,
            "inputs must precede all other entries"
        );
        let idx = self.num_variables;
        self.num_variables += 1;
        self.num_inputs += 1;
        self.opcodes.push(OpCode::Input);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Register a scalar constant. Returns its index.
    #[inline]
    pub fn push_const(&mut self, value: F) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(OpCode::Const);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Record an operation. Returns the result index.
    ///
    /// **Constant folding**: if all operands are `Const` entries, the
    /// operation becomes a single `Const` with the already-computed value.
    /// Consequently every non-`Const`, non-`Input` entry depends on at least
    /// one input, and an output that folded to `Const` is detached.
    ///
    /// **Identity simplification**: `x + 0 → x`, `0 + x → x`, `x - 0 → x`,
    /// `x * 1 → x`, `1 * x → x` and `x / 1 → x` reuse the operand entry.
    /// Absorbing patterns (`x * 0`, `x - x`) are recorded as-is so that a
    /// zero derivative never masquerades as a detached output.
    #[inline]
    pub fn push_op(&mut self, op: OpCode, arg0: u32, arg1: u32, value: F) -> u32 {
        let arg0_const = self.opcodes[arg0 as usize] == OpCode::Const;
        let arg1_const = arg1 == UNUSED || self.opcodes[arg1 as usize] == OpCode::Const;
        if arg0_const && arg1_const {
            return self.push_const(value);
        }

        if (arg0_const || arg1_const) && arg1 != UNUSED {
            if let Some(idx) = self.try_identity_simplify(op, arg0, arg1, arg0_const, arg1_const)
            {
                return idx;
            }
        }

        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(op);
        self.arg_indices.push([arg0, arg1]);
        self.values.push(value);
        idx
    }

    /// Simplify a binary op where exactly one argument is a neutral constant.
    #[inline(never)]
    fn try_identity_simplify(
        &self,
        op: OpCode,
        arg0: u32,
        arg1: u32,
        arg0_const: bool,
        arg1_const: bool,
    ) -> Option<u32> {
        let zero = F::zero();
        let one = F::one();
        let c0 = self.values[arg0 as usize];
        let c1 = self.values[arg1 as usize];
        match op {
            OpCode::Add if arg1_const && c1 == zero => Some(arg0),
            OpCode::Add if arg0_const && c0 == zero => Some(arg1),
            OpCode::Sub if arg1_const && c1 == zero => Some(arg0),
            OpCode::Mul if arg1_const && c1 == one => Some(arg0),
            OpCode::Mul if arg0_const && c0 == one => Some(arg1),
            OpCode::Div if arg1_const && c1 == one => Some(arg0),
            _ => None,
        }
    }

    /// Record a powi operation. The `i32` exponent is stored in `arg_indices[1]`.
    ///
    /// Folds `Const` operands, `x^1 → x` and `x^(-1) → Recip(x)`.
    #[inline]
    pub fn push_powi(&mut self, arg0: u32, exp: i32, value: F) -> u32 {
        if self.opcodes[arg0 as usize] == OpCode::Const {
            return self.push_const(value);
        }
        if exp == 1 {
            return arg0;
        }
        if exp == -1 {
            return self.push_op(OpCode::Recip, arg0, UNUSED, value);
        }

        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(OpCode::Powi);
        self.arg_indices.push([arg0, opcode::powi_exp_encode(exp)]);
        self.values.push(value);
        idx
    }

    /// Mark the output variable.
    #[inline]
    pub fn set_output(&mut self, index: u32) {
        self.output_index = index;
    }

    /// Output value of the recording pass.
    #[inline]
    pub fn output_value(&self) -> F {
        self.values[self.output_index as usize]
    }

    /// Index of the output variable.
    #[inline]
    pub fn output_index(&self) -> usize {
        self.output_index as usize
    }

    /// True when the output folded to a constant, i.e. it does not depend on
    /// any input.
    #[inline]
    pub fn is_output_constant(&self) -> bool {
        self.opcodes[self.output_index as usize] == OpCode::Const
    }

    /// Number of input variables.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of entries (including inputs and constants).
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.opcodes.len()
    }

    /// Input values the tape was recorded at.
    #[inline]
    pub fn input_values(&self) -> &[F] {
        &self.values[..self.num_inputs as usize]
    }

    /// Marks every entry the output depends on (the output included).
    pub fn output_cone(&self) -> Vec<bool> {
        let mut live = vec![false; self.opcodes.len()];
        live[self.output_index as usize] = true;
        for i in (0..self.opcodes.len()).rev() {
            if !live[i] {
                continue;
            }
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const) {
                continue;
            }
            let [a_idx, b_idx] = self.arg_indices[i];
            live[a_idx as usize] = true;
            if op.is_binary() {
                live[b_idx as usize] = true;
            }
        }
        live
    }
}

impl<F: Float> Default for BytecodeTape<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record `f` into a fresh [`BytecodeTape`].
///
/// Every entry of `x` becomes a tape input; `f` receives them as [`Var`]s
/// and returns the single output. The tape is active only while `f` runs.
pub fn record<F: TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Var<F>,
    x: &[F],
) -> BytecodeTape<F> {
    match try_record(|v| Ok::<_, Infallible>(f(v)), x) {
        Ok(tape) => tape,
        Err(never) => match never {},
    }
}

/// Like [`record`] for a fallible recording closure.
pub fn try_record<F: TapeThreadLocal, E>(
    f: impl FnOnce(&[Var<F>]) -> Result<Var<F>, E>,
    x: &[F],
) -> Result<BytecodeTape<F>, E> {
    let mut tape = BytecodeTape::with_capacity(x.len() * 10);

    let inputs: Vec<Var<F>> = x
        .iter()
        .map(|&val| {
            let idx = tape.new_input(val);
            Var::from_tape(val, idx)
        })
        .collect();

    let output = {
        let _guard = TapeGuard::new(&mut tape);
        f(&inputs)?
    };

    let out_idx = var::ensure_on_tape(&output, &mut tape);
    tape.set_output(out_idx);
    log::debug!(
        "recorded tape: {} inputs, {} entries",
        tape.num_inputs(),
        tape.num_ops()
    );
    Ok(tape)
}
