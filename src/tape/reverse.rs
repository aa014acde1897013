use crate::float::Float;
use crate::opcode::{self, OpCode, UNUSED};

impl<F: Float> super::BytecodeTape<F> {
    /// Core reverse sweep over the recorded primal values.
    ///
    /// Expects `adjoints` to be pre-seeded by the caller (length = `num_variables`).
    fn reverse_sweep_core(&self, adjoints: &mut [F]) {
        for i in (0..self.opcodes.len()).rev() {
            let adj = adjoints[i];
            if adj == F::zero() {
                continue;
            }

            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                OpCode::Powi => {
                    adjoints[i] = F::zero();
                    let [a_idx, exp] = self.arg_indices[i];
                    let a = self.values[a_idx as usize];
                    let da = opcode::powi_partial(a, opcode::powi_exp_decode(exp));
                    adjoints[a_idx as usize] = adjoints[a_idx as usize] + da * adj;
                }
                op => {
                    adjoints[i] = F::zero();
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = self.values[a_idx as usize];
                    let b = if b_idx != UNUSED {
                        self.values[b_idx as usize]
                    } else {
                        F::zero()
                    };
                    let r = self.values[i];
                    let (da, db) = opcode::reverse_partials(op, a, b, r);

                    adjoints[a_idx as usize] = adjoints[a_idx as usize] + da * adj;
                    if b_idx != UNUSED {
                        adjoints[b_idx as usize] = adjoints[b_idx as usize] + db * adj;
                    }
                }
            }
        }
    }

    /// Reverse sweep seeded at `seed_index`.
    ///
    /// Returns the full adjoint vector (length = `num_variables`).
    pub fn reverse(&self, seed_index: u32) -> Vec<F> {
        let n = self.num_variables as usize;
        let mut adjoints = vec![F::zero(); n];
        adjoints[seed_index as usize] = F::one();
        self.reverse_sweep_core(&mut adjoints);
        adjoints
    }

    /// Gradient of the output at the recorded inputs.
    ///
    /// Returns only the input adjoints (indices `0..num_inputs`).
    pub fn gradient(&self) -> Vec<F> {
        let mut adjoints = self.reverse(self.output_index);
        adjoints.truncate(self.num_inputs as usize);
        adjoints
    }
}
