use crate::float::Float;
use crate::nonsmooth::{KinkEntry, NonsmoothInfo};
use crate::opcode::{self, OpCode};

impl<F: Float> super::BytecodeTape<F> {
    /// Scan the recorded primals for nonsmooth operations the output depends on.
    ///
    /// Tracked operations are `Abs` (kink at `x = 0`) and `Min`/`Max` (kink
    /// at `a = b`). Entries outside the output's dependency cone are skipped.
    pub fn kinks(&self) -> NonsmoothInfo<F> {
        let live = self.output_cone();
        let mut kinks = Vec::new();
        for i in 0..self.opcodes.len() {
            let op = self.opcodes[i];
            if !live[i] || !opcode::is_nonsmooth(op) {
                continue;
            }

            let [a_idx, b_idx] = self.arg_indices[i];
            let a = self.values[a_idx as usize];
            let (switching_value, branch) = match op {
                OpCode::Abs => (a, if a >= F::zero() { 1 } else { -1 }),
                OpCode::Max => {
                    let b = self.values[b_idx as usize];
                    (a - b, if a >= b { 1 } else { -1 })
                }
                OpCode::Min => {
                    let b = self.values[b_idx as usize];
                    (a - b, if a <= b { 1 } else { -1 })
                }
                _ => continue,
            };
            kinks.push(KinkEntry {
                tape_index: i as u32,
                opcode: op,
                switching_value,
                branch,
            });
        }

        NonsmoothInfo { kinks }
    }
}
