use crate::dual::Dual;
use crate::float::{Float, Lift};
use crate::opcode::{self, OpCode, UNUSED};

impl<F: Float> super::BytecodeTape<F> {
    // ── Forward-over-reverse ──

    /// Forward sweep with tangent-carrying numbers. Reads opcodes and
    /// constants from `self`, writing results into `buf`. Does not mutate
    /// the tape.
    ///
    /// Generic over `T: Lift<F>` so it serves both `Dual<F>` and
    /// `Dual<Dual<F>>`.
    pub fn forward_tangent<T: Lift<F>>(&self, inputs: &[T], buf: &mut Vec<T>) {
        assert_eq!(
            inputs.len(),
            self.num_inputs as usize,
            "wrong number of inputs"
        );

        let n = self.num_variables as usize;
        buf.clear();
        buf.resize(n, T::zero());

        let mut input_idx = 0usize;
        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input => {
                    buf[i] = inputs[input_idx];
                    input_idx += 1;
                }
                OpCode::Const => {
                    buf[i] = T::lift(self.values[i]);
                }
                OpCode::Powi => {
                    let [a_idx, exp] = self.arg_indices[i];
                    buf[i] = opcode::eval_powi(buf[a_idx as usize], opcode::powi_exp_decode(exp));
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = buf[a_idx as usize];
                    let b = if b_idx != UNUSED {
                        buf[b_idx as usize]
                    } else {
                        T::zero()
                    };
                    buf[i] = opcode::eval_forward(op, a, b);
                }
            }
        }
    }

    /// Reverse sweep with tangent-carrying adjoints over values from
    /// [`forward_tangent`](Self::forward_tangent). Zero adjoints are skipped
    /// with [`IsAllZero`](crate::float::IsAllZero) so tangent contributions
    /// of a zero-primal adjoint survive.
    pub fn reverse_tangent<T: Lift<F>>(&self, tangent_vals: &[T], buf: &mut Vec<T>) {
        let n = self.num_variables as usize;
        buf.clear();
        buf.resize(n, T::zero());
        buf[self.output_index as usize] = T::one();

        for i in (0..self.opcodes.len()).rev() {
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const) {
                continue;
            }
            let adj = buf[i];
            if adj.is_all_zero() {
                continue;
            }
            buf[i] = T::zero();

            let [a_idx, b_idx] = self.arg_indices[i];
            let a = tangent_vals[a_idx as usize];
            if op == OpCode::Powi {
                let da = opcode::powi_partial(a, opcode::powi_exp_decode(b_idx));
                buf[a_idx as usize] = buf[a_idx as usize] + da * adj;
                continue;
            }

            let b = if b_idx != UNUSED {
                tangent_vals[b_idx as usize]
            } else {
                T::zero()
            };
            let r = tangent_vals[i];
            let (da, db) = opcode::reverse_partials(op, a, b, r);

            buf[a_idx as usize] = buf[a_idx as usize] + da * adj;
            if b_idx != UNUSED {
                buf[b_idx as usize] = buf[b_idx as usize] + db * adj;
            }
        }
    }

    /// Hessian-vector product via forward-over-reverse.
    ///
    /// Returns `(gradient, H·v)`, both of length
    /// [`num_inputs`](Self::num_inputs). The tape is not mutated.
    pub fn hvp(&self, x: &[F], v: &[F]) -> (Vec<F>, Vec<F>) {
        let n = self.num_inputs as usize;
        assert_eq!(x.len(), n, "wrong number of inputs");
        assert_eq!(v.len(), n, "wrong number of directions");

        let dual_inputs: Vec<Dual<F>> = x
            .iter()
            .zip(v.iter())
            .map(|(&xi, &vi)| Dual::new(xi, vi))
            .collect();

        let mut dual_vals = Vec::new();
        let mut adjoints = Vec::new();
        self.forward_tangent(&dual_inputs, &mut dual_vals);
        self.reverse_tangent(&dual_vals, &mut adjoints);

        let gradient: Vec<F> = adjoints[..n].iter().map(|d| d.re).collect();
        let hvp: Vec<F> = adjoints[..n].iter().map(|d| d.eps).collect();
        (gradient, hvp)
    }

    /// Third-order directional derivative: `∑_{jk} (∂³f/∂x_i∂x_j∂x_k) v1_j v2_k`.
    ///
    /// Returns `(∇f, H·v1, T·v1·v2)`. Uses `Dual<Dual<F>>`: the inner tangent
    /// carries `v1`, the outer tangent `v2`.
    pub fn third_order_hvvp(&self, x: &[F], v1: &[F], v2: &[F]) -> (Vec<F>, Vec<F>, Vec<F>) {
        let n = self.num_inputs as usize;
        assert_eq!(x.len(), n, "wrong number of inputs");
        assert_eq!(v1.len(), n, "wrong v1 length");
        assert_eq!(v2.len(), n, "wrong v2 length");

        // outer = Dual { re: Dual(x[i], v1[i]), eps: Dual(v2[i], 0) }
        let dd_inputs: Vec<Dual<Dual<F>>> = (0..n)
            .map(|i| Dual {
                re: Dual::new(x[i], v1[i]),
                eps: Dual::new(v2[i], F::zero()),
            })
            .collect();

        let mut dd_vals: Vec<Dual<Dual<F>>> = Vec::new();
        let mut dd_adj: Vec<Dual<Dual<F>>> = Vec::new();
        self.forward_tangent(&dd_inputs, &mut dd_vals);
        self.reverse_tangent(&dd_vals, &mut dd_adj);

        let gradient: Vec<F> = dd_adj[..n].iter().map(|d| d.re.re).collect();
        let hvp: Vec<F> = dd_adj[..n].iter().map(|d| d.re.eps).collect();
        let third: Vec<F> = dd_adj[..n].iter().map(|d| d.eps.eps).collect();
        (gradient, hvp, third)
    }
}
