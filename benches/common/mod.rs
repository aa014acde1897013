#![allow(dead_code)]

use ndarray::{Array2, ArrayView2};
use taylor_analysis::{Model, Scalar};

// ─── Small MLP ─────────────────────────────────────────────────────────────
// y_k = Σ_j v_kj·tanh(Σ_i w_ji·x_i + b_j)
// Deterministic weights: w_ji = sin(j*N+i+1) / (N+1), b_j = 0.1*(j+1),
// v_kj = cos(k*H+j+1) / H

pub struct Mlp {
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
}

impl Mlp {
    pub fn new(inputs: usize, hidden: usize, outputs: usize) -> Self {
        Mlp {
            inputs,
            hidden,
            outputs,
        }
    }

    fn w(&self, j: usize, i: usize) -> f64 {
        ((j * self.inputs + i + 1) as f64).sin() / (self.inputs as f64 + 1.0)
    }

    fn v(&self, k: usize, j: usize) -> f64 {
        ((k * self.hidden + j + 1) as f64).cos() / self.hidden as f64
    }
}

impl Model<f64> for Mlp {
    fn num_inputs(&self) -> usize {
        self.inputs
    }

    fn num_outputs(&self) -> usize {
        self.outputs
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        let mut y = Array2::from_elem((x.nrows(), self.outputs), S::zero());
        for (b, row) in x.rows().into_iter().enumerate() {
            let hidden: Vec<S> = (0..self.hidden)
                .map(|j| {
                    let mut z = S::from_f(0.1 * (j as f64 + 1.0));
                    for (i, &xi) in row.iter().enumerate() {
                        z = z + S::from_f(self.w(j, i)) * xi;
                    }
                    z.tanh()
                })
                .collect();
            for k in 0..self.outputs {
                let mut out = S::zero();
                for (j, &h) in hidden.iter().enumerate() {
                    out = out + S::from_f(self.v(k, j)) * h;
                }
                y[[b, k]] = out;
            }
        }
        y
    }
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_batch(batch: usize, features: usize) -> Array2<f64> {
    Array2::from_shape_fn((batch, features), |(b, m)| {
        0.5 + 0.01 * m as f64 - 0.02 * b as f64
    })
}
