//! Batch-mean absolute partial derivatives of a model.
//!
//! The whole batch is recorded as one tape whose output is the sum of the
//! selected model outputs over the batch, `S = Σ_b Σ_k y[b, k]`. With
//! `u_i` the direction that is one at feature `i` of every sample:
//!
//! - first order: `∇S`
//! - second order at `i`: `H·u_i` (forward-over-reverse)
//! - third order at `(i, j)`: `T·u_i·u_j` (`Dual<Dual<F>>` over reverse)
//!
//! each reshaped to `(batch, features)`, taken elementwise in absolute value
//! and then averaged over the batch.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{InvalidSelectionError, NonDifferentiableError, Result, ShapeError};
use crate::model::{Model, ModelAdapter, OutputSelection};
use crate::selection::{DerivativeOrder, EvaluationPoint};
use crate::tape::{self, BytecodeTape, TapeThreadLocal};
use crate::var::Var;

/// Batch-mean absolute derivative for every input feature.
pub type CoefficientVector<F> = Array1<F>;

/// Computes Taylor coefficients of a model over an input batch.
///
/// Every public operation records a fresh tape, so nothing carries over
/// between calls. Use [`record`](Self::record) to share one recording
/// across many coefficients of the same call.
pub struct DerivativeEngine<'m, F: TapeThreadLocal, M: Model<F>> {
    adapter: ModelAdapter<'m, F, M>,
    outputs: OutputSelection,
    kink_tolerance: F,
}

impl<'m, F: TapeThreadLocal, M: Model<F>> DerivativeEngine<'m, F, M> {
    pub fn new(model: &'m M) -> Self {
        DerivativeEngine {
            adapter: ModelAdapter::new(model),
            outputs: OutputSelection::All,
            kink_tolerance: F::zero(),
        }
    }

    /// Output nodes summed into the differentiated scalar.
    #[must_use]
    pub fn outputs(mut self, outputs: OutputSelection) -> Self {
        self.outputs = outputs;
        self
    }

    /// Distance from an `abs`/`min`/`max` switching point at or below which
    /// the derivative is refused. The default `0` refuses exact switching
    /// points on any sample of the batch; negative disables the check.
    #[must_use]
    pub fn kink_tolerance(mut self, tol: F) -> Self {
        self.kink_tolerance = tol;
        self
    }

    pub fn adapter(&self) -> &ModelAdapter<'m, F, M> {
        &self.adapter
    }

    pub fn output_selection(&self) -> &OutputSelection {
        &self.outputs
    }

    /// Record `x` with the engine's output selection.
    pub fn record(&self, x: ArrayView2<F>) -> Result<RecordedBatch<F>> {
        self.record_with(x, &self.outputs)
    }

    /// Record `x`, differentiating the sum of the `outputs` nodes.
    ///
    /// # Errors
    ///
    /// - [`ShapeError`] for an empty batch, a width mismatch, or a model
    ///   output of the wrong shape.
    /// - [`InvalidSelectionError`] if `outputs` references a missing node.
    /// - [`NonDifferentiableError::Detached`] if the summed output does not
    ///   depend on `x`.
    /// - [`NonDifferentiableError::Kink`] if the output depends on an
    ///   `abs`/`min`/`max` evaluated within the kink tolerance.
    pub fn record_with(
        &self,
        x: ArrayView2<F>,
        outputs: &OutputSelection,
    ) -> Result<RecordedBatch<F>> {
        let (batch, width) = x.dim();
        if batch == 0 {
            return Err(ShapeError::EmptyBatch.into());
        }
        self.adapter.check_width(width)?;
        outputs.validate(self.adapter.num_outputs())?;

        let values: Vec<F> = x.iter().copied().collect();
        let tape = tape::try_record(
            |inputs| {
                let vars = Array2::from_shape_fn((batch, width), |(b, m)| inputs[b * width + m]);
                let y = self.adapter.forward_generic(vars.view())?;
                let mut total = Var::constant(F::zero());
                for ((_, k), &y_bk) in y.indexed_iter() {
                    if outputs.includes(k) {
                        total = total + y_bk;
                    }
                }
                Ok::<_, crate::Error>(total)
            },
            &values,
        )?;

        if tape.is_output_constant() {
            return Err(NonDifferentiableError::Detached.into());
        }
        if let Some(kink) = tape.kinks().active_kinks(self.kink_tolerance).first() {
            return Err(NonDifferentiableError::Kink {
                op: kink.opcode,
                tape_index: kink.tape_index,
            }
            .into());
        }

        Ok(RecordedBatch {
            tape,
            batch,
            width,
            supported_order: self.adapter.model().supported_order(),
        })
    }

    /// Batch-mean `|∂S/∂x[b, m]|` for every feature `m`.
    pub fn first_order(&self, x: ArrayView2<F>) -> Result<CoefficientVector<F>> {
        self.record(x)?.first_order()
    }

    /// Batch-mean `|∂/∂x[b, m] Σ_b' ∂S/∂x[b', i]|` for every feature `m`.
    pub fn second_order(&self, x: ArrayView2<F>, i: usize) -> Result<CoefficientVector<F>> {
        self.record(x)?.second_order(i)
    }

    /// Third-order analogue of [`second_order`](Self::second_order), holding
    /// `i` and then `j` fixed.
    pub fn third_order(
        &self,
        x: ArrayView2<F>,
        i: usize,
        j: usize,
    ) -> Result<CoefficientVector<F>> {
        self.record(x)?.third_order(i, j)
    }

    /// Coefficient vector produced for `point`'s prefix. The point's own
    /// coefficient is its component at [`EvaluationPoint::last`].
    pub fn evaluate(
        &self,
        x: ArrayView2<F>,
        point: &EvaluationPoint,
    ) -> Result<CoefficientVector<F>> {
        self.record(x)?.evaluate(point)
    }
}

impl<F: TapeThreadLocal, M: Model<F>> fmt::Debug for DerivativeEngine<'_, F, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeEngine")
            .field("adapter", &self.adapter)
            .field("outputs", &self.outputs)
            .field("kink_tolerance", &self.kink_tolerance)
            .finish()
    }
}

/// One recorded batch, ready for any number of derivative sweeps.
#[derive(Clone, Debug)]
pub struct RecordedBatch<F: TapeThreadLocal> {
    tape: BytecodeTape<F>,
    batch: usize,
    width: usize,
    supported_order: usize,
}

impl<F: TapeThreadLocal> RecordedBatch<F> {
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.width
    }

    /// Sum of the selected outputs over the batch.
    #[inline]
    pub fn output_value(&self) -> F {
        self.tape.output_value()
    }

    #[inline]
    pub fn tape(&self) -> &BytecodeTape<F> {
        &self.tape
    }

    pub fn first_order(&self) -> Result<CoefficientVector<F>> {
        self.check_order(DerivativeOrder::First)?;
        let gradient = self.tape.gradient();
        self.abs_mean(&gradient)
    }

    pub fn second_order(&self, i: usize) -> Result<CoefficientVector<F>> {
        self.check_order(DerivativeOrder::Second)?;
        let u_i = self.feature_direction(i)?;
        let (_, hv) = self.tape.hvp(self.tape.input_values(), &u_i);
        self.abs_mean(&hv)
    }

    pub fn third_order(&self, i: usize, j: usize) -> Result<CoefficientVector<F>> {
        self.check_order(DerivativeOrder::Third)?;
        let u_i = self.feature_direction(i)?;
        let u_j = self.feature_direction(j)?;
        let (_, _, tvv) = self.tape.third_order_hvvp(self.tape.input_values(), &u_i, &u_j);
        self.abs_mean(&tvv)
    }

    /// Coefficient vector for `point`'s prefix.
    pub fn evaluate(&self, point: &EvaluationPoint) -> Result<CoefficientVector<F>> {
        let last = point.last();
        if last >= self.width {
            return Err(InvalidSelectionError::IndexOutOfRange {
                index: last,
                num_features: self.width,
            }
            .into());
        }
        match *point.prefix() {
            [] => self.first_order(),
            [i] => self.second_order(i),
            [i, j] => self.third_order(i, j),
            _ => unreachable!("evaluation points hold at most three indices"),
        }
    }

    /// Scalar coefficient of every point, in the given order.
    ///
    /// Points sharing a prefix share one sweep. Fails as a whole: either all
    /// coefficients are returned or none.
    pub fn coefficients(&self, points: &[EvaluationPoint]) -> Result<Vec<F>> {
        let mut sweeps: BTreeMap<&[usize], CoefficientVector<F>> = BTreeMap::new();
        let mut values = Vec::with_capacity(points.len());
        for point in points {
            if !sweeps.contains_key(point.prefix()) {
                let coeffs = self.evaluate(point)?;
                sweeps.insert(point.prefix(), coeffs);
            }
            values.push(sweeps[point.prefix()][point.last()]);
        }
        log::debug!(
            "{} coefficients from {} sweeps over batch of {}",
            values.len(),
            sweeps.len(),
            self.batch
        );
        Ok(values)
    }

    fn check_order(&self, order: DerivativeOrder) -> Result<(), NonDifferentiableError> {
        if order.get() > self.supported_order {
            return Err(NonDifferentiableError::OrderNotSupported {
                requested: order.get(),
                supported: self.supported_order,
            });
        }
        Ok(())
    }

    /// `u_i`: one at feature `i` of every sample, zero elsewhere.
    fn feature_direction(&self, i: usize) -> Result<Vec<F>, InvalidSelectionError> {
        if i >= self.width {
            return Err(InvalidSelectionError::IndexOutOfRange {
                index: i,
                num_features: self.width,
            });
        }
        let mut u = vec![F::zero(); self.batch * self.width];
        for row in u.chunks_exact_mut(self.width) {
            row[i] = F::one();
        }
        Ok(u)
    }

    /// `|d|` reshaped to `(batch, features)`, then the mean over the batch.
    fn abs_mean(&self, d: &[F]) -> Result<CoefficientVector<F>> {
        let d = ArrayView2::from_shape((self.batch, self.width), d).map_err(|_| {
            ShapeError::WidthMismatch {
                expected: self.width,
                found: d.len() / self.batch,
            }
        })?;
        let coeffs = d
            .mapv(|v| v.abs())
            .mean_axis(Axis(0))
            .ok_or(ShapeError::EmptyBatch)?;
        if coeffs.iter().any(|v| !v.is_finite()) {
            log::warn!("non-finite Taylor coefficient: {coeffs}");
        }
        Ok(coeffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Scalar;

    struct Cubic;

    impl Model<f64> for Cubic {
        fn num_inputs(&self) -> usize {
            1
        }

        fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
            x.mapv(|v| v * v * v)
        }
    }

    #[test]
    fn direction_marks_one_feature_per_sample() {
        let x = ndarray::array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        struct Sum;
        impl Model<f64> for Sum {
            fn num_inputs(&self) -> usize {
                2
            }
            fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
                x.sum_axis(Axis(1)).insert_axis(Axis(1))
            }
        }
        let recorded = DerivativeEngine::new(&Sum).record(x.view()).unwrap();
        assert_eq!(
            recorded.feature_direction(1).unwrap(),
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );
        assert!(recorded.feature_direction(2).is_err());
    }

    #[test]
    fn prefix_sweeps_are_shared() {
        let x = ndarray::array![[2.0], [-1.0]];
        let recorded = DerivativeEngine::new(&Cubic).record(x.view()).unwrap();
        let points = vec![
            EvaluationPoint::new(vec![0]).unwrap(),
            EvaluationPoint::new(vec![0, 0]).unwrap(),
            EvaluationPoint::new(vec![0, 0, 0]).unwrap(),
        ];
        let values = recorded.coefficients(&points).unwrap();
        // d/dx x^3 = 3x^2, d2 = 6x, d3 = 6; mean of absolute values
        assert!((values[0] - (12.0 + 3.0) / 2.0).abs() < 1e-12);
        assert!((values[1] - (12.0 + 6.0) / 2.0).abs() < 1e-12);
        assert!((values[2] - 6.0).abs() < 1e-12);
    }
}
