//! Batch-mean absolute coefficients against closed forms.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{array, Array2, ArrayView2, Axis};
use taylor_analysis::{
    DerivativeEngine, Error, EvaluationPoint, Model, NonDifferentiableError, OutputSelection,
    Scalar, ShapeError,
};

/// f(x) = x_0 over three features.
struct Identity;

impl Model<f64> for Identity {
    fn num_inputs(&self) -> usize {
        3
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        x.column(0).to_owned().insert_axis(Axis(1))
    }
}

/// f(x) = x_0 * x_1.
struct Bilinear;

impl Model<f64> for Bilinear {
    fn num_inputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 1), |(b, _)| x[[b, 0]] * x[[b, 1]])
    }
}

/// f(x) = sin(x_0) * exp(x_1) + x_0^2 * x_1.
struct Smooth;

impl Model<f64> for Smooth {
    fn num_inputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 1), |(b, _)| {
            let (a, c) = (x[[b, 0]], x[[b, 1]]);
            a.sin() * c.exp() + a.powi(2) * c
        })
    }
}

/// Two outputs: y_0 = 2 x_0, y_1 = 3 x_1.
struct TwoHeads;

impl Model<f64> for TwoHeads {
    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 2), |(b, k)| {
            S::from_f(2.0 + k as f64) * x[[b, k]]
        })
    }
}

/// Samples interact: y_b = (x_b0 - mean_b x_b0)^2.
struct Centered;

impl Model<f64> for Centered {
    fn num_inputs(&self) -> usize {
        1
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        let n = S::from_f(x.nrows() as f64);
        let mut mean = S::zero();
        for &v in x.column(0) {
            mean = mean + v;
        }
        mean = mean / n;
        x.mapv(|v| (v - mean) * (v - mean))
    }
}

struct Constant;

impl Model<f64> for Constant {
    fn num_inputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_elem((x.nrows(), 1), S::from_f(1.5))
    }
}

struct Relu;

impl Model<f64> for Relu {
    fn num_inputs(&self) -> usize {
        1
    }

    fn supported_order(&self) -> usize {
        1
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        x.mapv(|v| v.max(S::zero()))
    }
}

struct AbsModel;

impl Model<f64> for AbsModel {
    fn num_inputs(&self) -> usize {
        1
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        x.mapv(|v| v.abs() * v)
    }
}

fn batch() -> Array2<f64> {
    array![[0.3, -1.2, 2.0], [-0.7, 0.4, 5.0], [1.9, 2.2, -3.0]]
}

#[test]
fn identity_first_order_is_unit_vector() {
    let engine = DerivativeEngine::new(&Identity);
    for x in [batch(), array![[10.0, 0.0, -4.0]]] {
        let c = engine.first_order(x.view()).unwrap();
        assert_eq!(c.len(), 3);
        assert_abs_diff_eq!(c[0], 1.0);
        assert_abs_diff_eq!(c[1], 0.0);
        assert_abs_diff_eq!(c[2], 0.0);
    }
}

#[test]
fn bilinear_mixed_partial_is_one_and_third_order_vanishes() {
    let engine = DerivativeEngine::new(&Bilinear);
    let x = array![[0.5, -2.0], [3.0, 1.5], [-1.0, 0.25]];

    let second = engine.second_order(x.view(), 0).unwrap();
    assert_abs_diff_eq!(second[0], 0.0);
    assert_abs_diff_eq!(second[1], 1.0);

    for (i, j) in [(0, 0), (0, 1), (1, 1)] {
        let third = engine.third_order(x.view(), i, j).unwrap();
        assert_abs_diff_eq!(third[0], 0.0);
        assert_abs_diff_eq!(third[1], 0.0);
    }
}

#[test]
fn first_order_is_mean_of_absolute_values() {
    // ∂/∂x_0 (x_0 x_1) = x_1, so the coefficient is mean |x_1|, not |mean x_1|.
    let x = array![[1.0, 2.0], [1.0, -4.0]];
    let c = DerivativeEngine::new(&Bilinear).first_order(x.view()).unwrap();
    assert_relative_eq!(c[0], 3.0, max_relative = 1e-12);
    assert_relative_eq!(c[1], 1.0, max_relative = 1e-12);
}

#[test]
fn smooth_model_matches_closed_form() {
    let x = array![[0.4, -0.3], [1.1, 0.8]];
    let engine = DerivativeEngine::new(&Smooth);

    let mean = |f: &dyn Fn(f64, f64) -> f64| {
        x.rows()
            .into_iter()
            .map(|r| f(r[0], r[1]).abs())
            .sum::<f64>()
            / x.nrows() as f64
    };

    let first = engine.first_order(x.view()).unwrap();
    assert_relative_eq!(first[0], mean(&|a, c| a.cos() * c.exp() + 2.0 * a * c), max_relative = 1e-12);
    assert_relative_eq!(first[1], mean(&|a, c| a.sin() * c.exp() + a * a), max_relative = 1e-12);

    // f_00 = -sin a e^c + 2c, f_01 = cos a e^c + 2a
    let second = engine.second_order(x.view(), 0).unwrap();
    assert_relative_eq!(second[0], mean(&|a, c| -a.sin() * c.exp() + 2.0 * c), max_relative = 1e-12);
    assert_relative_eq!(second[1], mean(&|a, c| a.cos() * c.exp() + 2.0 * a), max_relative = 1e-12);

    // f_010 = -sin a e^c + 2, f_011 = cos a e^c
    let third = engine.third_order(x.view(), 0, 1).unwrap();
    assert_relative_eq!(third[0], mean(&|a, c| -a.sin() * c.exp() + 2.0), max_relative = 1e-12);
    assert_relative_eq!(third[1], mean(&|a, c| a.cos() * c.exp()), max_relative = 1e-12);
}

#[test]
fn coefficients_are_non_negative_and_finite() {
    let x = array![[0.4, -0.3], [1.1, 0.8], [-2.0, 0.1]];
    let engine = DerivativeEngine::new(&Smooth);
    let mut all = engine.first_order(x.view()).unwrap().to_vec();
    all.extend(engine.second_order(x.view(), 1).unwrap());
    all.extend(engine.third_order(x.view(), 0, 0).unwrap());
    assert!(all.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn repeated_calls_are_identical() {
    let x = batch();
    let engine = DerivativeEngine::new(&Identity);
    assert_eq!(
        engine.first_order(x.view()).unwrap(),
        engine.first_order(x.view()).unwrap()
    );

    let x = array![[0.4, -0.3], [1.1, 0.8]];
    let engine = DerivativeEngine::new(&Smooth);
    assert_eq!(
        engine.third_order(x.view(), 0, 1).unwrap(),
        engine.third_order(x.view(), 0, 1).unwrap()
    );
}

#[test]
fn evaluate_uses_the_prefix() {
    let x = array![[0.4, -0.3], [1.1, 0.8]];
    let engine = DerivativeEngine::new(&Smooth);
    let point = EvaluationPoint::new(vec![0, 1, 1]).unwrap();
    assert_eq!(
        engine.evaluate(x.view(), &point).unwrap(),
        engine.third_order(x.view(), 0, 1).unwrap()
    );
}

#[test]
fn output_selection_picks_heads() {
    let x = array![[1.0, 1.0], [2.0, -1.0]];
    let both = DerivativeEngine::new(&TwoHeads).first_order(x.view()).unwrap();
    assert_relative_eq!(both[0], 2.0);
    assert_relative_eq!(both[1], 3.0);

    let second_head = DerivativeEngine::new(&TwoHeads)
        .outputs(OutputSelection::Node(1))
        .first_order(x.view())
        .unwrap();
    assert_abs_diff_eq!(second_head[0], 0.0);
    assert_relative_eq!(second_head[1], 3.0);

    let err = DerivativeEngine::new(&TwoHeads)
        .outputs(OutputSelection::Nodes(vec![0, 2]))
        .first_order(x.view())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSelection(_)));
}

#[test]
fn batch_coupling_is_differentiated() {
    // S = Σ_b (x_b - m)^2, ∂S/∂x_b = 2 (x_b - m) since Σ_b (x_b - m) = 0.
    let x = array![[1.0], [2.0], [6.0]];
    let c = DerivativeEngine::new(&Centered).first_order(x.view()).unwrap();
    assert_relative_eq!(c[0], (4.0 + 2.0 + 6.0) / 3.0, max_relative = 1e-12);
}

#[test]
fn detached_output_is_an_error() {
    let err = DerivativeEngine::new(&Constant)
        .first_order(batch().slice(ndarray::s![.., ..2]))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NonDifferentiable(NonDifferentiableError::Detached)
    ));
}

#[test]
fn unsupported_order_is_refused() {
    let x = array![[0.5], [1.5]];
    let engine = DerivativeEngine::new(&Relu);
    assert!(engine.first_order(x.view()).is_ok());
    let err = engine.second_order(x.view(), 0).unwrap_err();
    assert!(matches!(
        err,
        Error::NonDifferentiable(NonDifferentiableError::OrderNotSupported {
            requested: 2,
            supported: 1
        })
    ));
}

#[test]
fn kink_at_switching_point_is_an_error() {
    let x = array![[0.0], [1.0]];
    let err = DerivativeEngine::new(&AbsModel).first_order(x.view()).unwrap_err();
    assert!(matches!(
        err,
        Error::NonDifferentiable(NonDifferentiableError::Kink { .. })
    ));

    // Away from the kink, d/dx (|x| x) = 2|x|.
    let x = array![[-0.5], [1.0]];
    let c = DerivativeEngine::new(&AbsModel).first_order(x.view()).unwrap();
    assert_relative_eq!(c[0], 1.5, max_relative = 1e-12);
}

#[test]
fn kink_tolerance_widens_and_disables() {
    let x = array![[0.05]];
    let strict = DerivativeEngine::new(&AbsModel).kink_tolerance(0.1);
    assert!(strict.first_order(x.view()).is_err());

    let x = array![[0.0]];
    let off = DerivativeEngine::new(&AbsModel).kink_tolerance(-1.0);
    assert!(off.first_order(x.view()).is_ok());
}

#[test]
fn zero_padded_relu_needs_the_check_disabled() {
    // one zero-padded sample sits on the ReLU switching point
    let x = array![[0.0], [2.0]];
    assert!(matches!(
        DerivativeEngine::new(&Relu).first_order(x.view()).unwrap_err(),
        Error::NonDifferentiable(NonDifferentiableError::Kink { .. })
    ));

    let c = DerivativeEngine::new(&Relu)
        .kink_tolerance(-1.0)
        .first_order(x.view())
        .unwrap();
    // max(x, 0) takes its left branch on the tie
    assert_abs_diff_eq!(c[0], 1.0);
}

#[test]
fn shape_errors_come_first() {
    let engine = DerivativeEngine::new(&Bilinear);
    let empty = Array2::<f64>::zeros((0, 2));
    assert!(matches!(
        engine.first_order(empty.view()).unwrap_err(),
        Error::Shape(ShapeError::EmptyBatch)
    ));
    let wide = Array2::<f64>::zeros((2, 3));
    assert!(matches!(
        engine.first_order(wide.view()).unwrap_err(),
        Error::Shape(ShapeError::WidthMismatch { expected: 2, found: 3 })
    ));
}

#[test]
fn index_out_of_range_is_a_selection_error() {
    let x = array![[0.5, 1.0]];
    let engine = DerivativeEngine::new(&Bilinear);
    assert!(matches!(
        engine.second_order(x.view(), 2).unwrap_err(),
        Error::InvalidSelection(_)
    ));
}

#[test]
fn adapter_forward_returns_plain_values() {
    let x = array![[2.0, 3.0], [-1.0, 4.0]];
    let engine = DerivativeEngine::new(&Bilinear);
    let y = engine.adapter().forward(x.view()).unwrap();
    assert_eq!(y, array![[6.0], [-4.0]]);
}
