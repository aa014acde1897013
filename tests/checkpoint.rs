//! Checkpoint series accumulation, clearing and CSV export.

use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use ndarray::{array, Array2, ArrayView2};
use taylor_analysis::{
    CheckpointStore, CoefficientKey, DerivativeEngine, DerivativeOrder, Error, EvaluationPoint,
    Model, OutputSelection, Scalar,
};

/// f(x) = w * x_0 * x_1 with a mutable weight standing in for training.
struct Scaled {
    w: f64,
}

impl Model<f64> for Scaled {
    fn num_inputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 1), |(b, _)| {
            S::from_f(self.w) * x[[b, 0]] * x[[b, 1]]
        })
    }
}

struct FirstOrderOnly;

impl Model<f64> for FirstOrderOnly {
    fn num_inputs(&self) -> usize {
        2
    }

    fn supported_order(&self) -> usize {
        1
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 1), |(b, _)| x[[b, 0]] * x[[b, 1]])
    }
}

fn names(n: &[&str]) -> Vec<String> {
    n.iter().map(|s| s.to_string()).collect()
}

fn key(indices: Vec<usize>) -> CoefficientKey {
    CoefficientKey::new(OutputSelection::All, EvaluationPoint::new(indices).unwrap())
}

fn temp_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("taylor-analysis-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn n_first_order_checkpoints_give_two_series_of_length_n() {
    let x = array![[1.0, 2.0], [3.0, -1.0]];
    let mut store = CheckpointStore::new();
    for epoch in 0..4 {
        let model = Scaled {
            w: 1.0 + epoch as f64,
        };
        let engine = DerivativeEngine::new(&model);
        store
            .checkpoint(&engine, x.view(), epoch, DerivativeOrder::First, &[0, 1], &names(&["a", "b"]))
            .unwrap();
    }

    assert_eq!(store.len(), 2);
    assert_eq!(store.time_steps(), &[0, 1, 2, 3]);
    for values in store.series().values() {
        assert_eq!(values.len(), 4);
    }

    // ∂/∂x_0 = w x_1: mean |x_1| = 1.5, scaled by w in call order.
    let a = &store.series()[&key(vec![0])];
    for (epoch, &v) in a.iter().enumerate() {
        assert_relative_eq!(v, 1.5 * (1.0 + epoch as f64), max_relative = 1e-12);
    }

    let labels: Vec<&str> = store.labeled_series().into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["<t_{a}>", "<t_{b}>"]);
}

#[test]
fn higher_orders_include_lower_ones() {
    let x = array![[1.0, 2.0]];
    let model = Scaled { w: 1.0 };
    let engine = DerivativeEngine::new(&model);
    let mut store = CheckpointStore::new();
    store
        .checkpoint(&engine, x.view(), 10, DerivativeOrder::Third, &[0, 1], &names(&["a", "b"]))
        .unwrap();
    // 2 + 3 + 4 coefficients
    assert_eq!(store.len(), 9);
    assert_relative_eq!(store.series()[&key(vec![0, 1])][0], 1.0, max_relative = 1e-12);
    assert_eq!(store.series()[&key(vec![0, 0, 1])][0], 0.0);
}

#[test]
fn clear_empties_and_rebuilds() {
    let x = array![[1.0, 2.0]];
    let model = Scaled { w: 2.0 };
    let engine = DerivativeEngine::new(&model);
    let mut store = CheckpointStore::new();
    let n = names(&["a", "b"]);
    store
        .checkpoint(&engine, x.view(), 0, DerivativeOrder::Second, &[0, 1], &n)
        .unwrap();
    assert!(!store.is_empty());

    store.clear();
    assert!(store.is_empty());
    assert!(store.series().is_empty());
    assert!(store.time_steps().is_empty());
    store.clear();
    assert!(store.is_empty());

    store
        .checkpoint(&engine, x.view(), 1, DerivativeOrder::First, &[0, 1], &n)
        .unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.series().values().all(|v| v.len() == 1));
}

#[test]
fn mismatched_names_are_refused() {
    let x = array![[1.0, 2.0]];
    let model = Scaled { w: 1.0 };
    let engine = DerivativeEngine::new(&model);
    let mut store = CheckpointStore::new();
    let err = store
        .checkpoint(&engine, x.view(), 0, DerivativeOrder::First, &[0, 1], &names(&["a"]))
        .unwrap_err();
    assert!(matches!(err, Error::LabelMismatch(_)));
    assert!(store.is_empty());
}

#[test]
fn failed_checkpoint_appends_nothing() {
    let x = array![[1.0, 2.0]];
    let mut store = CheckpointStore::new();
    let n = names(&["a", "b"]);

    let good = Scaled { w: 1.0 };
    store
        .checkpoint(&DerivativeEngine::new(&good), x.view(), 0, DerivativeOrder::First, &[0, 1], &n)
        .unwrap();

    let limited = FirstOrderOnly;
    let err = store
        .checkpoint(
            &DerivativeEngine::new(&limited),
            x.view(),
            1,
            DerivativeOrder::Second,
            &[0, 1],
            &n,
        )
        .unwrap_err();
    assert!(matches!(err, Error::NonDifferentiable(_)));

    assert_eq!(store.time_steps(), &[0]);
    assert_eq!(store.len(), 2);
    assert!(store.series().values().all(|v| v.len() == 1));
}

#[test]
fn csv_has_header_and_quoted_labels() {
    let x = array![[1.0, 2.0]];
    let mut store = CheckpointStore::new();
    let n = names(&["a", "b"]);
    for (step, w) in [(5, 1.0), (6, 2.0)] {
        let model = Scaled { w };
        store
            .checkpoint(&DerivativeEngine::new(&model), x.view(), step, DerivativeOrder::Second, &[0, 1], &n)
            .unwrap();
    }

    let path = temp_file("series.csv");
    fs::write(&path, "stale contents\n").unwrap();
    store.save_csv(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "label,5,6");
    assert_eq!(lines.len(), 1 + 5);
    assert_eq!(lines[1], "<t_{a}>,2,4");
    assert!(lines.contains(&"\"<t_{a,b}>\",1,2"));
    assert!(!text.contains("stale"));
}
