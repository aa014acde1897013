//! The analysis wrapper end to end.

use approx::assert_relative_eq;
use ndarray::{array, Array2, ArrayView2};
#[cfg(feature = "render")]
use taylor_analysis::RenderError;
use taylor_analysis::{
    AnalysisConfig, DerivativeOrder, Error, EvalRequest, Model, OutputSelection, Scalar,
    ShapeError, TaylorAnalysis,
};

/// y_0 = x_0^2 x_1, y_1 = x_1^3.
struct Poly;

impl Model<f64> for Poly {
    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn forward<S: Scalar<Float = f64>>(&self, x: ArrayView2<S>) -> Array2<S> {
        Array2::from_shape_fn((x.nrows(), 2), |(b, k)| {
            let (a, c) = (x[[b, 0]], x[[b, 1]]);
            if k == 0 {
                a * a * c
            } else {
                c * c * c
            }
        })
    }
}

fn config(order: DerivativeOrder) -> AnalysisConfig {
    AnalysisConfig {
        variable_names: vec!["a".into(), "c".into()],
        ..AnalysisConfig::new(2, order)
    }
}

#[test]
fn calculate_covers_every_point_and_output() {
    let mut cfg = config(DerivativeOrder::Second);
    cfg.output_nodes = vec![OutputSelection::All, OutputSelection::Node(1)];
    let analysis = TaylorAnalysis::new(&Poly, cfg).unwrap();
    let x = array![[1.0, 2.0]];

    let snapshot = analysis.calculate(x.view()).unwrap();
    assert_eq!(snapshot.len(), 2 * 5);

    let labels: Vec<&str> = snapshot.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(&labels[..5], &["<t_{a}>", "<t_{c}>", "<t_{a,a}>", "<t_{a,c}>", "<t_{c,c}>"]);
    assert_eq!(labels[5], "<t_{a}> [node 1]");

    // all outputs: ∂/∂c (a^2 c + c^3) = a^2 + 3c^2 = 13
    assert_relative_eq!(snapshot.entries()[1].value, 13.0, max_relative = 1e-12);
    // node 1 only: ∂²/∂c² c^3 = 6c = 12
    assert_relative_eq!(snapshot.entries()[9].value, 12.0, max_relative = 1e-12);
    // node 1 does not depend on a
    assert_eq!(snapshot.entries()[5].value, 0.0);
}

#[test]
fn checkpoints_follow_configured_requests() {
    let mut cfg = config(DerivativeOrder::Third);
    cfg.eval_nodes = vec![EvalRequest::Index(0), EvalRequest::Tuple(vec![0, 0, 1])];
    let mut analysis = TaylorAnalysis::new(&Poly, cfg).unwrap();
    let x = array![[1.0, 2.0], [-1.0, 1.0]];

    for step in 0..3 {
        analysis.checkpoint(x.view(), step * 10).unwrap();
    }
    let store = analysis.checkpoints();
    assert_eq!(store.len(), 2);
    assert_eq!(store.time_steps(), &[0, 10, 20]);

    // ∂³/∂a²∂c (a^2 c) = 2
    let (label, values) = store.labeled_series()[1];
    assert_eq!(label, "<t_{a,a,c}>");
    for &v in values {
        assert_relative_eq!(v, 2.0, max_relative = 1e-12);
    }

    analysis.clear_checkpoints();
    assert!(analysis.checkpoints().is_empty());
}

#[test]
fn wrapper_checks_the_model() {
    let mut cfg = config(DerivativeOrder::First);
    cfg.output_nodes = vec![OutputSelection::Node(2)];
    assert!(matches!(
        TaylorAnalysis::new(&Poly, cfg).unwrap_err(),
        Error::InvalidSelection(_)
    ));

    let cfg = AnalysisConfig::new(3, DerivativeOrder::First);
    assert!(matches!(
        TaylorAnalysis::new(&Poly, cfg).unwrap_err(),
        Error::Shape(ShapeError::WidthMismatch { expected: 2, found: 3 })
    ));
}

#[test]
fn forward_and_csv() {
    let mut analysis = TaylorAnalysis::new(&Poly, config(DerivativeOrder::First)).unwrap();
    let x = array![[1.0, 2.0]];
    assert_eq!(analysis.forward(x.view()).unwrap(), array![[2.0, 8.0]]);

    analysis.checkpoint(x.view(), 1).unwrap();
    let dir = std::env::temp_dir().join(format!("taylor-analysis-facade-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("tc.csv");
    analysis.save_checkpoints(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    // ∂/∂a = 2ac = 4, ∂/∂c = a^2 + 3c^2 = 13
    assert_eq!(text, "label,1\n<t_{a}>,4\n<t_{c}>,13\n");
}

#[cfg(feature = "render")]
fn plot_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("taylor-analysis-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(feature = "render")]
#[test]
fn plots_are_written() {
    let mut analysis = TaylorAnalysis::new(&Poly, config(DerivativeOrder::Second)).unwrap();
    let x = array![[1.0, 2.0]];
    let dir = plot_dir("plots");

    let written = analysis
        .plot_taylor_coefficients(x.view(), &[dir.join("tc.svg")], true)
        .unwrap();
    assert_eq!(
        written,
        vec![dir.join("tc_order1.svg"), dir.join("tc_order2.svg")]
    );
    assert!(written.iter().all(|p| p.exists()));

    analysis.checkpoint(x.view(), 0).unwrap();
    analysis.checkpoint(x.view(), 1).unwrap();
    let written = analysis.plot_checkpoints(&[dir.join("series.svg")]).unwrap();
    let svg = std::fs::read_to_string(&written[0]).unwrap();
    assert!(svg.contains("t_{a}"));
    assert!(svg.contains("t_{a,c}"));
}

#[cfg(feature = "render")]
#[test]
fn max_order_only_hides_lower_orders_in_both_plots() {
    let mut cfg = config(DerivativeOrder::Second);
    cfg.eval_only_max_node = true;
    let mut analysis = TaylorAnalysis::new(&Poly, cfg).unwrap();
    let x = array![[1.0, 2.0], [0.5, -1.0]];
    let dir = plot_dir("max-order");

    let written = analysis
        .plot_taylor_coefficients(x.view(), &[dir.join("tc.svg")], true)
        .unwrap();
    assert_eq!(written, vec![dir.join("tc_order2.svg")]);

    for step in 0..3 {
        analysis.checkpoint(x.view(), step).unwrap();
    }
    // every order is still recorded
    assert_eq!(analysis.checkpoints().len(), 5);

    let written = analysis.plot_checkpoints(&[dir.join("series.svg")]).unwrap();
    let svg = std::fs::read_to_string(&written[0]).unwrap();
    for label in ["t_{a,a}", "t_{a,c}", "t_{c,c}"] {
        assert!(svg.contains(label), "missing {label}");
    }
    assert!(!svg.contains("t_{a}"));
    assert!(!svg.contains("t_{c}"));
}

#[cfg(feature = "render")]
#[test]
fn max_order_without_requests_of_that_order_has_nothing_to_plot() {
    let mut cfg = config(DerivativeOrder::Third);
    cfg.eval_only_max_node = true;
    cfg.eval_nodes = vec![EvalRequest::Index(0), EvalRequest::Tuple(vec![0, 1])];
    let analysis = TaylorAnalysis::new(&Poly, cfg).unwrap();
    let x = array![[1.0, 2.0]];
    let dir = plot_dir("max-order-empty");

    assert!(matches!(
        analysis
            .plot_taylor_coefficients(x.view(), &[dir.join("tc.svg")], false)
            .unwrap_err(),
        Error::Render(RenderError::Empty)
    ));
}

#[test]
fn wrapper_debug_does_not_need_a_debug_model() {
    let analysis = TaylorAnalysis::new(&Poly, config(DerivativeOrder::First)).unwrap();
    let text = format!("{analysis:?}");
    assert!(text.starts_with("TaylorAnalysis"));
    assert!(text.contains("DerivativeEngine"));
}
