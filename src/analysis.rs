//! One-stop wrapper tying a model, its configuration and a checkpoint store
//! together.

use std::fmt;
#[cfg(feature = "render")]
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};

use crate::checkpoint::CheckpointStore;
use crate::config::AnalysisConfig;
use crate::engine::DerivativeEngine;
use crate::error::{Result, ShapeError};
use crate::model::Model;
use crate::scalar::Scalar;
use crate::selection::{EvaluationPoint, VariableSet};
use crate::snapshot::Snapshot;
use crate::tape::TapeThreadLocal;

#[cfg(feature = "render")]
use crate::render::{self, RenderConfig};

/// Taylor-coefficient analysis of a borrowed model.
///
/// The evaluation points are fixed at construction from the configuration.
/// Every new wrapper starts with an empty checkpoint store.
pub struct TaylorAnalysis<'m, F: TapeThreadLocal, M: Model<F>> {
    engine: DerivativeEngine<'m, F, M>,
    config: AnalysisConfig,
    variables: VariableSet,
    points: Vec<EvaluationPoint>,
    store: CheckpointStore<F>,
}

impl<'m, F: TapeThreadLocal, M: Model<F>> TaylorAnalysis<'m, F, M> {
    /// # Errors
    ///
    /// Any configuration error, a feature count that differs from the
    /// model's input width, or an output node the model does not have.
    pub fn new(model: &'m M, config: AnalysisConfig) -> Result<Self> {
        let variables = config.variables()?;
        let points = config.points()?;
        if config.number_of_variables_in_data != model.num_inputs() {
            return Err(ShapeError::WidthMismatch {
                expected: model.num_inputs(),
                found: config.number_of_variables_in_data,
            }
            .into());
        }
        for output in &config.output_nodes {
            output.validate(model.num_outputs())?;
        }
        let tolerance = F::from_f64(config.kink_tolerance).unwrap_or_else(F::zero);
        log::debug!(
            "analysis over {} variables, {} evaluation points, {} output selections",
            variables.len(),
            points.len(),
            config.output_nodes.len()
        );
        Ok(TaylorAnalysis {
            engine: DerivativeEngine::new(model).kink_tolerance(tolerance),
            config,
            variables,
            points,
            store: CheckpointStore::new(),
        })
    }

    /// Plain model prediction.
    pub fn forward(&self, x: ArrayView2<F>) -> Result<Array2<F>>
    where
        F: Scalar<Float = F>,
    {
        self.engine.adapter().forward(x)
    }

    /// Coefficients of every configured point and output selection.
    pub fn calculate(&self, x: ArrayView2<F>) -> Result<Snapshot<F>> {
        Snapshot::evaluate(
            &self.engine,
            x,
            &self.config.output_nodes,
            &self.points,
            &self.variables,
        )
    }

    /// Evaluate all coefficients and append them as checkpoint `time_step`.
    ///
    /// Nothing is appended if any coefficient fails.
    pub fn checkpoint(&mut self, x: ArrayView2<F>, time_step: usize) -> Result<()> {
        let snapshot = self.calculate(x)?;
        self.store.append(time_step, &snapshot);
        Ok(())
    }

    pub fn checkpoints(&self) -> &CheckpointStore<F> {
        &self.store
    }

    pub fn clear_checkpoints(&mut self) {
        self.store.clear();
    }

    /// Write the checkpoint series as CSV.
    pub fn save_checkpoints(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.store.save_csv(path)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn points(&self) -> &[EvaluationPoint] {
        &self.points
    }

    pub fn engine(&self) -> &DerivativeEngine<'m, F, M> {
        &self.engine
    }
}

impl<F: TapeThreadLocal, M: Model<F>> fmt::Debug for TaylorAnalysis<'_, F, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaylorAnalysis")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("points", &self.points.len())
            .field("checkpoints", &self.store.time_steps().len())
            .finish()
    }
}

#[cfg(feature = "render")]
impl<'m, F: TapeThreadLocal, M: Model<F>> TaylorAnalysis<'m, F, M> {
    fn render_config(&self, title: &str) -> RenderConfig {
        RenderConfig::new()
            .title(title)
            .sorted(self.config.sorted)
            .per_plot(self.config.number_of_tc_per_plot.unwrap_or(0))
    }

    /// Evaluate `x` and plot the coefficients, one figure per order when
    /// `split`. With `eval_only_max_node` only coefficients of
    /// `derivation_order` are drawn.
    pub fn plot_taylor_coefficients<P: AsRef<Path>>(
        &self,
        x: ArrayView2<F>,
        paths: &[P],
        split: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut snapshot = self.calculate(x)?;
        if self.config.eval_only_max_node {
            snapshot = snapshot.filter_max_order(self.config.derivation_order);
        }
        render::render_snapshot(
            &snapshot,
            paths,
            split,
            &self.render_config("Taylor coefficients"),
        )
    }

    /// Plot the checkpoint series over their time steps. With
    /// `eval_only_max_node` only series of `derivation_order` are drawn.
    pub fn plot_checkpoints<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<PathBuf>> {
        let config = self.render_config("Taylor coefficients over training");
        if self.config.eval_only_max_node {
            let store = self.store.filter_order(self.config.derivation_order);
            render::render_series(&store, paths, &config)
        } else {
            render::render_series(&self.store, paths, &config)
        }
    }
}
