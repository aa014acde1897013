//! Analysis configuration, loadable from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::model::OutputSelection;
use crate::selection::{DerivativeOrder, EvalRequest, EvaluationPoint, SelectionEnumerator, VariableSet};

/// What to evaluate and how to present it.
///
/// ```
/// use taylor_analysis::AnalysisConfig;
///
/// let config = AnalysisConfig::from_toml_str(r#"
///     number_of_variables_in_data = 3
///     considered_variables_idx = [0, 2]
///     variable_names = ["mass", "pt"]
///     derivation_order = 2
///     eval_nodes = [0, [0, 2], "all"]
/// "#).unwrap();
/// assert_eq!(config.points().unwrap().len(), 5);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub number_of_variables_in_data: usize,
    pub considered_variables_idx: Vec<usize>,
    pub variable_names: Vec<String>,
    /// Highest order evaluated; every lower order is evaluated too.
    pub derivation_order: DerivativeOrder,
    /// Explicit evaluation requests; empty means every coefficient.
    #[serde(default)]
    pub eval_nodes: Vec<EvalRequest>,
    /// Only plot coefficients of `derivation_order`, in snapshots and in
    /// checkpoint series alike. Lower orders are still computed and saved.
    #[serde(default)]
    pub eval_only_max_node: bool,
    /// Output selections analysed side by side.
    #[serde(default = "default_output_nodes")]
    pub output_nodes: Vec<OutputSelection>,
    /// Distance from an `abs`/`min`/`max` switching point at or below which
    /// a derivative is refused with a kink error.
    ///
    /// The default `0.0` still refuses exact switching points, so a ReLU or
    /// `abs` hit at exactly zero by any sample (zero padding, sparse inputs)
    /// fails the whole batch. A negative value disables the check and the
    /// tape's one-sided derivative is used instead.
    #[serde(default)]
    pub kink_tolerance: f64,
    /// Coefficients per snapshot plot page; unset draws one page.
    #[serde(default)]
    pub number_of_tc_per_plot: Option<usize>,
    /// Sort snapshot plots by descending magnitude.
    #[serde(default)]
    pub sorted: bool,
}

fn default_output_nodes() -> Vec<OutputSelection> {
    vec![OutputSelection::All]
}

impl AnalysisConfig {
    /// Every feature considered and named `x_<i>`, up to `order`.
    pub fn new(number_of_variables_in_data: usize, order: DerivativeOrder) -> Self {
        let all = VariableSet::all(number_of_variables_in_data);
        AnalysisConfig {
            number_of_variables_in_data,
            considered_variables_idx: all.indices().to_vec(),
            variable_names: all.names().to_vec(),
            derivation_order: order,
            eval_nodes: Vec::new(),
            eval_only_max_node: false,
            output_nodes: default_output_nodes(),
            kink_tolerance: 0.0,
            number_of_tc_per_plot: None,
            sorted: false,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(s).map_err(ConfigError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check names against considered indices and every request against
    /// the considered set. Output nodes are checked against the model later.
    pub fn validate(&self) -> Result<()> {
        self.points()?;
        Ok(())
    }

    pub fn variables(&self) -> Result<VariableSet> {
        VariableSet::new(
            self.number_of_variables_in_data,
            self.considered_variables_idx.clone(),
            self.variable_names.clone(),
        )
    }

    /// Evaluation points of every order up to `derivation_order`.
    pub fn points(&self) -> Result<Vec<EvaluationPoint>> {
        let variables = self.variables()?;
        let points = SelectionEnumerator::new(&variables)
            .enumerate_up_to(self.derivation_order, &self.eval_nodes)?;
        Ok(points)
    }
}
