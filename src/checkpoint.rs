//! Coefficient series accumulated across training checkpoints.
//!
//! Series are keyed by [`CoefficientKey`]; the display label is derived by
//! [`format_label`] and kept alongside for presentation only.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::ArrayView2;

use crate::engine::DerivativeEngine;
use crate::error::Result;
use crate::model::{Model, OutputSelection};
use crate::selection::{DerivativeOrder, EvaluationPoint, SelectionEnumerator, VariableSet};
use crate::snapshot::Snapshot;
use crate::tape::TapeThreadLocal;

/// Storage identity of a coefficient: which outputs were differentiated and
/// at which evaluation point.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoefficientKey {
    output: OutputSelection,
    point: EvaluationPoint,
}

impl CoefficientKey {
    pub fn new(output: OutputSelection, point: EvaluationPoint) -> Self {
        CoefficientKey { output, point }
    }

    #[inline]
    pub fn output(&self) -> &OutputSelection {
        &self.output
    }

    #[inline]
    pub fn point(&self) -> &EvaluationPoint {
        &self.point
    }
}

/// Display label of `key`: `<t_{a}>`, `<t_{a,b}>` or `<t_{a,b,c}>` over the
/// variable names, followed by the output suffix (` [node k]`) when the key
/// is not over all outputs.
///
/// Indices without a name fall back to `x_<index>`.
pub fn format_label(key: &CoefficientKey, variables: &VariableSet) -> String {
    let names: Vec<String> = key
        .point
        .indices()
        .iter()
        .map(|&i| match variables.name_of(i) {
            Some(name) => name.to_owned(),
            None => format!("x_{i}"),
        })
        .collect();
    format!("<t_{{{}}}>{}", names.join(","), key.output.label_suffix())
}

/// Accumulates one value per coefficient and checkpoint call.
///
/// Not synchronized: callers serialize `checkpoint` and `clear`.
#[derive(Clone, Debug, Default)]
pub struct CheckpointStore<F> {
    series: BTreeMap<CoefficientKey, Vec<F>>,
    labels: BTreeMap<CoefficientKey, String>,
    time_steps: Vec<usize>,
}

impl<F: TapeThreadLocal> CheckpointStore<F> {
    pub fn new() -> Self {
        CheckpointStore {
            series: BTreeMap::new(),
            labels: BTreeMap::new(),
            time_steps: Vec::new(),
        }
    }

    /// Evaluate every coefficient of order `1..=order` over the considered
    /// features and append one value per coefficient.
    ///
    /// `names` labels `considered` position by position.
    ///
    /// # Errors
    ///
    /// [`LabelMismatchError`](crate::LabelMismatchError) if `names` and
    /// `considered` differ in length, plus every engine error. On error
    /// nothing is appended.
    pub fn checkpoint<M: Model<F>>(
        &mut self,
        engine: &DerivativeEngine<'_, F, M>,
        x: ArrayView2<F>,
        time_step: usize,
        order: DerivativeOrder,
        considered: &[usize],
        names: &[String],
    ) -> Result<()> {
        let variables = VariableSet::new(
            engine.adapter().num_inputs(),
            considered.to_vec(),
            names.to_vec(),
        )?;
        let points = SelectionEnumerator::new(&variables).enumerate_up_to(order, &[])?;
        let snapshot = Snapshot::evaluate(
            engine,
            x,
            std::slice::from_ref(engine.output_selection()),
            &points,
            &variables,
        )?;
        self.append(time_step, &snapshot);
        Ok(())
    }

    /// Append a fully computed snapshot as one checkpoint.
    ///
    /// Series seen for the first time start empty.
    pub fn append(&mut self, time_step: usize, snapshot: &Snapshot<F>) {
        for entry in snapshot {
            self.labels
                .entry(entry.key.clone())
                .or_insert_with(|| entry.label.clone());
            self.series
                .entry(entry.key.clone())
                .or_default()
                .push(entry.value);
        }
        self.time_steps.push(time_step);
        log::info!(
            "checkpoint at step {time_step}: {} coefficients, {} series",
            snapshot.len(),
            self.series.len()
        );
    }
}

impl<F> CheckpointStore<F> {
    /// Drop every series and time step.
    pub fn clear(&mut self) {
        self.series.clear();
        self.labels.clear();
        self.time_steps.clear();
    }

    /// The accumulated series, read-only.
    pub fn series(&self) -> &BTreeMap<CoefficientKey, Vec<F>> {
        &self.series
    }

    /// Series under their display labels, in key order.
    pub fn labeled_series(&self) -> Vec<(&str, &[F])> {
        self.series
            .iter()
            .map(|(key, values)| {
                let label = self.labels.get(key).map_or("", String::as_str);
                (label, values.as_slice())
            })
            .collect()
    }

    /// Time step of every checkpoint call, in call order.
    pub fn time_steps(&self) -> &[usize] {
        &self.time_steps
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl<F: Clone> CheckpointStore<F> {
    /// A copy holding only the series of coefficients of `order`.
    #[must_use]
    pub fn filter_order(&self, order: DerivativeOrder) -> Self {
        let keep = |key: &CoefficientKey| key.point().order() == order;
        CheckpointStore {
            series: self
                .series
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(key, values)| (key.clone(), values.clone()))
                .collect(),
            labels: self
                .labels
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(key, label)| (key.clone(), label.clone()))
                .collect(),
            time_steps: self.time_steps.clone(),
        }
    }
}

impl<F: std::fmt::Display> CheckpointStore<F> {
    /// Write the series as comma-separated text, replacing any existing file.
    ///
    /// The header is `label` followed by the time steps; each row is one
    /// series. A series that started late is right-aligned under the steps
    /// it was recorded at.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);

        let header: Vec<String> = std::iter::once("label".to_owned())
            .chain(self.time_steps.iter().map(ToString::to_string))
            .collect();
        writeln!(out, "{}", header.join(","))?;

        let width = self.time_steps.len();
        for (label, values) in self.labeled_series() {
            let mut row = vec![csv_field(label)];
            row.extend(std::iter::repeat(String::new()).take(width.saturating_sub(values.len())));
            row.extend(values.iter().map(ToString::to_string));
            writeln!(out, "{}", row.join(","))?;
        }
        out.flush()?;
        log::info!("wrote {} series to {}", self.series.len(), path.display());
        Ok(())
    }
}

/// Quote a field containing a delimiter, a quote or a line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}
