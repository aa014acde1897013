//! Coefficients of one evaluation at fixed model weights.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use ndarray::ArrayView2;

use crate::checkpoint::{format_label, CoefficientKey};
use crate::engine::DerivativeEngine;
use crate::error::Result;
use crate::model::{Model, OutputSelection};
use crate::selection::{DerivativeOrder, EvaluationPoint, VariableSet};
use crate::tape::TapeThreadLocal;

/// A single labelled coefficient.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEntry<F> {
    pub key: CoefficientKey,
    pub label: String,
    pub value: F,
}

/// Ordered coefficients from one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<F> {
    entries: Vec<SnapshotEntry<F>>,
}

impl<F: TapeThreadLocal> Snapshot<F> {
    /// Evaluate `points` for every output selection in `outputs`.
    ///
    /// Each output selection is recorded once and shared by all its points.
    /// Entries are ordered by output selection, then by point.
    pub fn evaluate<M: Model<F>>(
        engine: &DerivativeEngine<'_, F, M>,
        x: ArrayView2<F>,
        outputs: &[OutputSelection],
        points: &[EvaluationPoint],
        variables: &VariableSet,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(outputs.len() * points.len());
        for output in outputs {
            let recorded = engine.record_with(x, output)?;
            let values = recorded.coefficients(points)?;
            for (point, value) in points.iter().zip(values) {
                let key = CoefficientKey::new(output.clone(), point.clone());
                let label = format_label(&key, variables);
                entries.push(SnapshotEntry { key, label, value });
            }
        }
        Ok(Snapshot { entries })
    }

    /// Keep only coefficients of the evaluated maximum order `max`, even
    /// when no coefficient of that order was requested.
    #[must_use]
    pub fn filter_max_order(&self, max: DerivativeOrder) -> Self {
        self.filter_order(max)
    }

    /// Keep only coefficients of `order`.
    #[must_use]
    pub fn filter_order(&self, order: DerivativeOrder) -> Self {
        Snapshot {
            entries: self
                .entries
                .iter()
                .filter(|e| e.key.point().order() == order)
                .cloned()
                .collect(),
        }
    }

    /// Entries by descending magnitude; NaN sorts last.
    #[must_use]
    pub fn sorted(&self) -> Self {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| {
            let (a, b) = (a.value.abs(), b.value.abs());
            match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            }
        });
        Snapshot { entries }
    }

    /// Value of the coefficient stored under `key`.
    pub fn get(&self, key: &CoefficientKey) -> Option<F> {
        self.entries.iter().find(|e| &e.key == key).map(|e| e.value)
    }
}

impl<F> Snapshot<F> {
    pub fn from_entries(entries: Vec<SnapshotEntry<F>>) -> Self {
        Snapshot { entries }
    }

    pub fn entries(&self) -> &[SnapshotEntry<F>] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry<F>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Orders present, ascending.
    pub fn orders(&self) -> BTreeSet<DerivativeOrder> {
        self.entries.iter().map(|e| e.key.point().order()).collect()
    }
}

impl<'a, F> IntoIterator for &'a Snapshot<F> {
    type Item = &'a SnapshotEntry<F>;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(indices: Vec<usize>, value: f64) -> SnapshotEntry<f64> {
        let key = CoefficientKey::new(
            OutputSelection::All,
            EvaluationPoint::new(indices).unwrap(),
        );
        let label = format_label(&key, &VariableSet::all(3));
        SnapshotEntry { key, label, value }
    }

    #[test]
    fn sorted_puts_largest_magnitude_first_and_nan_last() {
        let snap = Snapshot::from_entries(vec![
            entry(vec![0], 0.5),
            entry(vec![1], f64::NAN),
            entry(vec![2], -3.0),
            entry(vec![0, 1], 1.0),
        ]);
        let sorted = snap.sorted();
        let labels: Vec<&str> = sorted.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["<t_{x_2}>", "<t_{x_0,x_1}>", "<t_{x_0}>", "<t_{x_1}>"]);
    }

    #[test]
    fn max_order_filter_keeps_one_order() {
        let snap = Snapshot::from_entries(vec![
            entry(vec![0], 0.5),
            entry(vec![0, 1], 1.0),
            entry(vec![1, 1], 2.0),
        ]);
        let top = snap.filter_max_order(DerivativeOrder::Second);
        assert_eq!(top.len(), 2);
        assert_eq!(
            top.orders().into_iter().collect::<Vec<_>>(),
            vec![DerivativeOrder::Second]
        );
        // nothing of the evaluated maximum survives when none was requested
        assert!(snap.filter_max_order(DerivativeOrder::Third).is_empty());
    }
}
