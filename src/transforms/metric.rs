//! Metric selector: points the working columns at one concept.

use crate::dataset::{Column, DatasetStore};
use crate::state::MetricKind;

const DOUBLING_WORKING: [Column; 3] = [Column::Double3, Column::Double5, Column::Double10];

#[derive(Debug, Clone)]
pub struct MetricSelector {
    current: MetricKind,
}

impl Default for MetricSelector {
    /// A freshly loaded store aliases Cases.
    fn default() -> Self {
        Self {
            current: MetricKind::Cases,
        }
    }
}

impl MetricSelector {
    pub fn current(&self) -> MetricKind {
        self.current
    }

    /// Returns whether the working columns were rewritten.
    pub fn select(&mut self, store: &mut DatasetStore, kind: MetricKind) -> bool {
        if kind == self.current {
            return false;
        }
        alias_working_columns(store, kind);
        self.current = kind;
        true
    }
}

/// Copies the counters for `kind` into `metric`, `metric_1st_der`,
/// `metric_2nd_der` and the doubling working columns. Kinds without doubling
/// curves get missing values there. Smoothed columns are left to the
/// smoothing transform.
pub fn alias_working_columns(store: &mut DatasetStore, kind: MetricKind) {
    let (count, first, second) = Column::sources_for(kind);
    let doubling = Column::doubling_sources_for(kind);
    for row in store.rows_mut() {
        row.set(Column::Metric, row.get(count));
        row.set(Column::Metric1stDer, row.get(first));
        row.set(Column::Metric2ndDer, row.get(second));
        for (i, working) in DOUBLING_WORKING.into_iter().enumerate() {
            let value = doubling.and_then(|src| row.get(src[i]));
            row.set(working, value);
        }
    }
}
