//! Trailing moving averages of the working derivative columns.

use crate::dataset::{Column, DatasetStore};
use crate::indicators::Sma;

#[derive(Debug, Clone, Default)]
pub struct Smoother {
    current: usize,
}

impl Smoother {
    pub fn current(&self) -> usize {
        self.current
    }

    /// Recomputes `smooth_1st_der` and `smooth_2nd_der` from the current
    /// working derivatives. Window 0 copies them unsmoothed.
    pub fn apply(&mut self, store: &mut DatasetStore, window: usize) {
        if window == 0 {
            reset(store);
        } else {
            smooth(store, window);
        }
        self.current = window;
    }
}

pub fn reset(store: &mut DatasetStore) {
    for row in store.rows_mut() {
        row.set(Column::Smooth1stDer, row.get(Column::Metric1stDer));
        row.set(Column::Smooth2ndDer, row.get(Column::Metric2ndDer));
    }
}

/// Per region, in date order: the first `window - 1` rows of each region have
/// no full window and are left missing.
pub fn smooth(store: &mut DatasetStore, window: usize) {
    store.for_each_region_mut(|rows| {
        let mut first = Sma::new(window);
        let mut second = Sma::new(window);
        for row in rows.iter_mut() {
            let s1 = first.update(row.get(Column::Metric1stDer));
            let s2 = second.update(row.get(Column::Metric2ndDer));
            row.set(Column::Smooth1stDer, s1);
            row.set(Column::Smooth2ndDer, s2);
        }
    });
}
