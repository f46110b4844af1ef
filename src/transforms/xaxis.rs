//! X-axis basis selector.

use crate::dataset::{epoch_ms, Column, DatasetStore};
use crate::state::XAxisBasis;

#[derive(Debug, Clone)]
pub struct XAxisSelector {
    current: XAxisBasis,
}

impl Default for XAxisSelector {
    fn default() -> Self {
        Self {
            current: XAxisBasis::Date,
        }
    }
}

impl XAxisSelector {
    pub fn current(&self) -> XAxisBasis {
        self.current
    }

    pub fn select(&mut self, store: &mut DatasetStore, basis: XAxisBasis) -> bool {
        if basis == self.current {
            return false;
        }
        resolve(store, basis);
        self.current = basis;
        true
    }
}

/// Writes `x_col`: epoch milliseconds for dates, day counts otherwise. Rows
/// before a region's threshold get a missing x and drop out of views.
pub fn resolve(store: &mut DatasetStore, basis: XAxisBasis) {
    for row in store.rows_mut() {
        let x = match basis {
            XAxisBasis::Date => Some(epoch_ms(row.date)),
            XAxisBasis::DaysSince100thCase => row.get(Column::DaysSince100),
            XAxisBasis::DaysSince10thDeath => row.get(Column::DaysSince10),
        };
        row.set(Column::XCol, x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::region_rows;

    #[test]
    fn days_since_basis_leaves_pre_threshold_rows_missing() {
        let mut store = DatasetStore::from_rows(region_rows("Peru", &[40.0, 90.0, 130.0, 210.0], 3.2e7)).unwrap();
        let mut sel = XAxisSelector::default();
        assert!(sel.select(&mut store, XAxisBasis::DaysSince100thCase));
        let xs: Vec<Option<f64>> = store.rows().iter().map(|r| r.x()).collect();
        assert_eq!(xs, vec![None, None, Some(2.0), Some(3.0)]);

        assert!(sel.select(&mut store, XAxisBasis::Date));
        assert!(store.rows().iter().all(|r| r.x() == Some(epoch_ms(r.date))));
    }

    #[test]
    fn same_basis_is_skipped() {
        let mut store = DatasetStore::from_rows(region_rows("Peru", &[40.0], 3.2e7)).unwrap();
        let mut sel = XAxisSelector::default();
        assert!(!sel.select(&mut store, XAxisBasis::Date));
    }
}
