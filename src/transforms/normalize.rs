//! Per-100k population normalization.
//!
//! The rescale is multiplicative and not idempotent, so the applied mode is
//! tracked and selecting it again does nothing.

use crate::dataset::{Column, DatasetStore, ForecastColumn};
use crate::state::NormalizationMode;

const PER: f64 = 100_000.0;

#[derive(Debug, Clone)]
pub struct Normalizer {
    current: NormalizationMode,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            current: NormalizationMode::TotalNumbers,
        }
    }
}

impl Normalizer {
    pub fn current(&self) -> NormalizationMode {
        self.current
    }

    /// Rescales every scale-sensitive time-series column and every forecast
    /// column. Returns false, touching nothing, when `mode` is already applied.
    pub fn apply(&mut self, store: &mut DatasetStore, mode: NormalizationMode) -> bool {
        if mode == self.current {
            return false;
        }
        let columns = Column::scale_sensitive();
        store.apply_column_transform(&columns, |v, pop| rescale(v, pop, mode));
        store.apply_forecast_transform(&ForecastColumn::ALL, |v, pop| rescale(v, pop, mode));
        self.current = mode;
        true
    }
}

/// Converts a value into `to`'s representation. A missing or non-positive
/// population has no per-100k value.
pub fn rescale(value: f64, population: Option<f64>, to: NormalizationMode) -> Option<f64> {
    let pop = population.filter(|p| *p > 0.0)?;
    match to {
        NormalizationMode::Per100k => Some((value / pop) * PER),
        NormalizationMode::TotalNumbers => Some(value * (pop / PER)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::region_rows;
    use crate::dataset::TimeSeriesRow;

    fn snapshot(store: &DatasetStore) -> Vec<TimeSeriesRow> {
        store.rows().to_vec()
    }

    #[test]
    fn per100k_scales_counts_but_not_rates_or_population() {
        let mut store = DatasetStore::from_rows(region_rows("Iceland", &[200.0, 400.0], 200_000.0)).unwrap();
        let before = snapshot(&store);
        let mut norm = Normalizer::default();
        assert!(norm.apply(&mut store, NormalizationMode::Per100k));
        let halved = |a: Option<f64>, b: Option<f64>| (a.unwrap() - b.unwrap() / 2.0).abs() < 1e-9;
        for (b, a) in before.iter().zip(store.rows()) {
            assert!(halved(a.get(Column::Confirmed), b.get(Column::Confirmed)));
            assert!(halved(a.get(Column::Metric), b.get(Column::Metric)));
            assert_eq!(a.get(Column::Population), b.get(Column::Population));
            assert_eq!(a.get(Column::DeathRate), b.get(Column::DeathRate));
            assert_eq!(a.get(Column::DaysSince100), b.get(Column::DaysSince100));
            assert_eq!(a.x(), b.x());
        }
    }

    #[test]
    fn reselecting_active_mode_is_bit_identical() {
        let mut store = DatasetStore::from_rows(region_rows("Iceland", &[3.0, 7.0, 11.0], 364_134.0)).unwrap();
        let mut norm = Normalizer::default();
        norm.apply(&mut store, NormalizationMode::Per100k);
        let after_second = snapshot(&store);
        assert!(!norm.apply(&mut store, NormalizationMode::Per100k));
        assert_eq!(snapshot(&store), after_second);

        norm.apply(&mut store, NormalizationMode::TotalNumbers);
        let totals = snapshot(&store);
        assert!(!norm.apply(&mut store, NormalizationMode::TotalNumbers));
        assert_eq!(snapshot(&store), totals);
    }

    #[test]
    fn round_trip_restores_totals_within_tolerance() {
        let mut store = DatasetStore::from_rows(region_rows("Iceland", &[3.0, 7.0, 11.0], 364_134.0)).unwrap();
        let before = snapshot(&store);
        let mut norm = Normalizer::default();
        norm.apply(&mut store, NormalizationMode::Per100k);
        norm.apply(&mut store, NormalizationMode::TotalNumbers);
        for (b, a) in before.iter().zip(store.rows()) {
            let (x, y) = (b.get(Column::Confirmed).unwrap(), a.get(Column::Confirmed).unwrap());
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn missing_population_yields_missing() {
        assert_eq!(rescale(10.0, None, NormalizationMode::Per100k), None);
        assert_eq!(rescale(10.0, Some(0.0), NormalizationMode::Per100k), None);
        assert_eq!(rescale(10.0, Some(1e6), NormalizationMode::Per100k), Some(1.0));
        assert_eq!(rescale(1.0, Some(1e6), NormalizationMode::TotalNumbers), Some(10.0));
    }
}
