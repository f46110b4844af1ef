//! Region and forecast filters, and the shared bar width.
//!
//! Views are fresh copies of store rows. Nothing here mutates the store, so
//! display adjustments such as the bar stagger stay out of the dataset.

use chrono::NaiveDate;
use serde::Serialize;

use crate::dataset::{Column, DatasetStore, ForecastRow, TimeSeriesRow, MS_PER_DAY};
use crate::state::{DateRange, MetricKind, RegionSlot, XAxisBasis, NO_REGION};

pub const HALF_DAY_MS: f64 = MS_PER_DAY / 2.0;

/// What a series view is drawn as. Only bars of the secondary region are
/// staggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesView {
    pub region: String,
    pub basis: XAxisBasis,
    /// True when every x was shifted forward half a day for bar display.
    pub staggered: bool,
    pub rows: Vec<TimeSeriesRow>,
}

impl SeriesView {
    pub fn empty(region: &str, basis: XAxisBasis) -> Self {
        Self {
            region: region.to_string(),
            basis,
            staggered: false,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.x()).collect()
    }

    pub fn values(&self, col: Column) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(col)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastView {
    pub region: String,
    pub metric: MetricKind,
    pub rows: Vec<ForecastRow>,
}

impl ForecastView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows of `region` with date inside `range`, in date order. Rows whose x
/// under the current basis is missing are left out. Aggregate groups are
/// plain regions here; upstream already summed them.
pub fn filter_region(
    store: &DatasetStore,
    region: &str,
    range: DateRange,
    basis: XAxisBasis,
    slot: RegionSlot,
    chart: ChartKind,
) -> SeriesView {
    if region == NO_REGION {
        return SeriesView::empty(region, basis);
    }
    let stagger = chart == ChartKind::Bar && slot == RegionSlot::Secondary && basis.is_calendar_date();
    let rows = store
        .region_rows(region)
        .iter()
        .filter(|r| range.contains(r.date) && r.x().is_some())
        .map(|r| {
            let mut row = r.clone();
            if stagger {
                row.set(Column::XCol, r.x().map(|x| x + HALF_DAY_MS));
            }
            row
        })
        .collect();
    SeriesView {
        region: region.to_string(),
        basis,
        staggered: stagger,
        rows,
    }
}

/// Forecast rows for `region` and `metric` from `start` on. There is no upper
/// bound: forecasts end at the model horizon.
pub fn filter_forecasts(store: &DatasetStore, region: &str, metric: MetricKind, start: NaiveDate) -> ForecastView {
    let rows = if region == NO_REGION {
        Vec::new()
    } else {
        store
            .forecast_rows()
            .iter()
            .filter(|f| f.region == region && f.metric == metric && f.date >= start)
            .cloned()
            .collect()
    };
    ForecastView {
        region: region.to_string(),
        metric,
        rows,
    }
}

/// One width for every bar chart: `span_units` x units (days in
/// milliseconds on a date axis) shared by the denser view's bars.
pub fn compute_width(view1: &SeriesView, view2: &SeriesView, basis_is_date: bool, span_units: f64) -> f64 {
    let n = view1.len().max(view2.len()).max(1) as f64;
    let span = if basis_is_date { span_units * MS_PER_DAY } else { span_units };
    span / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{day, region_rows};
    use crate::dataset::{epoch_ms, ForecastRow};
    use crate::transforms::xaxis;

    fn store() -> DatasetStore {
        let mut rows = region_rows("Italy", &[20.0, 80.0, 150.0, 400.0, 900.0], 6e7);
        rows.extend(region_rows("Spain", &[10.0, 120.0, 300.0], 4.6e7));
        let forecasts = ["Italy", "Spain"]
            .iter()
            .flat_map(|region| {
                (3..8).map(move |d| ForecastRow {
                    region: region.to_string(),
                    date: day(d),
                    metric: if d % 2 == 0 { MetricKind::Cases } else { MetricKind::Deaths },
                    point_forecast: Some(d as f64),
                    lo_80: None,
                    hi_80: None,
                    lo_95: None,
                    hi_95: None,
                    population: None,
                })
            })
            .collect();
        DatasetStore::from_rows(rows).unwrap().with_forecasts(forecasts)
    }

    #[test]
    fn view_respects_region_and_inclusive_range() {
        let store = store();
        let range = DateRange::new(day(1), day(3));
        let v = filter_region(&store, "Italy", range, XAxisBasis::Date, RegionSlot::Primary, ChartKind::Line);
        assert_eq!(v.len(), 3);
        assert!(v.rows.iter().all(|r| r.region == "Italy" && range.contains(r.date)));
        assert!(v.rows.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn none_and_unknown_regions_are_empty() {
        let store = store();
        let range = DateRange::new(day(0), day(10));
        assert!(filter_region(&store, NO_REGION, range, XAxisBasis::Date, RegionSlot::Secondary, ChartKind::Line).is_empty());
        assert!(filter_region(&store, "Europe", range, XAxisBasis::Date, RegionSlot::Primary, ChartKind::Line).is_empty());
        assert!(filter_forecasts(&store, NO_REGION, MetricKind::Cases, day(0)).is_empty());
    }

    #[test]
    fn secondary_bars_are_staggered_on_date_axis_only() {
        let mut store = store();
        let range = DateRange::new(day(0), day(10));
        let line = filter_region(&store, "Spain", range, XAxisBasis::Date, RegionSlot::Secondary, ChartKind::Line);
        let bar = filter_region(&store, "Spain", range, XAxisBasis::Date, RegionSlot::Secondary, ChartKind::Bar);
        let primary = filter_region(&store, "Spain", range, XAxisBasis::Date, RegionSlot::Primary, ChartKind::Bar);
        assert!(bar.staggered && !line.staggered && !primary.staggered);
        for (l, b) in line.rows.iter().zip(&bar.rows) {
            assert_eq!(b.x().unwrap() - l.x().unwrap(), HALF_DAY_MS);
        }
        assert_eq!(primary.xs(), line.xs());
        // the store is untouched
        assert!(store.rows().iter().all(|r| r.x() == Some(epoch_ms(r.date))));

        xaxis::resolve(&mut store, XAxisBasis::DaysSince100thCase);
        let bar = filter_region(&store, "Spain", range, XAxisBasis::DaysSince100thCase, RegionSlot::Secondary, ChartKind::Bar);
        assert!(!bar.staggered);
        assert_eq!(bar.xs(), vec![1.0, 2.0]);
    }

    #[test]
    fn forecasts_match_metric_and_start_without_upper_bound() {
        let store = store();
        let v = filter_forecasts(&store, "Italy", MetricKind::Cases, day(4));
        let dates: Vec<_> = v.rows.iter().map(|f| f.date).collect();
        assert_eq!(dates, vec![day(4), day(6)]);
        assert!(v.rows.iter().all(|f| f.region == "Italy" && f.metric == MetricKind::Cases));
    }

    #[test]
    fn bar_width_shrinks_with_denser_view() {
        let store = store();
        let range = DateRange::new(day(0), day(10));
        let italy = filter_region(&store, "Italy", range, XAxisBasis::Date, RegionSlot::Primary, ChartKind::Bar);
        let spain = filter_region(&store, "Spain", range, XAxisBasis::Date, RegionSlot::Secondary, ChartKind::Bar);
        let none = SeriesView::empty(NO_REGION, XAxisBasis::Date);

        let w_both = compute_width(&italy, &spain, true, 10.0);
        assert_eq!(w_both, 10.0 * MS_PER_DAY / 5.0);
        assert_eq!(compute_width(&spain, &italy, true, 10.0), w_both);
        assert!(compute_width(&spain, &none, true, 10.0) > w_both);
        assert_eq!(compute_width(&italy, &none, false, 10.0), 2.0);
        assert!(compute_width(&none, &none, false, 10.0) > 0.0);
    }
}
