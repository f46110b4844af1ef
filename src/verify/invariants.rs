use crate::dataset::{Column, DatasetStore};
use crate::engine::Dashboard;
use crate::filter::{SeriesView, HALF_DAY_MS};
use crate::state::{FilterState, RegionSlot, NO_REGION};

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub msg: String,
}

fn violation(msg: impl Into<String>) -> InvariantViolation {
    InvariantViolation { msg: msg.into() }
}

/// Every row belongs to the selected region, lies in the date window, has
/// an x, and rows are in date order. "None" always yields an empty view.
pub fn assert_series_view(view: &SeriesView, filter: &FilterState, slot: RegionSlot) -> Result<(), InvariantViolation> {
    let region = filter.region(slot);
    if region == NO_REGION && !view.is_empty() {
        return Err(violation("view for None is not empty"));
    }
    for row in &view.rows {
        if row.region != region {
            return Err(violation(format!("row region {} != selected {}", row.region, region)));
        }
        if !filter.date_range.contains(row.date) {
            return Err(violation(format!("row date {} outside window", row.date)));
        }
        if row.x().is_none() {
            return Err(violation("row without x in view"));
        }
    }
    if view.rows.windows(2).any(|w| w[0].date >= w[1].date) {
        return Err(violation("view rows not in date order"));
    }
    Ok(())
}

/// Bar copies differ from line copies only by the secondary stagger.
pub fn assert_bar_stagger(line: &SeriesView, bar: &SeriesView, filter: &FilterState, slot: RegionSlot) -> Result<(), InvariantViolation> {
    let expect_shift = slot == RegionSlot::Secondary && filter.x_axis_basis.is_calendar_date();
    if bar.staggered != expect_shift {
        return Err(violation("stagger flag disagrees with slot and basis"));
    }
    if line.len() != bar.len() {
        return Err(violation("bar view and line view differ in length"));
    }
    let shift = if expect_shift { HALF_DAY_MS } else { 0.0 };
    for (l, b) in line.xs().iter().zip(bar.xs()) {
        if b - l != shift {
            return Err(violation(format!("bar x {} not line x {} shifted by {}", b, l, shift)));
        }
    }
    Ok(())
}

pub fn assert_bar_width(width: f64) -> Result<(), InvariantViolation> {
    if !width.is_finite() || width <= 0.0 {
        return Err(violation(format!("bar width {} not strictly positive", width)));
    }
    Ok(())
}

/// First `window - 1` smoothed rows of each region are missing; after that
/// each value is the trailing mean of the working derivative.
pub fn assert_smoothing(store: &DatasetStore, window: usize) -> Result<(), InvariantViolation> {
    for (region, span) in store.region_spans() {
        let rows = &store.rows()[span.clone()];
        for (raw, smooth) in [
            (Column::Metric1stDer, Column::Smooth1stDer),
            (Column::Metric2ndDer, Column::Smooth2ndDer),
        ] {
            for (i, row) in rows.iter().enumerate() {
                let expected = if window == 0 {
                    row.get(raw)
                } else if i + 1 < window {
                    None
                } else {
                    rows[i + 1 - window..=i]
                        .iter()
                        .map(|r| r.get(raw))
                        .sum::<Option<f64>>()
                        .map(|s| s / window as f64)
                };
                let got = row.get(smooth);
                let ok = match (expected, got) {
                    (None, None) => true,
                    (Some(e), Some(g)) => (e - g).abs() <= 1e-9 * e.abs().max(1.0),
                    _ => false,
                };
                if !ok {
                    return Err(violation(format!(
                        "{} row {}: {} = {:?}, expected {:?}",
                        region,
                        i,
                        smooth.as_str(),
                        got,
                        expected
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Checks the published snapshot against the engine's own filter state.
pub fn assert_dashboard(dash: &Dashboard) -> Result<(), InvariantViolation> {
    let snap = dash.current_snapshot();
    let filter = dash.filter();
    if &snap.filter != filter {
        return Err(violation("published filter differs from engine filter"));
    }
    if snap.state_hash != filter.hash() {
        return Err(violation("state hash stale"));
    }
    for slot in [RegionSlot::Primary, RegionSlot::Secondary] {
        assert_series_view(dash.current_series_view(slot), filter, slot)?;
        assert_bar_stagger(dash.current_series_view(slot), dash.current_bar_view(slot), filter, slot)?;
        let forecasts = dash.current_forecast_view(slot);
        if forecasts
            .rows
            .iter()
            .any(|f| f.region != filter.region(slot) || f.metric != filter.metric || f.date < filter.date_range.start)
        {
            return Err(violation("forecast row outside region, metric or start"));
        }
    }
    assert_bar_width(snap.bar_width)?;
    assert_smoothing(dash.store(), filter.smoothing_window)
}
