//! Chart titles and axis hints that follow the metric and normalization
//! selections.

use serde::Serialize;

use crate::state::{MetricKind, NormalizationMode, XAxisBasis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisFormat {
    /// Day-month labels on a datetime axis.
    Datetime,
    /// Plain integer day counts.
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartTitles {
    pub cumulative: String,
    pub new_daily: String,
    pub acceleration: String,
    pub forecast_linear: String,
    pub forecast_log: String,
    /// Doubling reference lines are drawn on the log chart only for cases
    /// and deaths.
    pub show_doubling_curves: bool,
    pub x_axis_format: AxisFormat,
}

impl ChartTitles {
    pub fn new(metric: MetricKind, mode: NormalizationMode, basis: XAxisBasis) -> Self {
        let m = metric.label();
        let suffix = mode.title_suffix();
        Self {
            cumulative: format!("Cumulative {}{}", m, suffix),
            new_daily: format!("New Daily {}{}", m, suffix),
            acceleration: format!("{} Acceleration{}", m, suffix),
            forecast_linear: format!("Forecast {} (linear scale){}", m, suffix),
            forecast_log: format!("Forecast {} (log scale){}", m, suffix),
            show_doubling_curves: metric.has_doubling_curves(),
            x_axis_format: if basis.is_calendar_date() {
                AxisFormat::Datetime
            } else {
                AxisFormat::Count
            },
        }
    }
}
