//! Control events, as they arrive on the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::state::{MetricKind, NormalizationMode, XAxisBasis};

/// `{"type":"SetRegion1","region":"Italy"}`,
/// `{"type":"SetDateRange","start":"2020-03-01","end":"2020-04-01"}`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlEvent {
    SetRegion1 { region: String },
    SetRegion2 { region: String },
    SetDateRange { start: NaiveDate, end: NaiveDate },
    SetXAxisBasis { basis: XAxisBasis },
    SetMetric { metric: MetricKind },
    SetNormalizationMode { mode: NormalizationMode },
    SetSmoothingWindow { window: usize },
}

impl ControlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::SetRegion1 { .. } => "set_region1",
            ControlEvent::SetRegion2 { .. } => "set_region2",
            ControlEvent::SetDateRange { .. } => "set_date_range",
            ControlEvent::SetXAxisBasis { .. } => "set_x_axis_basis",
            ControlEvent::SetMetric { .. } => "set_metric",
            ControlEvent::SetNormalizationMode { .. } => "set_normalization_mode",
            ControlEvent::SetSmoothingWindow { .. } => "set_smoothing_window",
        }
    }
}
