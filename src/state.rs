//! Session configuration and the filter state every cascade is computed from.

use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const WORLD: &str = "World";
pub const NO_REGION: &str = "None";
pub const CATALOG_SEPARATOR: &str = "---";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub default_region1: String,
    pub default_region2: String,
    /// Smoothing windows offered to the viewer; the engine accepts any value.
    pub smoothing_options: Vec<usize>,
    /// Bars are sized so this many x units hold every bar of the denser view.
    pub bar_span_units: f64,
    pub overview_round_decimals: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "plots/data".to_string(),
            default_region1: WORLD.to_string(),
            default_region2: NO_REGION.to_string(),
            smoothing_options: vec![0, 3, 5, 7, 9],
            bar_span_units: 10.0,
            overview_round_decimals: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR").unwrap_or(d.data_dir),
            default_region1: std::env::var("DEFAULT_REGION1").unwrap_or(d.default_region1),
            default_region2: std::env::var("DEFAULT_REGION2").unwrap_or(d.default_region2),
            smoothing_options: std::env::var("SMOOTHING_OPTIONS")
                .ok()
                .map(|v| v.split(',').filter_map(|s| s.trim().parse().ok()).collect::<Vec<_>>())
                .filter(|opts| !opts.is_empty())
                .unwrap_or(d.smoothing_options),
            bar_span_units: std::env::var("BAR_SPAN_UNITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| *v > 0.0)
                .unwrap_or(d.bar_span_units),
            overview_round_decimals: std::env::var("OVERVIEW_ROUND_DECIMALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.overview_round_decimals),
        }
    }
}

/// Which concept the working columns alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Cases,
    Deaths,
    ActiveCases,
    RecoveredCases,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cases,
        MetricKind::Deaths,
        MetricKind::ActiveCases,
        MetricKind::RecoveredCases,
    ];

    /// Label used in chart titles and the control surface.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Cases => "Cases",
            MetricKind::Deaths => "Deaths",
            MetricKind::ActiveCases => "Active Cases",
            MetricKind::RecoveredCases => "Recovered Cases",
        }
    }

    /// Value of the `metric` column in the forecast table.
    pub fn forecast_name(&self) -> &'static str {
        match self {
            MetricKind::Cases => "cases",
            MetricKind::Deaths => "deaths",
            MetricKind::ActiveCases => "active_cases",
            MetricKind::RecoveredCases => "recovered",
        }
    }

    pub fn from_forecast_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.forecast_name() == name.trim())
    }

    /// Doubling reference curves exist only for cases and deaths.
    pub fn has_doubling_curves(&self) -> bool {
        matches!(self, MetricKind::Cases | MetricKind::Deaths)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XAxisBasis {
    Date,
    DaysSince100thCase,
    DaysSince10thDeath,
}

impl XAxisBasis {
    pub fn is_calendar_date(&self) -> bool {
        matches!(self, XAxisBasis::Date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormalizationMode {
    TotalNumbers,
    Per100k,
}

impl NormalizationMode {
    pub fn title_suffix(&self) -> &'static str {
        match self {
            NormalizationMode::TotalNumbers => "",
            NormalizationMode::Per100k => " (per 100k population)",
        }
    }
}

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// An inverted window collapses to the single day `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionSlot {
    Primary,
    Secondary,
}

impl RegionSlot {
    pub fn index(&self) -> usize {
        match self {
            RegionSlot::Primary => 0,
            RegionSlot::Secondary => 1,
        }
    }
}

/// The single source of truth for the current view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    pub region1: String,
    pub region2: String,
    pub date_range: DateRange,
    pub x_axis_basis: XAxisBasis,
    pub metric: MetricKind,
    pub normalization_mode: NormalizationMode,
    pub smoothing_window: usize,
}

impl FilterState {
    pub fn initial(cfg: &Config, date_range: DateRange) -> Self {
        Self {
            region1: cfg.default_region1.clone(),
            region2: cfg.default_region2.clone(),
            date_range,
            x_axis_basis: XAxisBasis::Date,
            metric: MetricKind::Cases,
            normalization_mode: NormalizationMode::TotalNumbers,
            smoothing_window: 0,
        }
    }

    pub fn region(&self, slot: RegionSlot) -> &str {
        match slot {
            RegionSlot::Primary => &self.region1,
            RegionSlot::Secondary => &self.region2,
        }
    }

    /// Deterministic fingerprint carried by every published snapshot.
    pub fn hash(&self) -> u64 {
        let mut h = std::collections::hash_map::DefaultHasher::new();
        Hash::hash(self, &mut h);
        h.finish()
    }
}
