//! Dataset store: the single owned table every transform mutates in place.
//!
//! Rows are kept grouped by region and sorted by date. Every numeric cell is
//! an `Option<f64>`; `None` is the missing-value marker and never means zero.

use std::collections::HashMap;
use std::ops::Range;

use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::data::{parse_date, RawForecastRow, RawGroup, RawInputs, RawRow};
use crate::error::{EngineError, EngineResult};
use crate::state::{MetricKind, XAxisBasis};
use crate::transforms::{metric, smoothing, xaxis};

pub const MS_PER_DAY: f64 = 86_400_000.0;
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Milliseconds since the Unix epoch at midnight UTC, the unit the renderer
/// uses for datetime axes.
pub fn epoch_ms(date: NaiveDate) -> f64 {
    (date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE) as f64 * MS_PER_DAY
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// =============================================================================
// Columns
// =============================================================================

/// Every numeric column of a time-series row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Confirmed,
    Deaths,
    Recovered,
    ActiveCases,
    Population,
    NewCases,
    NewDeaths,
    NewRecoveries,
    NewActiveCases,
    AccelerationCases,
    AccelerationDeaths,
    AccelerationRecoveries,
    AccelerationActiveCases,
    DeathRate,
    DaysSince100,
    DaysSince10,
    Double3Cases,
    Double5Cases,
    Double10Cases,
    Double3Deaths,
    Double5Deaths,
    Double10Deaths,
    // working columns
    Metric,
    Metric1stDer,
    Metric2ndDer,
    Smooth1stDer,
    Smooth2ndDer,
    Double3,
    Double5,
    Double10,
    XCol,
}

pub const COLUMN_COUNT: usize = 31;

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Confirmed,
        Column::Deaths,
        Column::Recovered,
        Column::ActiveCases,
        Column::Population,
        Column::NewCases,
        Column::NewDeaths,
        Column::NewRecoveries,
        Column::NewActiveCases,
        Column::AccelerationCases,
        Column::AccelerationDeaths,
        Column::AccelerationRecoveries,
        Column::AccelerationActiveCases,
        Column::DeathRate,
        Column::DaysSince100,
        Column::DaysSince10,
        Column::Double3Cases,
        Column::Double5Cases,
        Column::Double10Cases,
        Column::Double3Deaths,
        Column::Double5Deaths,
        Column::Double10Deaths,
        Column::Metric,
        Column::Metric1stDer,
        Column::Metric2ndDer,
        Column::Smooth1stDer,
        Column::Smooth2ndDer,
        Column::Double3,
        Column::Double5,
        Column::Double10,
        Column::XCol,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Confirmed => "confirmed",
            Column::Deaths => "deaths",
            Column::Recovered => "recovered",
            Column::ActiveCases => "active_cases",
            Column::Population => "population",
            Column::NewCases => "new_cases",
            Column::NewDeaths => "new_deaths",
            Column::NewRecoveries => "new_recoveries",
            Column::NewActiveCases => "new_active_cases",
            Column::AccelerationCases => "acceleration_cases",
            Column::AccelerationDeaths => "acceleration_deaths",
            Column::AccelerationRecoveries => "acceleration_recoveries",
            Column::AccelerationActiveCases => "acceleration_active_cases",
            Column::DeathRate => "death_rate",
            Column::DaysSince100 => "days_since_100",
            Column::DaysSince10 => "days_since_10",
            Column::Double3Cases => "double_3_cases",
            Column::Double5Cases => "double_5_cases",
            Column::Double10Cases => "double_10_cases",
            Column::Double3Deaths => "double_3_deaths",
            Column::Double5Deaths => "double_5_deaths",
            Column::Double10Deaths => "double_10_deaths",
            Column::Metric => "metric",
            Column::Metric1stDer => "metric_1st_der",
            Column::Metric2ndDer => "metric_2nd_der",
            Column::Smooth1stDer => "smooth_1st_der",
            Column::Smooth2ndDer => "smooth_2nd_der",
            Column::Double3 => "double_3",
            Column::Double5 => "double_5",
            Column::Double10 => "double_10",
            Column::XCol => "x_col",
        }
    }

    /// Counts that change meaning under per-100k normalization. Rates,
    /// day counters, population and the x coordinate are excluded.
    pub fn is_scale_sensitive(&self) -> bool {
        !matches!(
            self,
            Column::Population
                | Column::DeathRate
                | Column::DaysSince100
                | Column::DaysSince10
                | Column::XCol
        )
    }

    pub fn scale_sensitive() -> Vec<Column> {
        Column::ALL.into_iter().filter(|c| c.is_scale_sensitive()).collect()
    }

    /// Source counters aliased by the working columns for `kind`:
    /// (cumulative, 1st derivative, 2nd derivative).
    pub fn sources_for(kind: MetricKind) -> (Column, Column, Column) {
        match kind {
            MetricKind::Cases => (Column::Confirmed, Column::NewCases, Column::AccelerationCases),
            MetricKind::Deaths => (Column::Deaths, Column::NewDeaths, Column::AccelerationDeaths),
            MetricKind::ActiveCases => (
                Column::ActiveCases,
                Column::NewActiveCases,
                Column::AccelerationActiveCases,
            ),
            MetricKind::RecoveredCases => (
                Column::Recovered,
                Column::NewRecoveries,
                Column::AccelerationRecoveries,
            ),
        }
    }

    /// Doubling reference sources (3, 5, 10 days) for `kind`, if it has them.
    pub fn doubling_sources_for(kind: MetricKind) -> Option<[Column; 3]> {
        match kind {
            MetricKind::Cases => Some([Column::Double3Cases, Column::Double5Cases, Column::Double10Cases]),
            MetricKind::Deaths => Some([
                Column::Double3Deaths,
                Column::Double5Deaths,
                Column::Double10Deaths,
            ]),
            MetricKind::ActiveCases | MetricKind::RecoveredCases => None,
        }
    }
}

/// Forecast interval columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastColumn {
    PointForecast,
    Lo80,
    Hi80,
    Lo95,
    Hi95,
}

impl ForecastColumn {
    pub const ALL: [ForecastColumn; 5] = [
        ForecastColumn::PointForecast,
        ForecastColumn::Lo80,
        ForecastColumn::Hi80,
        ForecastColumn::Lo95,
        ForecastColumn::Hi95,
    ];
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
    pub region: String,
    pub date: NaiveDate,
    values: [Option<f64>; COLUMN_COUNT],
}

impl TimeSeriesRow {
    pub fn new(region: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            region: region.into(),
            date,
            values: [None; COLUMN_COUNT],
        }
    }

    pub fn get(&self, col: Column) -> Option<f64> {
        self.values[col as usize]
    }

    pub fn set(&mut self, col: Column, value: Option<f64>) {
        self.values[col as usize] = finite(value);
    }

    pub fn with(mut self, col: Column, value: Option<f64>) -> Self {
        self.set(col, value);
        self
    }

    pub fn x(&self) -> Option<f64> {
        self.get(Column::XCol)
    }

    fn from_raw(raw: &RawRow) -> EngineResult<Self> {
        let date = parse_date(&raw.date)?;
        let mut row = Self::new(raw.country.trim(), date);
        let cells = [
            (Column::Confirmed, raw.confirmed),
            (Column::Deaths, raw.deaths),
            (Column::Recovered, raw.recovered),
            (Column::ActiveCases, raw.active_cases),
            (Column::Population, raw.population),
            (Column::NewCases, raw.new_cases),
            (Column::NewDeaths, raw.new_deaths),
            (Column::NewRecoveries, raw.new_recoveries),
            (Column::AccelerationCases, raw.acceleration_cases),
            (Column::AccelerationDeaths, raw.acceleration_deaths),
            (Column::DeathRate, raw.death_rate),
            (Column::DaysSince100, raw.days_since_100),
            (Column::DaysSince10, raw.days_since_10),
            (Column::Double3Cases, raw.double_3_cases),
            (Column::Double5Cases, raw.double_5_cases),
            (Column::Double10Cases, raw.double_10_cases),
            (Column::Double3Deaths, raw.double_3_deaths),
            (Column::Double5Deaths, raw.double_5_deaths),
            (Column::Double10Deaths, raw.double_10_deaths),
        ];
        for (col, value) in cells {
            row.set(col, value);
        }
        // Upstream writes 0 before the threshold is reached.
        for col in [Column::DaysSince100, Column::DaysSince10] {
            if row.get(col) == Some(0.0) {
                row.set(col, None);
            }
        }
        Ok(row)
    }
}

impl Serialize for TimeSeriesRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT + 3))?;
        map.serialize_entry("country", &self.region)?;
        map.serialize_entry("date", &self.date)?;
        map.serialize_entry("date_string", &self.date.format("%Y-%m-%d").to_string())?;
        for col in Column::ALL {
            map.serialize_entry(col.as_str(), &self.get(col))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    #[serde(rename = "country")]
    pub region: String,
    pub date: NaiveDate,
    pub metric: MetricKind,
    pub point_forecast: Option<f64>,
    pub lo_80: Option<f64>,
    pub hi_80: Option<f64>,
    pub lo_95: Option<f64>,
    pub hi_95: Option<f64>,
    /// Joined from the region's time-series rows so the row can be normalized.
    pub population: Option<f64>,
}

impl ForecastRow {
    pub fn get(&self, col: ForecastColumn) -> Option<f64> {
        match col {
            ForecastColumn::PointForecast => self.point_forecast,
            ForecastColumn::Lo80 => self.lo_80,
            ForecastColumn::Hi80 => self.hi_80,
            ForecastColumn::Lo95 => self.lo_95,
            ForecastColumn::Hi95 => self.hi_95,
        }
    }

    pub fn set(&mut self, col: ForecastColumn, value: Option<f64>) {
        let value = finite(value);
        match col {
            ForecastColumn::PointForecast => self.point_forecast = value,
            ForecastColumn::Lo80 => self.lo_80 = value,
            ForecastColumn::Hi80 => self.hi_80 = value,
            ForecastColumn::Lo95 => self.lo_95 = value,
            ForecastColumn::Hi95 => self.hi_95 = value,
        }
    }

    fn from_raw(raw: &RawForecastRow, population: Option<f64>) -> EngineResult<Self> {
        let metric = MetricKind::from_forecast_name(&raw.metric)
            .ok_or_else(|| EngineError::UnknownMetric(raw.metric.clone()))?;
        Ok(Self {
            region: raw.country.trim().to_string(),
            date: parse_date(&raw.date)?,
            metric,
            point_forecast: finite(raw.point_forecast),
            lo_80: finite(raw.lo_80),
            hi_80: finite(raw.hi_80),
            lo_95: finite(raw.lo_95),
            hi_95: finite(raw.hi_95),
            population: finite(population),
        })
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    rows: Vec<TimeSeriesRow>,
    forecasts: Vec<ForecastRow>,
    groups: Vec<String>,
    /// Row span of each region, in sort order.
    spans: Vec<(String, Range<usize>)>,
    index: HashMap<String, usize>,
}

impl DatasetStore {
    /// Parses, sorts by (region, date), derives the active/recovery difference
    /// columns, and aliases the working columns to Cases.
    pub fn load(
        raw_rows: &[RawRow],
        raw_forecasts: &[RawForecastRow],
        raw_groups: &[RawGroup],
    ) -> EngineResult<Self> {
        let rows = raw_rows
            .iter()
            .map(TimeSeriesRow::from_raw)
            .collect::<EngineResult<Vec<_>>>()?;
        let mut store = Self::from_rows(rows)?;

        let population: HashMap<&str, Option<f64>> = store
            .spans
            .iter()
            .map(|(region, span)| {
                let pop = store.rows[span.clone()].iter().rev().find_map(|r| r.get(Column::Population));
                (region.as_str(), pop)
            })
            .collect();
        let mut forecasts = Vec::with_capacity(raw_forecasts.len());
        for raw in raw_forecasts {
            let pop = population.get(raw.country.trim()).copied().flatten();
            forecasts.push(ForecastRow::from_raw(raw, pop)?);
        }
        forecasts.sort_by(|a, b| (&a.region, a.metric as u8, a.date).cmp(&(&b.region, b.metric as u8, b.date)));
        store.forecasts = forecasts;

        let mut groups: Vec<String> = raw_groups.iter().map(|g| g.group.trim().to_string()).collect();
        groups.sort();
        groups.dedup();
        store.groups = groups;
        Ok(store)
    }

    pub fn from_inputs(inputs: &RawInputs) -> EngineResult<Self> {
        Self::load(&inputs.rows, &inputs.forecasts, &inputs.groups)
    }

    /// Builds a store from already-typed rows (upstream columns only need to
    /// be filled; derived and working columns are recomputed).
    pub fn from_rows(mut rows: Vec<TimeSeriesRow>) -> EngineResult<Self> {
        if rows.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        rows.sort_by(|a, b| (&a.region, a.date).cmp(&(&b.region, b.date)));

        let mut store = Self {
            rows,
            ..Self::default()
        };
        store.rebuild_spans();
        store.derive_columns();
        metric::alias_working_columns(&mut store, MetricKind::Cases);
        smoothing::reset(&mut store);
        xaxis::resolve(&mut store, XAxisBasis::Date);
        Ok(store)
    }

    pub fn with_forecasts(mut self, mut forecasts: Vec<ForecastRow>) -> Self {
        forecasts.sort_by(|a, b| (&a.region, a.metric as u8, a.date).cmp(&(&b.region, b.metric as u8, b.date)));
        self.forecasts = forecasts;
        self
    }

    pub fn with_groups(mut self, mut groups: Vec<String>) -> Self {
        groups.sort();
        groups.dedup();
        self.groups = groups;
        self
    }

    fn rebuild_spans(&mut self) {
        self.spans.clear();
        self.index.clear();
        let mut start = 0;
        for i in 1..=self.rows.len() {
            if i == self.rows.len() || self.rows[i].region != self.rows[start].region {
                self.index.insert(self.rows[start].region.clone(), self.spans.len());
                self.spans.push((self.rows[start].region.clone(), start..i));
                start = i;
            }
        }
    }

    fn derive_columns(&mut self) {
        for idx in 0..self.spans.len() {
            let span = self.spans[idx].1.clone();
            let mut prev_new_active: Option<f64> = None;
            let mut prev_new_recoveries: Option<f64> = None;
            for (offset, row) in self.rows[span].iter_mut().enumerate() {
                let new_active = match (
                    row.get(Column::NewCases),
                    row.get(Column::NewDeaths),
                    row.get(Column::NewRecoveries),
                ) {
                    (Some(c), Some(d), Some(r)) => Some(c - d - r),
                    _ => None,
                };
                row.set(Column::NewActiveCases, new_active);
                let new_recoveries = row.get(Column::NewRecoveries);
                if offset > 0 {
                    row.set(Column::AccelerationActiveCases, diff(new_active, prev_new_active));
                    row.set(Column::AccelerationRecoveries, diff(new_recoveries, prev_new_recoveries));
                }
                prev_new_active = new_active;
                prev_new_recoveries = new_recoveries;
            }
        }
    }

    pub fn rows(&self) -> &[TimeSeriesRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [TimeSeriesRow] {
        &mut self.rows
    }

    pub fn forecast_rows(&self) -> &[ForecastRow] {
        &self.forecasts
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Regions in sort order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|(r, _)| r.as_str())
    }

    /// Region groups as (region, row span), in sort order.
    pub fn region_spans(&self) -> &[(String, Range<usize>)] {
        &self.spans
    }

    pub fn region_rows(&self, region: &str) -> &[TimeSeriesRow] {
        match self.index.get(region) {
            Some(&i) => &self.rows[self.spans[i].1.clone()],
            None => &[],
        }
    }

    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.date).min()?;
        let max = self.rows.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// Rewrites the named columns of every row. `f` receives the current value
    /// and the row's population; missing values are left missing.
    pub fn apply_column_transform<F>(&mut self, columns: &[Column], f: F)
    where
        F: Fn(f64, Option<f64>) -> Option<f64>,
    {
        for row in &mut self.rows {
            let population = row.get(Column::Population);
            for &col in columns {
                if let Some(v) = row.get(col) {
                    row.set(col, f(v, population));
                }
            }
        }
    }

    /// Forecast counterpart of [`apply_column_transform`](Self::apply_column_transform).
    pub fn apply_forecast_transform<F>(&mut self, columns: &[ForecastColumn], f: F)
    where
        F: Fn(f64, Option<f64>) -> Option<f64>,
    {
        for row in &mut self.forecasts {
            let population = row.population;
            for &col in columns {
                if let Some(v) = row.get(col) {
                    row.set(col, f(v, population));
                }
            }
        }
    }

    /// Per-region mutable access for transforms that must not cross region
    /// boundaries.
    pub(crate) fn for_each_region_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut [TimeSeriesRow]),
    {
        for (_, span) in &self.spans {
            f(&mut self.rows[span.clone()]);
        }
    }
}

fn diff(current: Option<f64>, prev: Option<f64>) -> Option<f64> {
    Some(current? - prev?)
}
