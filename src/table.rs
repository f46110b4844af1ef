//! Summary tables: the two-region overview and the all-regions acceleration
//! table.

use serde::Serialize;

use crate::data::RawAccelerationRow;
use crate::dataset::{Column, DatasetStore, TimeSeriesRow};
use crate::state::{NormalizationMode, NO_REGION};
use crate::transforms::normalize::rescale;

pub const OVERVIEW_ROW_NAMES: [&str; 9] = [
    "Country/Region",
    "Data as of",
    "Confirmed Cases",
    "Recovered Cases",
    "Active Cases",
    "Deaths",
    "Death Rate",
    "New Cases Yesterday",
    "Deaths Yesterday",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewRow {
    pub name: String,
    pub region1: String,
    pub region2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewTable {
    pub rows: Vec<OverviewRow>,
}

impl OverviewTable {
    pub fn region1_column(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.region1.as_str()).collect()
    }

    pub fn region2_column(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.region2.as_str()).collect()
    }
}

/// Builds the overview from the store as it currently stands (already
/// normalized), over each region's full history.
pub fn build_overview(store: &DatasetStore, region1: &str, region2: &str) -> OverviewTable {
    let c1 = region_summary(store, region1);
    let c2 = region_summary(store, region2);
    let rows = OVERVIEW_ROW_NAMES
        .iter()
        .zip(c1)
        .zip(c2)
        .map(|((name, region1), region2)| OverviewRow {
            name: name.to_string(),
            region1,
            region2,
        })
        .collect();
    OverviewTable { rows }
}

/// One overview column; blank strings when the region has no rows.
fn region_summary(store: &DatasetStore, region: &str) -> Vec<String> {
    let rows = if region == NO_REGION { &[][..] } else { store.region_rows(region) };
    let Some(last) = rows.last() else {
        return vec![String::new(); OVERVIEW_ROW_NAMES.len()];
    };
    vec![
        region.to_string(),
        last.date.format("%Y-%m-%d").to_string(),
        format_count(column_max(rows, Column::Confirmed)),
        format_count(column_max(rows, Column::Recovered)),
        format_count(last.get(Column::ActiveCases)),
        format_count(column_max(rows, Column::Deaths)),
        last.get(Column::DeathRate)
            .map(|r| format!("{:.2}%", r * 100.0))
            .unwrap_or_default(),
        format_count(last.get(Column::NewCases)),
        format_count(last.get(Column::NewDeaths)),
    ]
}

fn column_max(rows: &[TimeSeriesRow], col: Column) -> Option<f64> {
    rows.iter().filter_map(|r| r.get(col)).reduce(f64::max)
}

/// Whole number with thousands separators; missing renders blank.
pub fn format_count(value: Option<f64>) -> String {
    value.map(|v| format_thousands(v, 0)).unwrap_or_default()
}

pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
    if value < 0.0 {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

// =============================================================================
// Acceleration overview
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccelerationRow {
    #[serde(rename = "Country/Region")]
    pub region: String,
    #[serde(rename = "Confirmed Cases")]
    pub confirmed: Option<f64>,
    #[serde(rename = "Cases 5 Days Ago")]
    pub cases_5_days_ago: Option<f64>,
    #[serde(rename = "% Increase in 5 Days")]
    pub pct_increase_5_days: Option<f64>,
    #[serde(rename = "Acceleration of Last 5 Days")]
    pub acceleration_5_days: Option<f64>,
    #[serde(rename = "Recovered Cases")]
    pub recovered: Option<f64>,
    #[serde(rename = "Active Cases")]
    pub active: Option<f64>,
    #[serde(rename = "Deaths")]
    pub deaths: Option<f64>,
    #[serde(rename = "Death Rate")]
    pub death_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccelerationTable {
    pub rows: Vec<AccelerationRow>,
}

/// Always derived from the upstream rows, so switching modes back and forth
/// never compounds. Per100k rescales the count columns and rounds them;
/// ratios are left alone. Population comes from the row itself or, failing
/// that, the region's latest time-series row.
pub fn build_acceleration(
    raw: &[RawAccelerationRow],
    store: &DatasetStore,
    mode: NormalizationMode,
    decimals: usize,
) -> AccelerationTable {
    let rows = raw
        .iter()
        .map(|r| {
            let population = r.population.or_else(|| {
                store
                    .region_rows(r.region.trim())
                    .iter()
                    .rev()
                    .find_map(|row| row.get(Column::Population))
            });
            let scale = |v: Option<f64>| match mode {
                NormalizationMode::TotalNumbers => v,
                NormalizationMode::Per100k => v
                    .and_then(|v| rescale(v, population, NormalizationMode::Per100k))
                    .map(|v| round_to(v, decimals)),
            };
            AccelerationRow {
                region: r.region.trim().to_string(),
                confirmed: scale(r.confirmed),
                cases_5_days_ago: scale(r.cases_5_days_ago),
                pct_increase_5_days: r.pct_increase_5_days,
                acceleration_5_days: r.acceleration_5_days,
                recovered: scale(r.recovered),
                active: scale(r.active),
                deaths: scale(r.deaths),
                death_rate: r.death_rate,
            }
        })
        .collect();
    AccelerationTable { rows }
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::region_rows;

    fn store() -> DatasetStore {
        let mut rows = region_rows("World", &[1000.0, 2500.0, 1_234_567.0], 7.8e9);
        rows.extend(region_rows("Malta", &[5.0, 9.0], 514_564.0));
        DatasetStore::from_rows(rows).unwrap()
    }

    #[test]
    fn overview_for_one_region_leaves_second_blank() {
        let t = build_overview(&store(), "World", NO_REGION);
        let c1 = t.region1_column();
        assert_eq!(c1[0], "World");
        assert_eq!(c1[1], "2020-03-03");
        assert_eq!(c1[2], "1,234,567");
        assert!(c1[6].ends_with('%'));
        assert!(t.region2_column().iter().all(|v| v.is_empty()));
        assert_eq!(t.rows.len(), OVERVIEW_ROW_NAMES.len());
    }

    #[test]
    fn overview_uses_latest_and_max_values() {
        let t = build_overview(&store(), "Malta", "World");
        let c1 = t.region1_column();
        // Malta: confirmed 5 then 9; new cases yesterday = 4
        assert_eq!(c1[2], "9");
        assert_eq!(c1[7], "4");
        assert_eq!(t.region2_column()[0], "World");
    }

    #[test]
    fn unknown_region_column_is_blank() {
        let t = build_overview(&store(), "Atlantis", "World");
        assert!(t.region1_column().iter().all(|v| v.is_empty()));
    }

    #[test]
    fn thousands_formatting() {
        assert_eq!(format_thousands(0.0, 0), "0");
        assert_eq!(format_thousands(999.0, 0), "999");
        assert_eq!(format_thousands(1000.0, 0), "1,000");
        assert_eq!(format_thousands(1_234_567.89, 2), "1,234,567.89");
        assert_eq!(format_thousands(-12_345.0, 0), "-12,345");
        assert_eq!(format_count(None), "");
    }

    #[test]
    fn acceleration_table_rescales_counts_only_in_per100k() {
        let raw = vec![RawAccelerationRow {
            region: "Malta".into(),
            confirmed: Some(1000.0),
            cases_5_days_ago: Some(500.0),
            pct_increase_5_days: Some(100.0),
            acceleration_5_days: Some(0.01),
            deaths: Some(3.0),
            death_rate: Some(0.3),
            ..RawAccelerationRow::default()
        }];
        let store = store();
        let total = build_acceleration(&raw, &store, NormalizationMode::TotalNumbers, 2);
        assert_eq!(total.rows[0].confirmed, Some(1000.0));

        let per = build_acceleration(&raw, &store, NormalizationMode::Per100k, 2);
        let row = &per.rows[0];
        assert_eq!(row.confirmed, Some(194.34));
        assert_eq!(row.deaths, Some(0.58));
        assert_eq!(row.pct_increase_5_days, Some(100.0));
        assert_eq!(row.death_rate, Some(0.3));
        assert_eq!(row.recovered, None);

        let again = build_acceleration(&raw, &store, NormalizationMode::Per100k, 2);
        assert_eq!(again, per);
    }
}
