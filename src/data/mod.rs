//! Input tables produced by the upstream pipeline, and their manifests.
//!
//! The engine consumes four CSV files from one data directory. Parsing is
//! serde-driven; malformed numeric cells become missing values rather than
//! failing the load, since upstream leaves `nan` and blanks in derived columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

pub const TIME_SERIES_FILE: &str = "transformed_data.csv";
pub const FORECASTS_FILE: &str = "forecasts.csv";
pub const GROUPS_FILE: &str = "country_groups.csv";
pub const ACCELERATION_FILE: &str = "acceleration_data.csv";

pub const TIME_SERIES_COLUMNS: [&str; 21] = [
    "country",
    "date",
    "confirmed",
    "deaths",
    "recovered",
    "active_cases",
    "population",
    "new_cases",
    "new_deaths",
    "new_recoveries",
    "acceleration_cases",
    "acceleration_deaths",
    "death_rate",
    "days_since_100",
    "days_since_10",
    "double_3_cases",
    "double_5_cases",
    "double_10_cases",
    "double_3_deaths",
    "double_5_deaths",
    "double_10_deaths",
];

pub const FORECAST_COLUMNS: [&str; 8] = [
    "country",
    "date",
    "metric",
    "point_forecast",
    "lo_80",
    "hi_80",
    "lo_95",
    "hi_95",
];

pub const GROUP_COLUMNS: [&str; 2] = ["group", "country"];

/// One row of `transformed_data.csv`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    pub country: String,
    pub date: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub confirmed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub deaths: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub recovered: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub active_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub population: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_deaths: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_recoveries: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub acceleration_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub acceleration_deaths: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub death_rate: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub days_since_100: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub days_since_10: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_3_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_5_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_10_cases: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_3_deaths: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_5_deaths: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub double_10_deaths: Option<f64>,
}

/// One row of `forecasts.csv`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForecastRow {
    pub country: String,
    pub date: String,
    pub metric: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub point_forecast: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lo_80: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub hi_80: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lo_95: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub hi_95: Option<f64>,
}

/// One membership row of `country_groups.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    pub group: String,
    #[serde(default)]
    pub country: String,
}

/// One row of the upstream all-regions summary, `acceleration_data.csv`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAccelerationRow {
    #[serde(rename = "Country/Region")]
    pub region: String,
    #[serde(rename = "Confirmed Cases", default, deserialize_with = "csv::invalid_option")]
    pub confirmed: Option<f64>,
    #[serde(rename = "Cases 5 Days Ago", default, deserialize_with = "csv::invalid_option")]
    pub cases_5_days_ago: Option<f64>,
    #[serde(rename = "% Increase in 5 Days", default, deserialize_with = "csv::invalid_option")]
    pub pct_increase_5_days: Option<f64>,
    #[serde(
        rename = "Acceleration of Last 5 Days",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub acceleration_5_days: Option<f64>,
    #[serde(rename = "Recovered Cases", default, deserialize_with = "csv::invalid_option")]
    pub recovered: Option<f64>,
    #[serde(rename = "Active Cases", default, deserialize_with = "csv::invalid_option")]
    pub active: Option<f64>,
    #[serde(rename = "Deaths", default, deserialize_with = "csv::invalid_option")]
    pub deaths: Option<f64>,
    #[serde(rename = "Death Rate", default, deserialize_with = "csv::invalid_option")]
    pub death_rate: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub population: Option<f64>,
}

/// Everything read from a data directory, before the store sorts and derives.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub rows: Vec<RawRow>,
    pub forecasts: Vec<RawForecastRow>,
    pub groups: Vec<RawGroup>,
    pub acceleration: Vec<RawAccelerationRow>,
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(value: &str) -> EngineResult<NaiveDate> {
    let trimmed = value.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| EngineError::BadDate {
        value: value.to_string(),
    })
}

fn open_reader(path: &Path) -> EngineResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file))
}

fn require_columns(path: &Path, reader: &mut csv::Reader<File>, required: &[&str]) -> EngineResult<()> {
    let headers = reader.headers().map_err(|source| EngineError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(EngineError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn read_records<T: for<'de> Deserialize<'de>>(path: &Path, required: &[&str]) -> EngineResult<Vec<T>> {
    let mut reader = open_reader(path)?;
    require_columns(path, &mut reader, required)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| EngineError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

pub fn read_time_series(path: &Path) -> EngineResult<Vec<RawRow>> {
    read_records(path, &["country", "date", "confirmed", "deaths", "population"])
}

pub fn read_forecasts(path: &Path) -> EngineResult<Vec<RawForecastRow>> {
    read_records(path, &["country", "date", "metric"])
}

pub fn read_groups(path: &Path) -> EngineResult<Vec<RawGroup>> {
    read_records(path, &["group"])
}

pub fn read_acceleration(path: &Path) -> EngineResult<Vec<RawAccelerationRow>> {
    read_records(path, &["Country/Region"])
}

/// Reads the data directory. The acceleration summary is optional; the other
/// three files are required.
pub fn load_dir(dir: &Path) -> EngineResult<RawInputs> {
    let acceleration_path = dir.join(ACCELERATION_FILE);
    let acceleration = if acceleration_path.exists() {
        read_acceleration(&acceleration_path)?
    } else {
        Vec::new()
    };
    Ok(RawInputs {
        rows: read_time_series(&dir.join(TIME_SERIES_FILE))?,
        forecasts: read_forecasts(&dir.join(FORECASTS_FILE))?,
        groups: read_groups(&dir.join(GROUPS_FILE))?,
        acceleration,
    })
}

// =============================================================================
// Manifests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub bad_rows: u64,
    pub regions: u64,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub ok: bool,
    pub message: String,
}

/// Extra columns are fine; every expected column must be present.
pub fn validate_schema(path: &Path, expected: &[&str]) -> EngineResult<SchemaReport> {
    let columns = read_header(path)?;
    let missing: Vec<String> = expected
        .iter()
        .filter(|e| !columns.iter().any(|c| c == *e))
        .map(|e| e.to_string())
        .collect();
    let ok = missing.is_empty();
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("schema mismatch: missing {:?}", missing)
    };
    Ok(SchemaReport {
        columns,
        expected: expected.iter().map(|s| s.to_string()).collect(),
        missing,
        ok,
        message,
    })
}

pub fn read_header(path: &Path) -> EngineResult<Vec<String>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(|source| EngineError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(headers.iter().map(|h| h.to_string()).collect())
}

/// Scans a table that has `country` and `date` columns: counts rows, regions,
/// the date span, unparseable rows, and duplicate (region, date) keys.
pub fn analyze_csv(path: &Path, expected: &[&str], now_ts: u64) -> EngineResult<DatasetManifest> {
    let schema = validate_schema(path, expected)?;
    let hash = file_sha256(path)?;
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| EngineError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let country_idx = headers
        .iter()
        .position(|h| h == "country" || h == "group" || h == "Country/Region");
    let date_idx = headers.iter().position(|h| h == "date");
    let metric_idx = headers.iter().position(|h| h == "metric");

    let mut row_count = 0u64;
    let mut bad_rows = 0u64;
    let mut warnings = Vec::new();
    let mut regions = HashSet::new();
    let mut keys = HashSet::new();
    let mut date_min: Option<NaiveDate> = None;
    let mut date_max: Option<NaiveDate> = None;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                bad_rows += 1;
                warnings.push(format!("bad_row: {}", err));
                continue;
            }
        };
        row_count += 1;
        let region = country_idx.and_then(|i| record.get(i)).unwrap_or("").to_string();
        if let Some(raw) = date_idx.and_then(|i| record.get(i)) {
            match parse_date(raw) {
                Ok(date) => {
                    date_min = Some(date_min.map(|v| v.min(date)).unwrap_or(date));
                    date_max = Some(date_max.map(|v| v.max(date)).unwrap_or(date));
                    let metric = metric_idx.and_then(|i| record.get(i)).unwrap_or("").to_string();
                    if !keys.insert((region.clone(), date, metric)) {
                        warnings.push(format!("duplicate_key: {} {}", region, date));
                    }
                }
                Err(err) => {
                    bad_rows += 1;
                    warnings.push(format!("bad_row: {}", err));
                }
            }
        }
        regions.insert(region);
    }

    if !schema.ok {
        warnings.push(schema.message.clone());
    }

    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count,
        bad_rows,
        regions: regions.len() as u64,
        date_min,
        date_max,
        columns: schema.columns,
        missing_columns: schema.missing,
        warnings,
        generated_at_epoch: now_ts,
    })
}

pub fn file_sha256(path: &Path) -> EngineResult<String> {
    let io_err = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_timestamps() {
        let d = parse_date("2020-03-15 00:00:00").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2020, 3, 15).unwrap());
        assert!(parse_date("15/03/2020").is_err());
    }

    #[test]
    fn manifest_path_sits_next_to_dataset() {
        let p = default_manifest_path(Path::new("plots/data/forecasts.csv"));
        assert_eq!(p, PathBuf::from("plots/data/forecasts.csv.manifest.json"));
    }
}
