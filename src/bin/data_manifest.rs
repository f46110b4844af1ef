use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use covidboard::data::{
    analyze_csv, default_manifest_path, validate_schema, ACCELERATION_FILE, FORECASTS_FILE, FORECAST_COLUMNS,
    GROUPS_FILE, GROUP_COLUMNS, TIME_SERIES_COLUMNS, TIME_SERIES_FILE,
};
use covidboard::logging::{self, json_log, obj, v_str};
use covidboard::state::Config;
use serde_json::json;

/// Writes `<file>.manifest.json` next to every input table in the data
/// directory (first argument, or `DATA_DIR`).
fn main() -> Result<()> {
    let result = run();
    logging::flush();
    result
}

fn run() -> Result<()> {
    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(Config::from_env().data_dir));

    let now_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let tables: [(&str, &[&str]); 4] = [
        (TIME_SERIES_FILE, &TIME_SERIES_COLUMNS),
        (FORECASTS_FILE, &FORECAST_COLUMNS),
        (GROUPS_FILE, &GROUP_COLUMNS),
        (ACCELERATION_FILE, &["Country/Region"]),
    ];

    let mut mismatches = 0;
    for (name, expected) in tables {
        let path = dir.join(name);
        if !path.exists() {
            if name != ACCELERATION_FILE {
                eprintln!("missing input {}", path.display());
                mismatches += 1;
            }
            continue;
        }
        if !write_manifest(&path, expected, now_ts)? {
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        bail!("{} input table(s) missing or with schema mismatches", mismatches);
    }
    Ok(())
}

fn write_manifest(path: &Path, expected: &[&str], now_ts: u64) -> Result<bool> {
    let schema = validate_schema(path, expected)?;
    if !schema.ok {
        eprintln!("{}: {}", path.display(), schema.message);
    }
    let manifest = analyze_csv(path, expected, now_ts)?;
    let out_path = default_manifest_path(path);
    fs::write(&out_path, serde_json::to_string_pretty(&json!({ "manifest": manifest }))?)?;
    json_log(
        "data_manifest",
        obj(&[
            ("path", v_str(&out_path.display().to_string())),
            ("rows", json!(manifest.row_count)),
            ("regions", json!(manifest.regions)),
            ("warnings", json!(manifest.warnings.len())),
        ]),
    );
    println!("wrote manifest {}", out_path.display());
    Ok(schema.ok)
}
