use std::env;

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};

use covidboard::dataset::{Column, DatasetStore, ForecastRow, TimeSeriesRow};
use covidboard::engine::{ControlEvent, Dashboard};
use covidboard::logging::{self, json_log, obj};
use covidboard::state::{Config, MetricKind, NormalizationMode, XAxisBasis, NO_REGION, WORLD};
use covidboard::verify::invariants::assert_dashboard;
use serde_json::json;

const REGIONS: [(&str, f64); 5] = [
    (WORLD, 7.8e9),
    ("Europe", 7.4e8),
    ("Italy", 6.0e7),
    ("Chile", 1.9e7),
    ("Iceland", 3.6e5),
];

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 22).unwrap_or_default()
}

fn generate_rows(rng: &mut StdRng, days: usize) -> Vec<TimeSeriesRow> {
    let mut rows = Vec::with_capacity(REGIONS.len() * days);
    for (region, population) in REGIONS {
        let growth = rng.gen_range(0.02..0.25);
        let mut confirmed: f64 = rng.gen_range(1.0..20.0_f64).floor();
        let (mut deaths, mut recovered) = (0.0_f64, 0.0_f64);
        let (mut prev_new, mut prev_new_deaths) = (None::<f64>, None::<f64>);
        let (mut since_100, mut since_10) = (None::<f64>, None::<f64>);
        for i in 0..days {
            let new = if i == 0 { 0.0 } else { (confirmed * growth * rng.gen_range(0.5..1.5)).floor() };
            let new_deaths = (new * rng.gen_range(0.0..0.08)).floor();
            let new_recoveries = (new * rng.gen_range(0.0..0.6)).floor();
            confirmed += new;
            deaths += new_deaths;
            recovered += new_recoveries;
            if confirmed >= 100.0 {
                since_100 = Some(since_100.map_or(0.0, |d| d + 1.0));
            }
            if deaths >= 10.0 {
                since_10 = Some(since_10.map_or(0.0, |d| d + 1.0));
            }
            // Some days are unreported.
            let reported = rng.gen_bool(0.97);
            let row = TimeSeriesRow::new(region, start_date() + Duration::days(i as i64))
                .with(Column::Confirmed, Some(confirmed))
                .with(Column::Deaths, Some(deaths))
                .with(Column::Recovered, Some(recovered))
                .with(Column::ActiveCases, Some(confirmed - deaths - recovered))
                .with(Column::Population, Some(population))
                .with(Column::NewCases, reported.then_some(new))
                .with(Column::NewDeaths, Some(new_deaths))
                .with(Column::NewRecoveries, Some(new_recoveries))
                .with(Column::AccelerationCases, prev_new.map(|p| new - p))
                .with(Column::AccelerationDeaths, prev_new_deaths.map(|p| new_deaths - p))
                .with(Column::DeathRate, (confirmed > 0.0).then(|| deaths / confirmed))
                .with(Column::DaysSince100, since_100)
                .with(Column::DaysSince10, since_10);
            prev_new = Some(new);
            prev_new_deaths = Some(new_deaths);
            rows.push(row);
        }
    }
    rows
}

fn generate_forecasts(rng: &mut StdRng, days: usize) -> Vec<ForecastRow> {
    let mut out = Vec::new();
    for (region, population) in REGIONS {
        for metric in MetricKind::ALL {
            let mut level = rng.gen_range(1e3..1e6);
            for i in 0..14 {
                level *= 1.0 + rng.gen_range(0.0..0.05);
                out.push(ForecastRow {
                    region: region.to_string(),
                    date: start_date() + Duration::days((days + i) as i64),
                    metric,
                    point_forecast: Some(level),
                    lo_80: Some(level * 0.9),
                    hi_80: Some(level * 1.1),
                    lo_95: Some(level * 0.8),
                    hi_95: Some(level * 1.2),
                    population: Some(population),
                });
            }
        }
    }
    out
}

fn random_event(rng: &mut StdRng, days: usize) -> ControlEvent {
    match rng.gen_range(0..7) {
        0 | 1 => {
            let region = match rng.gen_range(0..8) {
                0 => NO_REGION.to_string(),
                1 => "---".to_string(),
                2 => "Atlantis".to_string(),
                _ => REGIONS[rng.gen_range(0..REGIONS.len())].0.to_string(),
            };
            if rng.gen_bool(0.5) {
                ControlEvent::SetRegion1 { region }
            } else {
                ControlEvent::SetRegion2 { region }
            }
        }
        2 => {
            let a = rng.gen_range(0..days + 10) as i64;
            let b = rng.gen_range(0..days + 10) as i64;
            ControlEvent::SetDateRange {
                start: start_date() + Duration::days(a),
                end: start_date() + Duration::days(b),
            }
        }
        3 => ControlEvent::SetXAxisBasis {
            basis: [XAxisBasis::Date, XAxisBasis::DaysSince100thCase, XAxisBasis::DaysSince10thDeath][rng.gen_range(0..3)],
        },
        4 => ControlEvent::SetMetric {
            metric: MetricKind::ALL[rng.gen_range(0..MetricKind::ALL.len())],
        },
        5 => ControlEvent::SetNormalizationMode {
            mode: if rng.gen_bool(0.5) {
                NormalizationMode::TotalNumbers
            } else {
                NormalizationMode::Per100k
            },
        },
        _ => ControlEvent::SetSmoothingWindow {
            window: [0, 3, 5, 7, 9][rng.gen_range(0..5)],
        },
    }
}

/// Random control walks over a synthetic dataset, checking every published
/// snapshot. `SEED`, `EVENTS`, `DAYS` tune the walk.
fn main() -> Result<()> {
    let result = run();
    logging::flush();
    result
}

fn run() -> Result<()> {
    let seed = env::var("SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42u64);
    let events = env::var("EVENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(500usize);
    let days = env::var("DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(60usize);

    let mut rng = StdRng::seed_from_u64(seed);
    let store = DatasetStore::from_rows(generate_rows(&mut rng, days))?
        .with_forecasts(generate_forecasts(&mut rng, days))
        .with_groups(vec!["Europe".to_string()]);
    let mut dash = Dashboard::new(store, Vec::new(), Config::default())?;

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for i in 0..events {
        let event = random_event(&mut rng, days);
        let before = dash.current_snapshot().clone();
        match dash.dispatch(event.clone()) {
            Ok(_) => accepted += 1,
            Err(_) => {
                rejected += 1;
                if dash.current_snapshot() != &before {
                    return Err(anyhow!("event {} ({:?}) was rejected but changed the snapshot", i, event));
                }
            }
        }
        assert_dashboard(&dash).map_err(|v| anyhow!("event {} ({:?}): {}", i, event, v.msg))?;
    }

    json_log(
        "control_fuzz",
        obj(&[
            ("seed", json!(seed)),
            ("events", json!(events)),
            ("accepted", json!(accepted)),
            ("rejected", json!(rejected)),
            ("final_hash", json!(format!("{:016x}", dash.current_snapshot().state_hash))),
        ]),
    );
    println!("ok: {} accepted, {} rejected", accepted, rejected);
    Ok(())
}
