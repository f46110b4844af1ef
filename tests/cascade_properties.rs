//! Properties of the control cascade over seeded random walks.

use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};

use covidboard::dataset::{Column, DatasetStore, TimeSeriesRow};
use covidboard::engine::{ControlEvent, Dashboard};
use covidboard::filter::{compute_width, SeriesView};
use covidboard::state::{Config, MetricKind, NormalizationMode, RegionSlot, XAxisBasis, NO_REGION, WORLD};
use covidboard::verify::invariants::{assert_dashboard, assert_smoothing};

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 2, 1).unwrap() + Duration::days(n)
}

fn rows(region: &str, new_cases: &[Option<f64>], population: f64) -> Vec<TimeSeriesRow> {
    let mut confirmed = 0.0;
    let mut prev: Option<f64> = None;
    new_cases
        .iter()
        .enumerate()
        .map(|(i, &new)| {
            confirmed += new.unwrap_or(0.0);
            let deaths = (confirmed * 0.04).floor();
            let row = TimeSeriesRow::new(region, day(i as i64))
                .with(Column::Confirmed, Some(confirmed))
                .with(Column::Deaths, Some(deaths))
                .with(Column::Recovered, Some((confirmed * 0.2).floor()))
                .with(Column::ActiveCases, Some(confirmed - deaths - (confirmed * 0.2).floor()))
                .with(Column::Population, Some(population))
                .with(Column::NewCases, new)
                .with(Column::NewDeaths, new.map(|n| (n * 0.04).floor()))
                .with(Column::NewRecoveries, new.map(|n| (n * 0.2).floor()))
                .with(Column::AccelerationCases, match (new, prev) {
                    (Some(n), Some(p)) => Some(n - p),
                    _ => None,
                })
                .with(Column::DaysSince100, (confirmed >= 100.0).then_some(i as f64))
                .with(Column::DaysSince10, (deaths >= 10.0).then_some(i as f64));
            prev = new;
            row
        })
        .collect()
}

fn random_new_cases(rng: &mut StdRng, days: usize) -> Vec<Option<f64>> {
    (0..days)
        .map(|_| {
            if rng.gen_bool(0.05) {
                None
            } else {
                Some(rng.gen_range(0..400) as f64)
            }
        })
        .collect()
}

fn dashboard(seed: u64) -> Dashboard {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut all = rows(WORLD, &random_new_cases(&mut rng, 40), 7.8e9);
    all.extend(rows("Brazil", &random_new_cases(&mut rng, 35), 2.1e8));
    all.extend(rows("Yemen", &random_new_cases(&mut rng, 40), 2.9e7));
    let store = DatasetStore::from_rows(all).unwrap();
    Dashboard::new(store, Vec::new(), Config::default()).unwrap()
}

fn random_event(rng: &mut StdRng) -> ControlEvent {
    let regions = [WORLD, NO_REGION, "Brazil", "Yemen", "Mordor"];
    match rng.gen_range(0..7) {
        0 => ControlEvent::SetRegion1 {
            region: regions[rng.gen_range(0..regions.len())].to_string(),
        },
        1 => ControlEvent::SetRegion2 {
            region: regions[rng.gen_range(0..regions.len())].to_string(),
        },
        2 => ControlEvent::SetDateRange {
            start: day(rng.gen_range(0..45)),
            end: day(rng.gen_range(0..45)),
        },
        3 => ControlEvent::SetXAxisBasis {
            basis: [XAxisBasis::Date, XAxisBasis::DaysSince100thCase, XAxisBasis::DaysSince10thDeath][rng.gen_range(0..3)],
        },
        4 => ControlEvent::SetMetric {
            metric: MetricKind::ALL[rng.gen_range(0..4)],
        },
        5 => ControlEvent::SetNormalizationMode {
            mode: if rng.gen_bool(0.5) {
                NormalizationMode::Per100k
            } else {
                NormalizationMode::TotalNumbers
            },
        },
        _ => ControlEvent::SetSmoothingWindow {
            window: rng.gen_range(0..10),
        },
    }
}

#[test]
fn random_walks_keep_invariants() {
    for seed in 0..8u64 {
        let mut dash = dashboard(seed);
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
        let mut last_seq = dash.current_snapshot().seq;
        for _ in 0..150 {
            let event = random_event(&mut rng);
            let before = dash.current_snapshot().clone();
            match dash.dispatch(event.clone()) {
                Ok(snap) => {
                    assert_eq!(snap.seq, last_seq + 1);
                    last_seq = snap.seq;
                }
                Err(_) => assert_eq!(dash.current_snapshot(), &before, "{:?}", event),
            }
            if let Err(v) = assert_dashboard(&dash) {
                panic!("seed {} after {:?}: {}", seed, event, v.msg);
            }
        }
    }
}

#[test]
fn reselecting_mode_is_bit_identical() {
    let mut dash = dashboard(7);
    dash.set_smoothing_window(5).unwrap();
    dash.set_normalization_mode(NormalizationMode::Per100k).unwrap();
    let rows = dash.store().rows().to_vec();
    let forecasts = dash.store().forecast_rows().to_vec();
    dash.set_normalization_mode(NormalizationMode::Per100k).unwrap();
    assert_eq!(dash.store().rows(), &rows[..]);
    assert_eq!(dash.store().forecast_rows(), &forecasts[..]);
}

#[test]
fn smoothing_with_world_sorted_first() {
    let mut dash = dashboard(3);
    assert_eq!(dash.store().region_spans()[0].0, "Brazil");
    dash.set_smoothing_window(7).unwrap();
    assert!(assert_smoothing(dash.store(), 7).is_ok());

    let mut all = rows(WORLD, &[Some(1.0); 6], 7.8e9);
    all.extend(rows("Yemen", &[Some(50.0), Some(60.0), Some(70.0), Some(80.0)], 2.9e7));
    let store = DatasetStore::from_rows(all).unwrap();
    assert_eq!(store.region_spans()[0].0, WORLD);
    let mut dash = Dashboard::new(store, Vec::new(), Config::default()).unwrap();
    dash.set_region2("Yemen").unwrap();
    dash.set_smoothing_window(3).unwrap();

    let world = dash.current_series_view(RegionSlot::Primary).values(Column::Smooth1stDer);
    assert_eq!(world, vec![None, None, Some(1.0), Some(1.0), Some(1.0), Some(1.0)]);
    let yemen = dash.current_series_view(RegionSlot::Secondary).values(Column::Smooth1stDer);
    assert_eq!(yemen, vec![None, None, Some(60.0), Some(70.0)]);
}

#[test]
fn bar_width_non_increasing_in_cardinality() {
    let view = |n: usize| SeriesView {
        rows: (0..n).map(|i| TimeSeriesRow::new("Yemen", day(i as i64))).collect(),
        ..SeriesView::empty("Yemen", XAxisBasis::Date)
    };
    let empty = view(0);
    let mut last = compute_width(&empty, &empty, true, 10.0);
    assert_eq!(last, 864_000_000.0);
    for n in 1..60 {
        let w = compute_width(&view(n), &view(n / 2), true, 10.0);
        assert!(w > 0.0 && w <= last);
        last = w;
    }
    assert_eq!(compute_width(&view(4), &empty, false, 10.0), 2.5);
}
