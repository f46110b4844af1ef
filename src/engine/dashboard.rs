//! The dashboard engine: owns the store, serializes control events and
//! publishes one snapshot per accepted event.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use super::events::ControlEvent;
use crate::catalog::RegionCatalog;
use crate::data::{RawAccelerationRow, RawInputs};
use crate::dataset::DatasetStore;
use crate::error::{EngineError, EngineResult};
use crate::filter::{compute_width, filter_forecasts, filter_region, ChartKind, ForecastView, SeriesView};
use crate::logging::{
    log_control, log_control_corrected, log_control_rejected, log_published, log_transform_steps, log_views,
    ProfileScope,
};
use crate::state::{Config, DateRange, FilterState, MetricKind, NormalizationMode, RegionSlot, XAxisBasis};
use crate::table::{build_acceleration, build_overview, AccelerationTable, OverviewTable};
use crate::titles::ChartTitles;
use crate::transforms::{StepReport, TransformChain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Recomputing,
}

/// Everything a renderer needs, computed from one FilterState.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub seq: u64,
    pub state_hash: u64,
    pub filter: FilterState,
    /// Line-chart views, indexed by [`RegionSlot::index`].
    pub series: [SeriesView; 2],
    /// Bar-chart views; the secondary one may be staggered.
    pub bar_series: [SeriesView; 2],
    pub forecasts: [ForecastView; 2],
    pub bar_width: f64,
    pub overview: OverviewTable,
    pub acceleration: AccelerationTable,
    pub titles: ChartTitles,
    pub steps: StepReport,
}

#[derive(Debug)]
pub struct Dashboard {
    cfg: Config,
    store: DatasetStore,
    catalog: RegionCatalog,
    acceleration_raw: Vec<RawAccelerationRow>,
    chain: TransformChain,
    filter: FilterState,
    phase: Phase,
    snapshot: Snapshot,
}

impl Dashboard {
    pub fn from_inputs(inputs: RawInputs, cfg: Config) -> EngineResult<Self> {
        let store = DatasetStore::from_inputs(&inputs)?;
        Self::new(store, inputs.acceleration, cfg)
    }

    /// Runs the first cascade with the configured defaults over the full
    /// data span.
    pub fn new(mut store: DatasetStore, acceleration_raw: Vec<RawAccelerationRow>, cfg: Config) -> EngineResult<Self> {
        let (start, end) = store.date_span().ok_or(EngineError::EmptyDataset)?;
        let catalog = RegionCatalog::from_store(&store);
        for region in [&cfg.default_region1, &cfg.default_region2] {
            if !catalog.is_selectable(region) {
                return Err(EngineError::UnknownRegion(region.clone()));
            }
        }

        let filter = FilterState::initial(&cfg, DateRange::new(start, end));
        let mut chain = TransformChain::default();
        let snapshot = run_cascade(&mut store, &mut chain, &filter, &cfg, &acceleration_raw, None, 0);
        Ok(Self {
            cfg,
            store,
            catalog,
            acceleration_raw,
            chain,
            filter,
            phase: Phase::Idle,
            snapshot,
        })
    }

    /// Validates `event` against the current state, then recomputes and
    /// republishes. On error nothing changes.
    pub fn dispatch(&mut self, event: ControlEvent) -> EngineResult<&Snapshot> {
        let seq = self.snapshot.seq + 1;
        let next = match self.next_filter(&event) {
            Ok(next) => next,
            Err(err) => {
                log_control_rejected(event.name(), &err.to_string());
                return Err(err);
            }
        };
        log_control(seq, event.name(), json!(event));

        self.phase = Phase::Recomputing;
        let snapshot = run_cascade(
            &mut self.store,
            &mut self.chain,
            &next,
            &self.cfg,
            &self.acceleration_raw,
            Some(&self.snapshot.acceleration),
            seq,
        );
        self.snapshot = snapshot;
        self.filter = next;
        self.phase = Phase::Idle;
        Ok(&self.snapshot)
    }

    fn next_filter(&self, event: &ControlEvent) -> EngineResult<FilterState> {
        let mut next = self.filter.clone();
        match event {
            ControlEvent::SetRegion1 { region } => next.region1 = self.selectable(region)?,
            ControlEvent::SetRegion2 { region } => next.region2 = self.selectable(region)?,
            ControlEvent::SetDateRange { start, end } => {
                if start > end {
                    log_control_corrected(event.name(), "start after end, clamped to start");
                }
                next.date_range = DateRange::new(*start, *end);
            }
            ControlEvent::SetXAxisBasis { basis } => next.x_axis_basis = *basis,
            ControlEvent::SetMetric { metric } => next.metric = *metric,
            ControlEvent::SetNormalizationMode { mode } => next.normalization_mode = *mode,
            ControlEvent::SetSmoothingWindow { window } => next.smoothing_window = *window,
        }
        Ok(next)
    }

    fn selectable(&self, region: &str) -> EngineResult<String> {
        if self.catalog.is_selectable(region) {
            Ok(region.to_string())
        } else {
            Err(EngineError::UnknownRegion(region.to_string()))
        }
    }

    pub fn set_region1(&mut self, region: &str) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetRegion1 {
            region: region.to_string(),
        })
    }

    pub fn set_region2(&mut self, region: &str) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetRegion2 {
            region: region.to_string(),
        })
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetDateRange { start, end })
    }

    pub fn set_x_axis_basis(&mut self, basis: XAxisBasis) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetXAxisBasis { basis })
    }

    pub fn set_metric(&mut self, metric: MetricKind) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetMetric { metric })
    }

    pub fn set_normalization_mode(&mut self, mode: NormalizationMode) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetNormalizationMode { mode })
    }

    pub fn set_smoothing_window(&mut self, window: usize) -> EngineResult<&Snapshot> {
        self.dispatch(ControlEvent::SetSmoothingWindow { window })
    }

    pub fn current_snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn current_series_view(&self, slot: RegionSlot) -> &SeriesView {
        &self.snapshot.series[slot.index()]
    }

    pub fn current_bar_view(&self, slot: RegionSlot) -> &SeriesView {
        &self.snapshot.bar_series[slot.index()]
    }

    pub fn current_forecast_view(&self, slot: RegionSlot) -> &ForecastView {
        &self.snapshot.forecasts[slot.index()]
    }

    pub fn current_bar_width(&self) -> f64 {
        self.snapshot.bar_width
    }

    pub fn current_overview_table(&self) -> &OverviewTable {
        &self.snapshot.overview
    }

    pub fn current_acceleration_table(&self) -> &AccelerationTable {
        &self.snapshot.acceleration
    }

    pub fn current_titles(&self) -> &ChartTitles {
        &self.snapshot.titles
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// The fixed pipeline. The acceleration table only depends on the
/// normalization mode, so `previous` is reused when that step did not run.
fn run_cascade(
    store: &mut DatasetStore,
    chain: &mut TransformChain,
    filter: &FilterState,
    cfg: &Config,
    acceleration_raw: &[RawAccelerationRow],
    previous: Option<&AccelerationTable>,
    seq: u64,
) -> Snapshot {
    let _scope = ProfileScope::with_context("cascade", &[("cascade_seq", json!(seq))]);

    let steps = chain.run(store, filter);
    log_transform_steps(seq, &steps);
    let store: &DatasetStore = store;

    let range = filter.date_range;
    let basis = filter.x_axis_basis;
    let view = |slot: RegionSlot, chart: ChartKind| filter_region(store, filter.region(slot), range, basis, slot, chart);
    let series = [
        view(RegionSlot::Primary, ChartKind::Line),
        view(RegionSlot::Secondary, ChartKind::Line),
    ];
    let bar_series = [
        view(RegionSlot::Primary, ChartKind::Bar),
        view(RegionSlot::Secondary, ChartKind::Bar),
    ];
    let forecasts = [
        filter_forecasts(store, &filter.region1, filter.metric, range.start),
        filter_forecasts(store, &filter.region2, filter.metric, range.start),
    ];
    let bar_width = compute_width(&series[0], &series[1], basis.is_calendar_date(), cfg.bar_span_units);
    log_views(
        seq,
        [series[0].len(), series[1].len()],
        [forecasts[0].len(), forecasts[1].len()],
        bar_width,
    );

    let overview = build_overview(store, &filter.region1, &filter.region2);
    let acceleration = match previous {
        Some(table) if !steps.normalization => table.clone(),
        _ => build_acceleration(acceleration_raw, store, filter.normalization_mode, cfg.overview_round_decimals),
    };
    let titles = ChartTitles::new(filter.metric, filter.normalization_mode, basis);

    let state_hash = filter.hash();
    log_published(seq, state_hash);
    Snapshot {
        seq,
        state_hash,
        filter: filter.clone(),
        series,
        bar_series,
        forecasts,
        bar_width,
        overview,
        acceleration,
        titles,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{day, region_rows};
    use crate::dataset::Column;
    use crate::filter::HALF_DAY_MS;
    use crate::state::{NO_REGION, WORLD};

    fn dashboard() -> Dashboard {
        let mut rows = region_rows(WORLD, &[50.0, 120.0, 300.0, 700.0, 1500.0], 7.8e9);
        rows.extend(region_rows("Italy", &[10.0, 90.0, 200.0, 400.0, 800.0], 60e6));
        let store = DatasetStore::from_rows(rows).unwrap().with_groups(vec!["Europe".to_string()]);
        Dashboard::new(store, Vec::new(), Config::default()).unwrap()
    }

    #[test]
    fn initial_snapshot_uses_defaults() {
        let dash = dashboard();
        let snap = dash.current_snapshot();
        assert_eq!(snap.seq, 0);
        assert_eq!(snap.filter.region1, WORLD);
        assert_eq!(snap.filter.region2, NO_REGION);
        assert_eq!(dash.current_series_view(RegionSlot::Primary).len(), 5);
        assert!(dash.current_series_view(RegionSlot::Secondary).is_empty());
        assert!(dash.current_overview_table().region2_column().iter().all(|c| c.is_empty()));
        assert_eq!(dash.phase(), Phase::Idle);
    }

    #[test]
    fn unknown_region_keeps_previous_snapshot() {
        let mut dash = dashboard();
        dash.set_region2("Italy").unwrap();
        let before = dash.current_snapshot().clone();
        assert!(matches!(dash.set_region2("Atlantis"), Err(EngineError::UnknownRegion(_))));
        assert!(matches!(dash.set_region1("---"), Err(EngineError::UnknownRegion(_))));
        assert_eq!(dash.current_snapshot(), &before);
        assert_eq!(dash.filter().region2, "Italy");
    }

    #[test]
    fn seq_increments_and_hash_tracks_filter() {
        let mut dash = dashboard();
        let h0 = dash.current_snapshot().state_hash;
        let snap = dash.set_metric(MetricKind::Deaths).unwrap();
        assert_eq!(snap.seq, 1);
        assert_ne!(snap.state_hash, h0);
        let h1 = snap.state_hash;
        let snap = dash.set_metric(MetricKind::Deaths).unwrap();
        assert_eq!(snap.seq, 2);
        assert_eq!(snap.state_hash, h1);
        assert_eq!(snap.steps, StepReport::default());
    }

    #[test]
    fn only_secondary_bars_are_staggered() {
        let mut dash = dashboard();
        dash.set_region2("Italy").unwrap();
        let line = dash.current_series_view(RegionSlot::Secondary).xs();
        let bar = dash.current_bar_view(RegionSlot::Secondary).xs();
        assert!(line.iter().zip(&bar).all(|(l, b)| b - l == HALF_DAY_MS));
        assert_eq!(
            dash.current_bar_view(RegionSlot::Primary).xs(),
            dash.current_series_view(RegionSlot::Primary).xs()
        );

        dash.set_x_axis_basis(XAxisBasis::DaysSince100thCase).unwrap();
        assert!(!dash.current_bar_view(RegionSlot::Secondary).staggered);
    }

    #[test]
    fn inverted_date_range_is_clamped() {
        let mut dash = dashboard();
        let snap = dash.set_date_range(day(3), day(1)).unwrap();
        assert_eq!(snap.filter.date_range, DateRange::new(day(3), day(3)));
        assert_eq!(snap.series[0].len(), 1);
        assert_eq!(snap.series[0].rows[0].date, day(3));
    }

    #[test]
    fn per100k_titles_and_values() {
        let mut dash = dashboard();
        let total = dash.current_series_view(RegionSlot::Primary).values(Column::Metric);
        let snap = dash.set_normalization_mode(NormalizationMode::Per100k).unwrap();
        assert!(snap.titles.cumulative.ends_with("(per 100k population)"));
        let per = snap.series[0].values(Column::Metric);
        for (t, p) in total.iter().zip(&per) {
            let expected = t.unwrap() / 7.8e9 * 100_000.0;
            assert!((p.unwrap() - expected).abs() < 1e-9);
        }
    }
}
