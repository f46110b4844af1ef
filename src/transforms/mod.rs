//! The store-mutating steps of a cascade, in dependency order.

pub mod metric;
pub mod normalize;
pub mod smoothing;
pub mod xaxis;

use serde::Serialize;

use crate::dataset::DatasetStore;
use crate::state::FilterState;

use self::metric::MetricSelector;
use self::normalize::Normalizer;
use self::smoothing::Smoother;
use self::xaxis::XAxisSelector;

/// Which steps actually rewrote the store during one cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub metric: bool,
    pub normalization: bool,
    pub smoothing: bool,
    pub basis: bool,
}

/// Tracks what the store currently holds so each step can tell whether it
/// has to run.
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    pub metric: MetricSelector,
    pub normalizer: Normalizer,
    pub smoother: Smoother,
    pub basis: XAxisSelector,
}

impl TransformChain {
    /// Metric → normalization → smoothing → x basis. Smoothing reruns whenever
    /// its inputs (the working derivatives) were rewritten.
    pub fn run(&mut self, store: &mut DatasetStore, filter: &FilterState) -> StepReport {
        let metric = self.metric.select(store, filter.metric);
        let normalization = self.normalizer.apply(store, filter.normalization_mode);
        let smoothing = metric || normalization || self.smoother.current() != filter.smoothing_window;
        if smoothing {
            self.smoother.apply(store, filter.smoothing_window);
        }
        let basis = self.basis.select(store, filter.x_axis_basis);
        StepReport {
            metric,
            normalization,
            smoothing,
            basis,
        }
    }
}
