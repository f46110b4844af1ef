//! Error taxonomy for the dashboard engine.
//!
//! Nothing here is fatal to a session: load errors stop startup, control
//! errors leave the previously published snapshot in place.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A control named a region that is not in the catalog (or is the
    /// catalog separator). The previous selection stays active.
    #[error("unknown region: {0:?}")]
    UnknownRegion(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column {column:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("bad date {value:?}: expected YYYY-MM-DD")]
    BadDate { value: String },

    #[error("unknown forecast metric {0:?}")]
    UnknownMetric(String),

    #[error("dataset has no time-series rows")]
    EmptyDataset,
}

pub type EngineResult<T> = Result<T, EngineError>;
