use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: cannot parse timestamp '{value}'")]
    Timestamp { line: usize, value: String },

    #[error("no valid commands found in {}", .path.display())]
    NoData { path: PathBuf },

    #[error("nothing to plot: the chart has no buckets")]
    EmptyChart,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to draw chart: {0}")]
    Render(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}
