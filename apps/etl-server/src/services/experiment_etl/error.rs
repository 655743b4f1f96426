use std::path::PathBuf;

/// Failures raised while loading, transforming or persisting experiment data.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// The data locator does not resolve to a readable directory or file.
    #[error("Bad path to data: {}", .0.display())]
    NotFound(PathBuf),

    /// The data locator was rejected before touching the filesystem.
    #[error("path to data not allowed: {0}")]
    PathNotAllowed(String),

    /// An input file lacks a column the transform depends on.
    #[error("{file} is missing required column `{column}`")]
    Schema { file: String, column: String },

    /// A cell could not be parsed into the type its column requires.
    #[error("invalid {field} value {value:?} in data row {row}")]
    Parse {
        field: &'static str,
        row: usize,
        value: String,
    },

    #[error("users relation is empty; cannot compute per-user averages")]
    EmptyInput,

    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("derived summary sink failed: {0}")]
    Sink(#[from] sqlx::Error),

    #[error("transform task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EtlError {
    pub(crate) fn parse(field: &'static str, row: usize, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            row,
            value: value.into(),
        }
    }
}
