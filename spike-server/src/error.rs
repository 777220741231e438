use thiserror::Error;

/// All errors generated in `spike-server`.
///
/// Only startup can fail: once running, per-message and per-viewer failures are logged
/// and dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration {var}={value:?}")]
    Config { var: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SerDe error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Data(#[from] spike_data::error::DataError),
}

impl ServerError {
    pub fn config<S: Into<String>>(var: &'static str, value: S) -> Self {
        Self::Config {
            var,
            value: value.into(),
        }
    }
}
