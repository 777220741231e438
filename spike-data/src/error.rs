use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `spike-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("SocketError: {0}")]
    Socket(String),

    #[error("failed to deserialise payload: {error}, payload: {payload}")]
    Deserialise { error: String, payload: String },

    #[error("invalid kline topic: {0}")]
    InvalidTopic(String),

    #[error("failed to subscribe: {0}")]
    Subscribe(String),

    #[error("failed to initialise FeedConnector due to empty subscriptions")]
    SubscriptionsEmpty,
}

impl DataError {
    /// Determine if an error requires the [`FeedConnector`](crate::streams::reconnect::FeedConnector)
    /// to drop the upstream socket and reconnect.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("terminated")
                    || error_lower.contains("connectionclosed")
                    || error_lower.contains("alreadyclosed")
                    || error_lower.contains("sendafterclosing")
                    || error_lower.contains("io(")
                    || error_lower.contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(format!("{value:?}"))
    }
}
