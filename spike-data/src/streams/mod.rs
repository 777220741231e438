/// [`FeedConnector`](reconnect::FeedConnector): the reconnecting upstream kline feed.
pub mod reconnect;

/// Idle read timeout wrapper for the upstream stream.
pub mod timeout;
