use super::timeout::{DEFAULT_WS_READ_TIMEOUT, TimeoutStream};
use crate::{
    error::DataError,
    exchange::bybit::{BASE_URL_BYBIT_PUBLIC_LINEAR, Bybit, message::BybitMessage},
    subscription::{KlineKey, candle::KlineUpdate},
};
use derive_more::Display;
use futures::{SinkExt, Stream, StreamExt};
use std::{ops::ControlFlow, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, interval_at, sleep, timeout},
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

/// Default delay between losing the upstream connection and reconnecting.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default interval between application level pings sent upstream.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Upper bound on the graceful close handshake before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Events yielded by the [`FeedConnector`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Event<T> {
    /// The upstream connection was lost and a reconnect is scheduled.
    Reconnecting,
    Item(T),
}

/// Lifecycle of the single upstream connection.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// [`FeedConnector`] configuration.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedConfig {
    pub url: Url,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    pub read_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(BASE_URL_BYBIT_PUBLIC_LINEAR).expect("valid Bybit base url"),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            ping_interval: DEFAULT_PING_INTERVAL,
            read_timeout: DEFAULT_WS_READ_TIMEOUT,
        }
    }
}

impl FeedConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// How a subscribed session ended without a socket error.
enum SessionEnd {
    Closed,
    ConsumerDropped,
}

/// Owns the upstream connection lifecycle: connect, subscribe to every configured kline
/// topic, forward candles, and reconnect after a fixed delay when the socket is lost.
///
/// The connector is a sequential state machine, so there is never more than one upstream
/// socket nor more than one pending reconnect delay.
#[derive(Debug)]
pub struct FeedConnector {
    config: FeedConfig,
    keys: Vec<KlineKey>,
    state_tx: watch::Sender<ConnectionState>,
}

impl FeedConnector {
    pub fn new(config: FeedConfig, keys: Vec<KlineKey>) -> Result<Self, DataError> {
        if keys.is_empty() {
            return Err(DataError::SubscriptionsEmpty);
        }

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            config,
            keys,
            state_tx,
        })
    }

    /// Observe [`ConnectionState`] transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Spawn the connector, returning its task handle and the receiver of its [`Event`]s.
    pub fn start(
        self,
    ) -> (
        JoinHandle<()>,
        mpsc::UnboundedReceiver<Event<KlineUpdate>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (handle, rx)
    }

    /// Drive the connector until the consumer of `tx` is dropped.
    pub async fn run(self, tx: mpsc::UnboundedSender<Event<KlineUpdate>>) {
        info!(
            url = %self.config.url,
            topics = self.keys.len(),
            "starting Bybit kline FeedConnector"
        );

        loop {
            self.transition(ConnectionState::Connecting);

            match self.session(&tx).await {
                Ok(SessionEnd::ConsumerDropped) => {
                    info!("FeedConnector consumer dropped, stopping");
                    self.transition(ConnectionState::Disconnected);
                    return;
                }
                Ok(SessionEnd::Closed) => {
                    info!("Bybit WebSocket closed");
                }
                Err(error) => {
                    warn!(%error, "Bybit WebSocket failed");
                }
            }

            self.transition(ConnectionState::Disconnected);

            if tx.send(Event::Reconnecting).is_err() {
                return;
            }

            info!(
                delay = ?self.config.reconnect_delay,
                "reconnecting to Bybit after delay"
            );
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn session(
        &self,
        tx: &mpsc::UnboundedSender<Event<KlineUpdate>>,
    ) -> Result<SessionEnd, DataError> {
        debug!(url = %self.config.url, "connecting to Bybit WebSocket");
        let (websocket, _) = connect_async(self.config.url.as_str()).await?;
        let (mut sink, stream) = websocket.split();

        let result = self.consume(&mut sink, stream, tx).await;

        match timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => debug!(%error, "failed to close Bybit WebSocket"),
            Err(_) => debug!("timed out closing Bybit WebSocket"),
        }

        result
    }

    async fn consume<Si, St>(
        &self,
        sink: &mut Si,
        stream: St,
        tx: &mpsc::UnboundedSender<Event<KlineUpdate>>,
    ) -> Result<SessionEnd, DataError>
    where
        Si: futures::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
        St: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        if let Some(request) = Bybit::subscribe(&self.keys) {
            sink.send(request).await?;
        }
        self.transition(ConnectionState::Subscribed);
        info!(topics = self.keys.len(), "subscribed to Bybit kline topics");

        let mut stream = TimeoutStream::new(stream, self.config.read_timeout);
        let mut ping = interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    sink.send(Bybit::ping()).await?;
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(payload))) => {
                            if Self::handle(payload.as_str(), tx).is_break() {
                                return Ok(SessionEnd::ConsumerDropped);
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            debug!(?frame, "received Bybit close frame");
                            return Ok(SessionEnd::Closed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            let error = DataError::from(error);
                            if error.is_terminal() {
                                return Err(error);
                            }
                            debug!(%error, "non-terminal Bybit WebSocket error");
                        }
                        None if stream.timed_out() => {
                            return Err(DataError::Socket(format!(
                                "read timeout: no data for {} seconds",
                                self.config.read_timeout.as_secs()
                            )));
                        }
                        None => return Ok(SessionEnd::Closed),
                    }
                }
            }
        }
    }

    /// Route one inbound text frame. Breaks only if the consumer has been dropped.
    fn handle(
        payload: &str,
        tx: &mpsc::UnboundedSender<Event<KlineUpdate>>,
    ) -> ControlFlow<()> {
        match serde_json::from_str::<BybitMessage>(payload) {
            Ok(BybitMessage::Kline(kline)) => match kline.into_latest() {
                Ok(Some(update)) => {
                    if tx.send(Event::Item(update)).is_err() {
                        return ControlFlow::Break(());
                    }
                }
                Ok(None) => debug!("dropping Bybit kline w/ empty data"),
                Err(error) => debug!(%error, "dropping Bybit kline"),
            },
            Ok(BybitMessage::Response(response)) if response.is_subscription_failure() => {
                let error = DataError::Subscribe(response.ret_msg.unwrap_or_default());
                warn!(%error, "Bybit subscription rejected, connection kept open");
            }
            Ok(BybitMessage::Response(response)) => {
                debug!(?response, "Bybit response");
            }
            Ok(BybitMessage::Ignore) => {}
            Err(error) => {
                let error = DataError::Deserialise {
                    error: error.to_string(),
                    payload: payload.to_string(),
                };
                debug!(%error, "dropping unparseable Bybit message");
            }
        }

        ControlFlow::Continue(())
    }

    fn transition(&self, state: ConnectionState) {
        debug!(%state, "FeedConnector transition");
        self.state_tx.send_replace(state);
    }
}
