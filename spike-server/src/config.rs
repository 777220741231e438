use crate::error::ServerError;
use itertools::Itertools;
use spike_data::{
    BaselinePolicy, KlineKey, SpikeThresholds,
    exchange::bybit::BASE_URL_BYBIT_PUBLIC_LINEAR,
    streams::reconnect::FeedConfig,
    subscription::{Interval, Symbol},
};
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use url::Url;

const DEFAULT_PAIRS: &str = "BTCUSDT,ETHUSDT,BNBUSDT,SOLUSDT,XRPUSDT";
const DEFAULT_INTERVALS: &str = "1,5";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
const DEFAULT_PING_INTERVAL_SECS: u64 = 20;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
const DEFAULT_VIEWER_BUFFER_SIZE: usize = 256;

/// Process configuration, loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub pairs: Vec<Symbol>,
    pub intervals: Vec<Interval>,
    /// Viewer WebSocket listen address.
    pub addr: SocketAddr,
    pub feed: FeedConfig,
    /// Capacity of each viewer's outbound queue.
    pub viewer_buffer_size: usize,
    pub thresholds: SpikeThresholds,
    pub baseline: BaselinePolicy,
}

impl ServerConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using the provided variable lookup, eg/ a fixed map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let pairs = env.list("PAIRS", DEFAULT_PAIRS)?;
        let intervals = env.list("INTERVALS", DEFAULT_INTERVALS)?;

        let bind_addr = env.parse::<IpAddr>("BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let port = env.parse("PORT", Some(DEFAULT_PORT))?;

        let url = env.parse::<Url>("BYBIT_WS_URL", Url::parse(BASE_URL_BYBIT_PUBLIC_LINEAR).ok())?;
        let reconnect_delay = env.parse("RECONNECT_DELAY_MS", Some(DEFAULT_RECONNECT_DELAY_MS))?;
        let ping_interval = env.positive("PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL_SECS)?;
        let read_timeout = env.positive("READ_TIMEOUT_SECS", DEFAULT_READ_TIMEOUT_SECS)?;

        let defaults = SpikeThresholds::default();
        let thresholds = SpikeThresholds {
            price_change_pct: env.positive("SPIKE_PRICE_THRESHOLD_PCT", defaults.price_change_pct)?,
            volume_multiplier: env.positive("SPIKE_VOLUME_MULTIPLIER", defaults.volume_multiplier)?,
        };

        Ok(Self {
            pairs,
            intervals,
            addr: SocketAddr::new(bind_addr, port),
            feed: FeedConfig::new(url)
                .with_reconnect_delay(Duration::from_millis(reconnect_delay))
                .with_ping_interval(Duration::from_secs(ping_interval))
                .with_read_timeout(Duration::from_secs(read_timeout)),
            viewer_buffer_size: env.positive("VIEWER_BUFFER_SIZE", DEFAULT_VIEWER_BUFFER_SIZE)?,
            thresholds,
            baseline: env.parse("SPIKE_BASELINE", Some(BaselinePolicy::default()))?,
        })
    }

    /// Every (symbol, interval) pair to subscribe to.
    pub fn kline_keys(&self) -> Vec<KlineKey> {
        self.pairs
            .iter()
            .cartesian_product(self.intervals.iter())
            .map(|(symbol, interval)| KlineKey::new(symbol.clone(), interval.clone()))
            .collect()
    }
}

/// Environment variable lookup w/ parsing into typed values.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value of `var`, treating blank as unset.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: Option<T>) -> Result<T, ServerError>
    where
        T: FromStr,
    {
        match (self.get(var), default) {
            (Some(value), _) => value
                .parse()
                .map_err(|_| ServerError::config(var, value)),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(ServerError::config(var, "")),
        }
    }

    fn positive<T>(&self, var: &'static str, default: T) -> Result<T, ServerError>
    where
        T: FromStr + PartialOrd + Default + ToString,
    {
        let value = self.parse(var, Some(default))?;
        if value > T::default() {
            Ok(value)
        } else {
            Err(ServerError::config(var, value.to_string()))
        }
    }

    /// Comma separated list, trimmed, empties and duplicates dropped.
    fn list<T>(&self, var: &'static str, default: &str) -> Result<Vec<T>, ServerError>
    where
        T: for<'a> From<&'a str>,
    {
        let raw = self.get(var).unwrap_or_else(|| default.to_string());

        let values = raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unique()
            .map(T::from)
            .collect::<Vec<_>>();

        if values.is_empty() {
            return Err(ServerError::config(var, raw));
        }

        Ok(values)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS.split(',').map(Symbol::from).collect(),
            intervals: DEFAULT_INTERVALS.split(',').map(Interval::from).collect(),
            addr: SocketAddr::new(IpAddr::from([0, 0, 0, 0]), DEFAULT_PORT),
            feed: FeedConfig::default(),
            viewer_buffer_size: DEFAULT_VIEWER_BUFFER_SIZE,
            thresholds: SpikeThresholds::default(),
            baseline: BaselinePolicy::default(),
        }
    }
}
