use super::{channel::BybitChannel, message::BybitPayload};
use crate::{
    error::DataError,
    subscription::candle::{Candle, KlineUpdate},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Terse type alias for a [`Bybit`](super::Bybit) real-time kline WebSocket message.
pub type BybitKline = BybitPayload<Vec<BybitKlineInner>>;

/// ### Raw Payload Examples
/// See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/kline>
/// ```json
/// {
///     "start": 1672324800000,
///     "end": 1672325099999,
///     "interval": "5",
///     "open": "16649.5",
///     "close": "16677",
///     "high": "16677",
///     "low": "16608",
///     "volume": "2.081",
///     "turnover": "34666.4005",
///     "confirm": false,
///     "timestamp": 1672324988882
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BybitKlineInner {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,

    pub open: Decimal,

    pub close: Decimal,

    #[serde(alias = "vol")]
    pub volume: Decimal,

    #[serde(default)]
    pub confirm: bool,
}

impl From<BybitKlineInner> for Candle {
    fn from(kline: BybitKlineInner) -> Self {
        Candle {
            open: kline.open,
            close: kline.close,
            volume: kline.volume,
            start_time: kline.start,
            confirmed: kline.confirm,
        }
    }
}

impl BybitKline {
    /// Extract the current candle of this topic, which is the last element of `data`.
    ///
    /// Returns `Ok(None)` if the payload carries no candles.
    pub fn into_latest(self) -> Result<Option<KlineUpdate>, DataError> {
        let key = BybitChannel::KLINE.parse(&self.topic)?;

        Ok(self
            .data
            .into_iter()
            .last()
            .map(|kline| KlineUpdate::new(key, Candle::from(kline))))
    }
}
