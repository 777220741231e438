use super::KlineKey;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalised candle model.
///
/// Represents one completed or in-progress time bucket. Only `confirmed` candles
/// are evaluated for spikes.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Constructor, Deserialize, Serialize)]
pub struct Candle {
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub start_time: DateTime<Utc>,
    pub confirmed: bool,
}

/// The most recent [`Candle`] received for a [`KlineKey`].
#[derive(Clone, Eq, PartialEq, Debug, Constructor, Deserialize, Serialize)]
pub struct KlineUpdate {
    pub key: KlineKey,
    pub candle: Candle,
}
