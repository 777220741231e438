//! Threshold heuristic flagging anomalous confirmed candles.

use crate::subscription::{Interval, KlineKey, Symbol, candle::Candle};
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Thresholds a candle must reach to be flagged as a spike.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SpikeThresholds {
    /// Absolute close-to-close change, in percent.
    pub price_change_pct: Decimal,
    /// Multiple of the rolling average volume.
    pub volume_multiplier: Decimal,
}

impl Default for SpikeThresholds {
    fn default() -> Self {
        Self {
            price_change_pct: Decimal::new(6, 1),
            volume_multiplier: Decimal::new(3, 0),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
}

/// Spike detected on a confirmed candle.
///
/// Serialises with the field names and numeric encoding expected by viewers, eg/
/// `{"symbol":"BTCUSDT","interval":"1","priceChangePct":0.7,"vol":30,"avgVol":10,
/// "direction":"up","score":1.4,"ts":1700000000000}`.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpikeEvent {
    pub symbol: Symbol,
    pub interval: Interval,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_change_pct: Decimal,
    #[serde(rename = "vol", with = "rust_decimal::serde::float")]
    pub volume: Decimal,
    #[serde(rename = "avgVol", with = "rust_decimal::serde::float")]
    pub average_volume: Decimal,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    #[serde(rename = "ts", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Pure spike detector.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SpikeDetector {
    pub thresholds: SpikeThresholds,
}

impl SpikeDetector {
    pub fn new(thresholds: SpikeThresholds) -> Self {
        Self { thresholds }
    }

    /// Compare `current` against `previous` and the rolling `average_volume`.
    ///
    /// Returns `None` when neither threshold is reached, or when `previous.close` is zero.
    pub fn detect(
        &self,
        key: &KlineKey,
        previous: &Candle,
        current: &Candle,
        average_volume: Decimal,
        time: DateTime<Utc>,
    ) -> Option<SpikeEvent> {
        if previous.close.is_zero() {
            return None;
        }

        // Out of range prices are not evaluated
        let price_change_pct = current
            .close
            .checked_sub(previous.close)
            .and_then(|change| change.checked_div(previous.close))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))?;

        let is_price_spike = price_change_pct.abs() >= self.thresholds.price_change_pct;
        let is_volume_spike = average_volume > Decimal::ZERO
            && average_volume
                .checked_mul(self.thresholds.volume_multiplier)
                .is_some_and(|threshold| current.volume >= threshold);

        if !is_price_spike && !is_volume_spike {
            return None;
        }

        let direction = if price_change_pct > Decimal::ZERO {
            Direction::Up
        } else {
            Direction::Down
        };

        let score = if is_volume_spike {
            price_change_pct.abs().checked_mul(Decimal::TWO)?
        } else {
            price_change_pct.abs()
        };

        Some(SpikeEvent {
            symbol: key.symbol.clone(),
            interval: key.interval.clone(),
            price_change_pct: round_half_away(price_change_pct, 4),
            volume: current.volume,
            average_volume: round_half_away(average_volume, 2),
            direction,
            score: round_half_away(score, 4),
            timestamp: time,
        })
    }
}

/// Round to `dp` decimal places, midpoints away from zero (eg/ 2.125 -> 2.13).
fn round_half_away(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
