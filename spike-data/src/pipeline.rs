use crate::{
    detector::{SpikeDetector, SpikeEvent},
    store::CandleStore,
    subscription::candle::KlineUpdate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Which candles become the comparison baseline for the next confirmed candle.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Every received candle, confirmed or in-progress, replaces the baseline.
    #[default]
    LatestSeen,
    /// Only confirmed candles replace the baseline.
    ConfirmedOnly,
}

impl FromStr for BaselinePolicy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "latest" | "latest_seen" => Ok(Self::LatestSeen),
            "confirmed" | "confirmed_only" => Ok(Self::ConfirmedOnly),
            other => Err(format!("unknown baseline policy: {other}")),
        }
    }
}

/// Ingestion pipeline: [`CandleStore`] + [`SpikeDetector`].
///
/// Owned by a single ingestion worker.
#[derive(Debug, Clone, Default)]
pub struct SpikePipeline {
    store: CandleStore,
    detector: SpikeDetector,
    baseline: BaselinePolicy,
}

impl SpikePipeline {
    pub fn new(store: CandleStore, detector: SpikeDetector, baseline: BaselinePolicy) -> Self {
        Self {
            store,
            detector,
            baseline,
        }
    }

    /// Process the latest candle of one topic, returning a [`SpikeEvent`] if the candle is
    /// confirmed and anomalous compared to the stored baseline.
    pub fn process(&mut self, update: KlineUpdate, time: DateTime<Utc>) -> Option<SpikeEvent> {
        let KlineUpdate { key, candle } = update;

        let spike = match self.store.last(&key).copied() {
            Some(previous) if candle.confirmed => {
                let average_volume = self.store.record_volume(&key, candle.volume);
                self.detector
                    .detect(&key, &previous, &candle, average_volume, time)
            }
            Some(_) => None,
            None => {
                debug!(%key, "first candle received, no baseline to compare against");
                None
            }
        };

        if candle.confirmed || self.baseline == BaselinePolicy::LatestSeen {
            self.store.set_last(&key, candle);
        }

        spike
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }
}
