//! Per-(symbol, interval) candle state used as the baseline for spike detection.
//!
//! The store is owned by a single ingestion worker, so every mutation of a
//! [`CandleState`] is serialised through `&mut self`.

use crate::subscription::{KlineKey, candle::Candle};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::debug;

/// Default number of volume samples kept per [`KlineKey`].
pub const DEFAULT_VOLUME_WINDOW: usize = 30;

/// Rolling volume window: a fixed-capacity FIFO with a running sum.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeWindow {
    capacity: usize,
    volumes: VecDeque<Decimal>,
    total_volume: Decimal,
}

impl Default for VolumeWindow {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_WINDOW)
    }
}

impl VolumeWindow {
    /// Create a new volume window with the specified capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            volumes: VecDeque::with_capacity(capacity),
            total_volume: Decimal::ZERO,
        }
    }

    /// Append a volume sample, evicting the oldest if the window is full.
    ///
    /// Returns `false`, leaving the window untouched, if the running sum would overflow.
    pub fn push(&mut self, volume: Decimal) -> bool {
        let evicted = if self.volumes.len() >= self.capacity {
            self.volumes.front().copied()
        } else {
            None
        };

        let Some(total_volume) = self
            .total_volume
            .checked_sub(evicted.unwrap_or(Decimal::ZERO))
            .and_then(|total| total.checked_add(volume))
        else {
            return false;
        };

        if evicted.is_some() {
            self.volumes.pop_front();
        }
        self.volumes.push_back(volume);
        self.total_volume = total_volume;
        true
    }

    /// Mean over exactly the current window contents, `None` if empty.
    pub fn average(&self) -> Option<Decimal> {
        if self.volumes.is_empty() {
            None
        } else {
            self.total_volume
                .checked_div(Decimal::from(self.volumes.len()))
        }
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Decimal> {
        self.volumes.iter()
    }
}

/// State held for one [`KlineKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandleState {
    pub last_candle: Option<Candle>,
    pub volume_window: VolumeWindow,
}

impl CandleState {
    fn new(window_capacity: usize) -> Self {
        Self {
            last_candle: None,
            volume_window: VolumeWindow::new(window_capacity),
        }
    }
}

/// Process-wide mapping of [`KlineKey`] to [`CandleState`].
///
/// Entries are created lazily and never evicted; the key space is bounded by the
/// configured symbols × intervals.
#[derive(Debug, Clone)]
pub struct CandleStore {
    window_capacity: usize,
    states: FnvHashMap<KlineKey, CandleState>,
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_WINDOW)
    }
}

impl CandleStore {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window_capacity,
            states: FnvHashMap::default(),
        }
    }

    /// Append `volume` to the window of `key` and return the updated average.
    pub fn record_volume(&mut self, key: &KlineKey, volume: Decimal) -> Decimal {
        let window = &mut self.state_mut(key).volume_window;
        if !window.push(volume) {
            debug!(%key, %volume, "volume sample out of range, not recorded");
        }
        window.average().unwrap_or(Decimal::ZERO)
    }

    /// Last candle received for `key`, confirmed or not.
    pub fn last(&self, key: &KlineKey) -> Option<&Candle> {
        self.states
            .get(key)
            .and_then(|state| state.last_candle.as_ref())
    }

    /// Unconditionally overwrite the last candle for `key`.
    pub fn set_last(&mut self, key: &KlineKey, candle: Candle) {
        self.state_mut(key).last_candle = Some(candle);
    }

    pub fn state(&self, key: &KlineKey) -> Option<&CandleState> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn state_mut(&mut self, key: &KlineKey) -> &mut CandleState {
        let window_capacity = self.window_capacity;
        self.states
            .entry(key.clone())
            .or_insert_with(|| CandleState::new(window_capacity))
    }
}
