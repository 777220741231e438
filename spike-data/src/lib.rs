#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Spike-Data
//! Streams Bybit kline (candle) updates over a single auto-reconnecting WebSocket, keeps a
//! rolling per-topic state, and flags anomalous confirmed candles as [`SpikeEvent`]s.
//!
//! ## Overview
//! * [`FeedConnector`]: owns the one upstream connection, subscribes to every kline topic,
//!   and forwards normalised [`KlineUpdate`]s.
//! * [`CandleStore`]: last candle and bounded volume history per [`KlineKey`].
//! * [`SpikeDetector`]: pure price / volume threshold heuristic.
//! * [`SpikePipeline`]: store + detector, driven by a single ingestion worker.
//!
//! [`FeedConnector`]: streams::reconnect::FeedConnector

/// All [`Error`](std::error::Error)s generated in Spike-Data.
pub mod error;

/// Bybit WebSocket protocol: topics, requests and inbound payloads.
pub mod exchange;

/// [`Symbol`](subscription::Symbol), [`Interval`](subscription::Interval), [`KlineKey`]
/// and the normalised [`Candle`](subscription::candle::Candle) model.
pub mod subscription;

/// Rolling per-topic candle state.
pub mod store;

/// Spike detection heuristic.
pub mod detector;

/// Ingestion pipeline combining the [`CandleStore`] and [`SpikeDetector`].
pub mod pipeline;

/// Upstream connection lifecycle and stream utilities.
pub mod streams;

pub use detector::{Direction, SpikeDetector, SpikeEvent, SpikeThresholds};
pub use pipeline::{BaselinePolicy, SpikePipeline};
pub use store::CandleStore;
pub use subscription::{KlineKey, candle::KlineUpdate};
