use crate::message::ServerMessage;
use chrono::Utc;
use derive_more::Display;
use fnv::FnvHashMap;
use parking_lot::RwLock;
use spike_data::{SpikeEvent, subscription::Symbol};
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

/// Unique identifier of a connected viewer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display("viewer-{_0}")]
pub struct SessionId(pub u64);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum SinkError {
    #[error("viewer queue full")]
    Full,
    #[error("viewer disconnected")]
    Closed,
}

/// Outbound half of a viewer session.
///
/// Implementations must never block: a slow viewer loses messages instead of stalling
/// the caller.
pub trait ViewerSink: Debug + Send + Sync {
    fn send(&self, message: WsMessage) -> Result<(), SinkError>;

    fn is_open(&self) -> bool;
}

impl ViewerSink for mpsc::Sender<WsMessage> {
    fn send(&self, message: WsMessage) -> Result<(), SinkError> {
        self.try_send(message).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

/// Live set of viewer sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    pairs: Vec<Symbol>,
    next_id: AtomicU64,
    sessions: RwLock<FnvHashMap<SessionId, Arc<dyn ViewerSink>>>,
}

impl SessionRegistry {
    /// Construct a registry greeting each viewer with the watched `pairs`.
    pub fn new(pairs: Vec<Symbol>) -> Self {
        Self {
            pairs,
            next_id: AtomicU64::new(0),
            sessions: RwLock::new(FnvHashMap::default()),
        }
    }

    /// Greet the viewer, then add it to the live set.
    ///
    /// The greeting is queued before insertion, so it always precedes any broadcast.
    pub fn register(&self, sink: Arc<dyn ViewerSink>) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        match ServerMessage::hello(self.pairs.clone(), Utc::now()).to_ws_message() {
            Ok(hello) => {
                if let Err(error) = sink.send(hello) {
                    warn!(%id, %error, "failed to greet viewer");
                }
            }
            Err(error) => warn!(%id, %error, "failed to serialise viewer greeting"),
        }

        self.sessions.write().insert(id, sink);
        id
    }

    /// Remove a session, returning whether it was present.
    pub fn unregister(&self, id: SessionId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    /// Point-in-time copy of the live set.
    pub fn snapshot(&self) -> Vec<(SessionId, Arc<dyn ViewerSink>)> {
        self.sessions
            .read()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

/// Outcome of one [`Broadcaster::broadcast`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions no longer open, awaiting removal by their connection task.
    pub skipped: usize,
    pub failed: usize,
}

/// Fans [`SpikeEvent`]s out to every live viewer, best effort.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `event` to each open viewer. A failure for one viewer never affects the others.
    pub fn broadcast(&self, event: &SpikeEvent) -> BroadcastReport {
        let sessions = self.registry.snapshot();
        if sessions.is_empty() {
            return BroadcastReport::default();
        }

        let message = match ServerMessage::spike(event.clone()).to_ws_message() {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "failed to serialise spike");
                return BroadcastReport {
                    failed: sessions.len(),
                    ..Default::default()
                };
            }
        };

        sessions
            .into_iter()
            .fold(BroadcastReport::default(), |mut report, (id, sink)| {
                if !sink.is_open() {
                    report.skipped += 1;
                    return report;
                }

                match sink.send(message.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(error) => {
                        debug!(%id, %error, "failed to deliver spike to viewer");
                        report.failed += 1;
                    }
                }
                report
            })
    }
}
