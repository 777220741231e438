//! # Spike-Server
//! Viewer-facing half of the spike watcher: configuration, the viewer session registry,
//! spike fan-out and the viewer WebSocket server.

/// Environment driven [`ServerConfig`](config::ServerConfig).
pub mod config;

/// [`ServerError`](error::ServerError) returned by fallible startup steps.
pub mod error;

/// Messages sent to viewers.
pub mod message;

/// [`SessionRegistry`](broadcast::SessionRegistry) and [`Broadcaster`](broadcast::Broadcaster).
pub mod broadcast;

/// Viewer WebSocket accept loop and per-connection tasks.
pub mod server;

/// Ingestion worker connecting the upstream feed to the broadcaster.
pub mod worker;
