use crate::broadcast::SessionRegistry;
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Upper bound on draining a disconnecting viewer's queue.
const VIEWER_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Accept viewer WebSocket connections until the task is dropped.
pub async fn serve(listener: TcpListener, registry: Arc<SessionRegistry>, buffer_size: usize) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "viewer WebSocket server listening");
    }

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "new viewer TCP connection");
                tokio::spawn(handle_viewer(
                    stream,
                    peer,
                    Arc::clone(&registry),
                    buffer_size,
                ));
            }
            Err(error) => warn!(%error, "failed to accept viewer connection"),
        }
    }
}

/// Handle one viewer connection from handshake to disconnect.
///
/// Outbound messages are queued in a bounded channel drained by a writer task. Inbound
/// frames are discarded; the reader task only detects close.
pub async fn handle_viewer(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SessionRegistry>,
    buffer_size: usize,
) {
    let websocket = match accept_async(stream).await {
        Ok(websocket) => websocket,
        Err(error) => {
            warn!(%peer, %error, "viewer WebSocket handshake failed");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(buffer_size);

    let id = registry.register(Arc::new(tx));
    info!(%peer, %id, viewers = registry.len(), "viewer connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(error) = ws_sender.send(message).await {
                debug!(%peer, %error, "viewer write failed");
                return;
            }
        }

        // Queue drained, completes the close handshake if the viewer initiated it
        if let Err(error) = ws_sender.close().await {
            debug!(%peer, %error, "viewer close failed");
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    debug!(%peer, %error, "viewer read failed");
                    break;
                }
            }
        }
    });

    let writer_done = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            true
        }
        _ = &mut recv_task => false,
    };

    // Dropping the registry's sender lets the writer drain and close
    registry.unregister(id);

    if !writer_done && timeout(VIEWER_CLOSE_TIMEOUT, &mut send_task).await.is_err() {
        debug!(%peer, "viewer writer did not finish, aborting");
        send_task.abort();
    }
    info!(%peer, %id, viewers = registry.len(), "viewer disconnected");
}
