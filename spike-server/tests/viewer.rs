//! Viewer WebSocket server end to end: greeting, spike delivery and session cleanup.

use chrono::DateTime;
use futures::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use spike_data::{
    Direction, SpikeEvent,
    subscription::{Interval, Symbol},
};
use spike_server::{
    broadcast::{BroadcastReport, Broadcaster, SessionRegistry},
    server::serve,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn spike() -> SpikeEvent {
    SpikeEvent {
        symbol: Symbol::new("SOLUSDT"),
        interval: Interval::new("5"),
        price_change_pct: dec!(-0.75),
        volume: dec!(12.5),
        average_volume: dec!(4),
        direction: Direction::Down,
        score: dec!(1.5),
        timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
    }
}

async fn wait_for_viewers(registry: &SessionRegistry, expected: usize) {
    timeout(TEST_TIMEOUT, async {
        while registry.len() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for viewer count");
}

#[tokio::test]
async fn test_viewer_receives_hello_then_spikes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let registry = Arc::new(SessionRegistry::new(vec![
        Symbol::new("SOLUSDT"),
        Symbol::new("XRPUSDT"),
    ]));
    let broadcaster = Broadcaster::new(Arc::clone(&registry));
    tokio::spawn(serve(listener, Arc::clone(&registry), 16));

    let (mut viewer, _) = connect_async(format!("ws://{addr}")).await.unwrap();

    // Greeting is the first frame
    let hello = timeout(TEST_TIMEOUT, viewer.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let hello = serde_json::from_str::<serde_json::Value>(hello.to_text().unwrap()).unwrap();
    assert_eq!(hello["type"], "hello");
    assert_eq!(hello["pairs"], serde_json::json!(["SOLUSDT", "XRPUSDT"]));

    wait_for_viewers(&registry, 1).await;

    assert_eq!(
        broadcaster.broadcast(&spike()),
        BroadcastReport {
            delivered: 1,
            skipped: 0,
            failed: 0,
        }
    );

    let frame = timeout(TEST_TIMEOUT, viewer.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let frame = serde_json::from_str::<serde_json::Value>(frame.to_text().unwrap()).unwrap();
    assert_eq!(
        frame,
        serde_json::json!({
            "type": "spike",
            "payload": {
                "symbol": "SOLUSDT",
                "interval": "5",
                "priceChangePct": -0.75,
                "vol": 12.5,
                "avgVol": 4.0,
                "direction": "down",
                "score": 1.5,
                "ts": 1_700_000_000_000_i64,
            },
        })
    );

    // Client frames are ignored
    viewer.send(Message::text("hi")).await.unwrap();

    // Disconnect completes the close handshake and removes the session
    viewer.close(None).await.unwrap();

    let mut close_acknowledged = false;
    while let Some(frame) = timeout(TEST_TIMEOUT, viewer.next()).await.unwrap() {
        match frame {
            Ok(Message::Close(_)) => close_acknowledged = true,
            Ok(_) => {}
            Err(error) => panic!("close handshake failed: {error}"),
        }
    }
    assert!(close_acknowledged);

    wait_for_viewers(&registry, 0).await;
    assert_eq!(broadcaster.broadcast(&spike()), BroadcastReport::default());
}

#[tokio::test]
async fn test_multiple_viewers_each_receive_spike() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let registry = Arc::new(SessionRegistry::new(vec![Symbol::new("SOLUSDT")]));
    let broadcaster = Broadcaster::new(Arc::clone(&registry));
    tokio::spawn(serve(listener, Arc::clone(&registry), 16));

    let mut viewers = Vec::new();
    for _ in 0..3 {
        let (viewer, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        viewers.push(viewer);
    }
    wait_for_viewers(&registry, 3).await;

    assert_eq!(broadcaster.broadcast(&spike()).delivered, 3);

    for viewer in &mut viewers {
        let kinds = [
            timeout(TEST_TIMEOUT, viewer.next()).await.unwrap().unwrap().unwrap(),
            timeout(TEST_TIMEOUT, viewer.next()).await.unwrap().unwrap().unwrap(),
        ]
        .map(|frame| {
            serde_json::from_str::<serde_json::Value>(frame.to_text().unwrap()).unwrap()["type"]
                .clone()
        });

        assert_eq!(kinds, [serde_json::json!("hello"), serde_json::json!("spike")]);
    }
}
