use crate::broadcast::Broadcaster;
use chrono::Utc;
use spike_data::{
    KlineUpdate, SpikePipeline,
    streams::reconnect::Event,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Single ingestion worker: owns the [`SpikePipeline`] so every state mutation is
/// serialised, and hands each detected spike to the [`Broadcaster`].
///
/// Runs until the upstream [`Event`] sender is dropped.
pub async fn run_ingestion(
    mut rx: mpsc::UnboundedReceiver<Event<KlineUpdate>>,
    mut pipeline: SpikePipeline,
    broadcaster: Broadcaster,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::Reconnecting => warn!("reconnecting to Bybit"),
            Event::Item(update) => {
                let Some(spike) = pipeline.process(update, Utc::now()) else {
                    continue;
                };

                let report = broadcaster.broadcast(&spike);
                info!(
                    symbol = %spike.symbol,
                    interval = %spike.interval,
                    direction = %spike.direction,
                    price_change_pct = %spike.price_change_pct,
                    score = %spike.score,
                    delivered = report.delivered,
                    failed = report.failed,
                    "spike detected"
                );
            }
        }
    }

    info!("ingestion worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SessionRegistry;
    use chrono::DateTime;
    use rust_decimal_macros::dec;
    use spike_data::subscription::{KlineKey, candle::Candle};
    use std::sync::Arc;
    use tokio_tungstenite::tungstenite::Message;

    fn update(close: rust_decimal::Decimal, confirmed: bool) -> Event<KlineUpdate> {
        Event::Item(KlineUpdate::new(
            KlineKey::from(("BTCUSDT", "1")),
            Candle::new(
                close,
                close,
                dec!(1),
                DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
                confirmed,
            ),
        ))
    }

    #[tokio::test]
    async fn test_run_ingestion_broadcasts_spikes() {
        let registry = Arc::new(SessionRegistry::new(vec!["BTCUSDT".into()]));
        let (viewer_tx, mut viewer_rx) = tokio::sync::mpsc::channel::<Message>(8);
        registry.register(Arc::new(viewer_tx));

        let (tx, rx) = mpsc::unbounded_channel();
        for event in [
            update(dec!(100), true),
            Event::Reconnecting,
            update(dec!(100.1), false),
            update(dec!(101), true),
        ] {
            tx.send(event).unwrap();
        }
        drop(tx);

        run_ingestion(rx, SpikePipeline::default(), Broadcaster::new(registry)).await;

        let mut frames = Vec::new();
        while let Ok(message) = viewer_rx.try_recv() {
            frames.push(serde_json::from_str::<serde_json::Value>(message.to_text().unwrap()).unwrap());
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "hello");
        assert_eq!(frames[1]["type"], "spike");
        // Baseline is the unconfirmed 100.1 candle
        assert_eq!(frames[1]["payload"]["priceChangePct"], 0.8991);
        assert_eq!(frames[1]["payload"]["direction"], "up");
    }
}
