use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spike_data::{SpikeEvent, subscription::Symbol};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Outbound viewer message.
///
/// eg/ `{"type":"hello","ts":1700000000000,"pairs":["BTCUSDT"]}`
/// eg/ `{"type":"spike","payload":{"symbol":"BTCUSDT",..}}`
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once to each viewer on connect.
    Hello {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        ts: DateTime<Utc>,
        pairs: Vec<Symbol>,
    },
    Spike {
        payload: SpikeEvent,
    },
}

impl ServerMessage {
    pub fn hello(pairs: Vec<Symbol>, ts: DateTime<Utc>) -> Self {
        Self::Hello { ts, pairs }
    }

    pub fn spike(payload: SpikeEvent) -> Self {
        Self::Spike { payload }
    }

    /// Serialise into a WebSocket text frame.
    pub fn to_ws_message(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(|json| WsMessage::Text(json.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use spike_data::{Direction, subscription::Interval};

    fn time() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_server_message_serialisation() {
        struct TestCase {
            input: ServerMessage,
            expected: serde_json::Value,
        }

        let tests = vec![
            TestCase {
                // TC0: hello
                input: ServerMessage::hello(
                    vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")],
                    time(),
                ),
                expected: serde_json::json!({
                    "type": "hello",
                    "ts": 1_700_000_000_000_i64,
                    "pairs": ["BTCUSDT", "ETHUSDT"],
                }),
            },
            TestCase {
                // TC1: spike
                input: ServerMessage::spike(SpikeEvent {
                    symbol: Symbol::new("ETHUSDT"),
                    interval: Interval::new("5"),
                    price_change_pct: dec!(-1.5),
                    volume: dec!(40),
                    average_volume: dec!(10),
                    direction: Direction::Down,
                    score: dec!(3),
                    timestamp: time(),
                }),
                expected: serde_json::json!({
                    "type": "spike",
                    "payload": {
                        "symbol": "ETHUSDT",
                        "interval": "5",
                        "priceChangePct": -1.5,
                        "vol": 40.0,
                        "avgVol": 10.0,
                        "direction": "down",
                        "score": 3.0,
                        "ts": 1_700_000_000_000_i64,
                    },
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::to_value(&test.input).unwrap();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_to_ws_message() {
        let message = ServerMessage::hello(vec![Symbol::new("BTCUSDT")], time())
            .to_ws_message()
            .unwrap();

        let WsMessage::Text(text) = message else {
            panic!("expected text frame");
        };
        assert_eq!(
            text.as_str(),
            r#"{"type":"hello","ts":1700000000000,"pairs":["BTCUSDT"]}"#
        );
    }
}
