use self::channel::BybitChannel;
use crate::subscription::KlineKey;
use serde::Serialize;
use smol_str::SmolStr;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Defines the type that translates a [`KlineKey`] into a [`Bybit`] topic.
pub mod channel;

/// Kline (candle) payload types.
pub mod kline;

/// Generic [`Bybit`] message envelopes and the inbound message router.
pub mod message;

/// [`Bybit`] public linear (USDT perpetual) WebSocket server base url.
///
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect>
pub const BASE_URL_BYBIT_PUBLIC_LINEAR: &str = "wss://stream.bybit.com/v5/public/linear";

/// [`Bybit`] v5 public stream.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Bybit;

impl Bybit {
    /// Build the single subscribe request covering every provided [`KlineKey`].
    ///
    /// eg/ `{"op":"subscribe","args":["kline.1.BTCUSDT","kline.5.BTCUSDT"]}`
    ///
    /// Returns `None` if there is nothing to subscribe to.
    pub fn subscribe<'a, Keys>(keys: Keys) -> Option<WsMessage>
    where
        Keys: IntoIterator<Item = &'a KlineKey>,
    {
        let topics = keys
            .into_iter()
            .map(|key| BybitChannel::KLINE.topic(key))
            .collect::<Vec<_>>();

        (!topics.is_empty()).then(|| BybitRequest::subscribe(topics).into_message())
    }

    /// Application level heartbeat, answered by [`Bybit`] with a "pong" response.
    pub fn ping() -> WsMessage {
        BybitRequest::ping().into_message()
    }
}

/// Outbound [`Bybit`] request.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct BybitRequest {
    pub op: &'static str,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<SmolStr>,
}

impl BybitRequest {
    pub fn subscribe(topics: Vec<SmolStr>) -> Self {
        Self {
            op: "subscribe",
            args: topics,
        }
    }

    pub fn ping() -> Self {
        Self {
            op: "ping",
            args: vec![],
        }
    }

    fn into_message(self) -> WsMessage {
        // Serialising a struct of &str and SmolStr fields cannot fail
        let json = serde_json::to_string(&self).unwrap_or_default();
        WsMessage::text(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_single_frame() {
        let keys = vec![
            KlineKey::from(("BTCUSDT", "1")),
            KlineKey::from(("BTCUSDT", "5")),
            KlineKey::from(("ETHUSDT", "1")),
        ];

        assert_eq!(
            Bybit::subscribe(&keys),
            Some(WsMessage::text(
                r#"{"op":"subscribe","args":["kline.1.BTCUSDT","kline.5.BTCUSDT","kline.1.ETHUSDT"]}"#
                    .to_string()
            ))
        );
    }

    #[test]
    fn test_subscribe_full_cross_product_in_one_frame() {
        let keys = (0..25)
            .flat_map(|index| {
                ["1", "5"].map(|interval| {
                    KlineKey::from((format!("SYM{index}USDT").as_str(), interval))
                })
            })
            .collect::<Vec<_>>();

        let message = Bybit::subscribe(&keys).unwrap();
        let json = serde_json::from_str::<serde_json::Value>(message.to_text().unwrap()).unwrap();

        assert_eq!(json["op"], "subscribe");
        assert_eq!(json["args"].as_array().unwrap().len(), 50);
        assert_eq!(json["args"][49], "kline.5.SYM24USDT");
    }

    #[test]
    fn test_subscribe_empty() {
        assert_eq!(Bybit::subscribe(&Vec::<KlineKey>::new()), None);
    }

    #[test]
    fn test_ping() {
        assert_eq!(Bybit::ping(), WsMessage::text(r#"{"op":"ping"}"#.to_string()));
    }
}
