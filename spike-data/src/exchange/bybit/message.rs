use super::kline::BybitKline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// [`Bybit`](super::Bybit) topic message envelope, generic over the `data` payload.
///
/// ### Raw Payload Examples
/// See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/kline>
/// ```json
/// {
///     "topic": "kline.5.BTCUSDT",
///     "type": "snapshot",
///     "ts": 1672324988882,
///     "data": [ ... ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BybitPayload<T> {
    pub topic: SmolStr,

    #[serde(rename = "type", default)]
    pub kind: Option<BybitPayloadKind>,

    #[serde(
        rename = "ts",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub time: Option<DateTime<Utc>>,

    pub data: T,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BybitPayloadKind {
    Snapshot,
    Delta,
}

/// [`Bybit`](super::Bybit) acknowledgement of a request (subscribe, ping, ...).
///
/// ### Raw Payload Examples
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect#how-to-subscribe-to-topics>
/// ```json
/// {
///     "success": false,
///     "ret_msg": "error:handler not found,topic:kline.1.NOPE",
///     "conn_id": "2324d924-aa4d-45b0-a858-7b8be29ab52b",
///     "req_id": "",
///     "op": "subscribe"
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct BybitResponse {
    pub success: bool,

    #[serde(default)]
    pub ret_msg: Option<String>,

    #[serde(default)]
    pub op: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl BybitResponse {
    /// Determines if this response reports a rejected subscription.
    pub fn is_subscription_failure(&self) -> bool {
        !self.success
            && (self.kind.as_deref() == Some("response") || self.op.as_deref() == Some("subscribe"))
    }
}

/// Messages received from the [`Bybit`](super::Bybit) public stream.
#[derive(Clone, PartialEq, Debug)]
pub enum BybitMessage {
    Ignore,
    Kline(BybitKline),
    Response(BybitResponse),
}

impl<'de> Deserialize<'de> for BybitMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        match value.get("topic").and_then(Value::as_str) {
            Some(topic) if topic.starts_with("kline.") => serde_json::from_value(value)
                .map(BybitMessage::Kline)
                .map_err(serde::de::Error::custom),
            Some(_) => Ok(BybitMessage::Ignore),
            None if value.get("success").is_some() => serde_json::from_value(value)
                .map(BybitMessage::Response)
                .map_err(serde::de::Error::custom),
            None => Ok(BybitMessage::Ignore),
        }
    }
}
