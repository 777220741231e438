use crate::{error::DataError, subscription::KlineKey};
use serde::Serialize;
use smol_str::{SmolStr, format_smolstr};

/// Type that defines how to translate a [`KlineKey`] into a [`Bybit`](super::Bybit) topic to be
/// subscribed to, and back again.
///
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BybitChannel(pub &'static str);

impl BybitChannel {
    /// [`Bybit`](super::Bybit) real-time kline (candle) channel name.
    ///
    /// See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/kline>
    pub const KLINE: Self = Self("kline");

    /// Topic for the provided [`KlineKey`], eg/ "kline.5.BTCUSDT".
    pub fn topic(&self, key: &KlineKey) -> SmolStr {
        format_smolstr!("{}.{}.{}", self.0, key.interval, key.symbol)
    }

    /// Parse a "<channel>.<interval>.<symbol>" topic into a [`KlineKey`].
    pub fn parse(&self, topic: &str) -> Result<KlineKey, DataError> {
        let mut parts = topic.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(channel), Some(interval), Some(symbol), None)
                if channel == self.0 && !interval.is_empty() && !symbol.is_empty() =>
            {
                Ok(KlineKey::from((symbol, interval)))
            }
            _ => Err(DataError::InvalidTopic(topic.to_string())),
        }
    }
}

impl AsRef<str> for BybitChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kline_topic() {
        let key = KlineKey::from(("BTCUSDT", "5"));
        assert_eq!(BybitChannel::KLINE.topic(&key).as_str(), "kline.5.BTCUSDT");
    }

    #[test]
    fn test_parse_kline_topic() {
        struct TestCase {
            input: &'static str,
            expected: Result<KlineKey, DataError>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid kline topic
                input: "kline.1.BTCUSDT",
                expected: Ok(KlineKey::from(("BTCUSDT", "1"))),
            },
            TestCase {
                // TC1: valid kline topic w/ non-numeric interval
                input: "kline.D.ETHUSDT",
                expected: Ok(KlineKey::from(("ETHUSDT", "D"))),
            },
            TestCase {
                // TC2: different channel
                input: "publicTrade.BTCUSDT",
                expected: Err(DataError::InvalidTopic("publicTrade.BTCUSDT".to_string())),
            },
            TestCase {
                // TC3: missing symbol
                input: "kline.1",
                expected: Err(DataError::InvalidTopic("kline.1".to_string())),
            },
            TestCase {
                // TC4: trailing segment
                input: "kline.1.BTCUSDT.extra",
                expected: Err(DataError::InvalidTopic("kline.1.BTCUSDT.extra".to_string())),
            },
            TestCase {
                // TC5: empty interval
                input: "kline..BTCUSDT",
                expected: Err(DataError::InvalidTopic("kline..BTCUSDT".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = BybitChannel::KLINE.parse(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
