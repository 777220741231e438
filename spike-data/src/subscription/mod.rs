use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Candle model and update types.
pub mod candle;

/// Opaque identifier of a traded instrument, eg/ "BTCUSDT".
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    pub fn new<S: AsRef<str>>(symbol: S) -> Self {
        Self(SmolStr::new(symbol))
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Opaque identifier of a candle period, eg/ "1" (one minute), "5", "D".
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Interval(pub SmolStr);

impl Interval {
    pub fn new<S: AsRef<str>>(interval: S) -> Self {
        Self(SmolStr::new(interval))
    }
}

impl From<&str> for Interval {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Interval {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Key identifying one candle stream: a ([`Symbol`], [`Interval`]) pair.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Constructor, Deserialize, Serialize,
)]
#[display("{symbol}@{interval}")]
pub struct KlineKey {
    pub symbol: Symbol,
    pub interval: Interval,
}

impl<S, I> From<(S, I)> for KlineKey
where
    S: Into<Symbol>,
    I: Into<Interval>,
{
    fn from((symbol, interval): (S, I)) -> Self {
        Self::new(symbol.into(), interval.into())
    }
}
