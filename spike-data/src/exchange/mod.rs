/// `Bybit` v5 public kline stream.
pub mod bybit;
