pub mod binance;

pub use binance::BinanceMarketData;

use async_trait::async_trait;

use crate::error::MarketDataError;
use crate::types::{Candle, SymbolInfo, TimeFrame};

/// Injected source of public market data. Never exposes order
/// placement or account state: the engine only ever reads candles,
/// the tradable-symbol list, and the exchange clock.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn get_klines(
        &self,
        symbol: &str,
        interval: TimeFrame,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError>;

    async fn get_exchange_info(&self) -> Result<Vec<SymbolInfo>, MarketDataError>;

    async fn get_server_time(&self) -> Result<u64, MarketDataError>;
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use crate::types::Symbol;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    /// Canned market data for end-to-end tests: a fixed candle series per
    /// symbol/timeframe, no network involved.
    #[derive(Default)]
    pub struct StubMarketData {
        pub klines: HashMap<(String, TimeFrame), Vec<Candle>>,
        pub symbols: Vec<SymbolInfo>,
    }

    impl StubMarketData {
        pub fn with_flat_series(symbol: &str, timeframe: TimeFrame, len: usize, price: Decimal) -> Self {
            let mut candles = Vec::with_capacity(len);
            for i in 0..len {
                let t = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                candles.push(Candle {
                    symbol: Symbol::new(symbol),
                    timeframe,
                    open_time: t,
                    close_time: t,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: Decimal::from(100),
                    quote_volume: Decimal::from(100) * price,
                    trades: 10,
                    is_closed: true,
                });
            }
            let mut klines = HashMap::new();
            klines.insert((symbol.to_string(), timeframe), candles);
            Self {
                klines,
                symbols: vec![SymbolInfo {
                    symbol: Symbol::new(symbol),
                    status: "TRADING".into(),
                }],
            }
        }
    }

    #[async_trait]
    impl MarketDataPort for StubMarketData {
        async fn get_klines(
            &self,
            symbol: &str,
            interval: TimeFrame,
            limit: u32,
        ) -> Result<Vec<Candle>, MarketDataError> {
            let key = (symbol.to_string(), interval);
            let series = self
                .klines
                .get(&key)
                .cloned()
                .ok_or(MarketDataError::Http(404))?;
            let take = (limit as usize).min(series.len());
            Ok(series[series.len() - take..].to_vec())
        }

        async fn get_exchange_info(&self) -> Result<Vec<SymbolInfo>, MarketDataError> {
            Ok(self.symbols.clone())
        }

        async fn get_server_time(&self) -> Result<u64, MarketDataError> {
            Ok(1_700_000_000_000)
        }
    }
}
