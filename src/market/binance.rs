use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MarketDataError;
use crate::types::{Candle, Symbol, SymbolInfo, TimeFrame};

use super::MarketDataPort;

const BASE_URL: &str = "https://api.binance.com";

/// Public-REST adapter over Binance's unauthenticated market-data endpoints.
/// Holds no API key: every method it exposes is read-only.
#[derive(Debug, Clone)]
pub struct BinanceMarketData {
    client: Client,
    base_url: String,
}

impl BinanceMarketData {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        Self { client, base_url }
    }

    async fn get_json(&self, path: &str) -> Result<Value, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout
                } else {
                    MarketDataError::Decode(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MarketDataError::Http(status.as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))
    }
}

impl Default for BinanceMarketData {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_decimal(value: &Value) -> Result<Decimal, MarketDataError> {
    let s = value
        .as_str()
        .ok_or_else(|| MarketDataError::Decode("expected numeric string".into()))?;
    Decimal::from_str(s).map_err(|e| MarketDataError::Decode(e.to_string()))
}

fn parse_timestamp_ms(value: &Value) -> Result<DateTime<Utc>, MarketDataError> {
    let ms = value
        .as_i64()
        .ok_or_else(|| MarketDataError::Decode("expected integer timestamp".into()))?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| MarketDataError::Decode("timestamp out of range".into()))
}

/// Binance kline rows are fixed-position arrays, not objects:
/// `[open_time, open, high, low, close, volume, close_time, quote_volume, trades, ...]`.
fn parse_kline_row(symbol: &Symbol, timeframe: TimeFrame, row: &Value) -> Result<Candle, MarketDataError> {
    let arr = row
        .as_array()
        .ok_or_else(|| MarketDataError::Decode("kline row is not an array".into()))?;
    if arr.len() < 9 {
        return Err(MarketDataError::Decode("kline row too short".into()));
    }

    let open_time = parse_timestamp_ms(&arr[0])?;
    let open = parse_decimal(&arr[1])?;
    let high = parse_decimal(&arr[2])?;
    let low = parse_decimal(&arr[3])?;
    let close = parse_decimal(&arr[4])?;
    let volume = parse_decimal(&arr[5])?;
    let close_time = parse_timestamp_ms(&arr[6])?;
    let quote_volume = parse_decimal(&arr[7])?;
    let trades = arr[8].as_u64().unwrap_or(0);

    Ok(Candle {
        symbol: symbol.clone(),
        timeframe,
        open_time,
        close_time,
        open,
        high,
        low,
        close,
        volume,
        quote_volume,
        trades,
        is_closed: true,
    })
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoSymbol {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[async_trait::async_trait]
impl MarketDataPort for BinanceMarketData {
    async fn get_klines(
        &self,
        symbol: &str,
        interval: TimeFrame,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let path = format!(
            "/api/v3/klines?symbol={}&interval={}&limit={}",
            symbol,
            interval.as_str(),
            limit.min(1000)
        );
        let body = self.get_json(&path).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| MarketDataError::Decode("klines response is not an array".into()))?;

        let sym = Symbol::new(symbol);
        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(parse_kline_row(&sym, interval, row)?);
        }
        debug!(symbol, interval = interval.as_str(), count = candles.len(), "fetched klines");
        Ok(candles)
    }

    async fn get_exchange_info(&self) -> Result<Vec<SymbolInfo>, MarketDataError> {
        let body = self.get_json("/api/v3/exchangeInfo").await?;
        let parsed: ExchangeInfoResponse =
            serde_json::from_value(body).map_err(|e| MarketDataError::Decode(e.to_string()))?;

        Ok(parsed
            .symbols
            .into_iter()
            .map(|s| SymbolInfo {
                symbol: Symbol::new(s.symbol),
                status: s.status,
            })
            .collect())
    }

    async fn get_server_time(&self) -> Result<u64, MarketDataError> {
        let body = self.get_json("/api/v3/time").await?;
        body.get("serverTime")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                warn!("exchange time response missing serverTime field");
                MarketDataError::Decode("missing serverTime".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_well_formed_kline_row() {
        let row = json!([
            1700000000000i64,
            "100.50",
            "101.00",
            "99.75",
            "100.80",
            "1234.5",
            1700000899999i64,
            "124000.0",
            42,
            "600.0",
            "60000.0",
            "0"
        ]);
        let candle = parse_kline_row(&Symbol::new("BTCUSDT"), TimeFrame::M15, &row).unwrap();
        assert_eq!(candle.open.to_string(), "100.50");
        assert_eq!(candle.trades, 42);
        assert!(candle.is_closed);
    }

    #[test]
    fn rejects_a_truncated_row() {
        let row = json!([1700000000000i64, "100.50"]);
        assert!(parse_kline_row(&Symbol::new("BTCUSDT"), TimeFrame::M15, &row).is_err());
    }
}
