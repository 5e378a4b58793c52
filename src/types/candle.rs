use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Symbol, TimeFrame};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub timeframe: TimeFrame,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trades: u64,
    pub is_closed: bool,
}

impl Candle {
    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.close.min(self.open) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Fixed-capacity, oldest-evicted window of closed candles for one (symbol, timeframe).
#[derive(Debug, Clone, Default)]
pub struct CandleBuffer {
    pub candles: Vec<Candle>,
    pub max_size: usize,
}

impl CandleBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            candles: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn from_candles(candles: Vec<Candle>, max_size: usize) -> Self {
        let mut buf = Self::new(max_size);
        for c in candles {
            buf.push(c);
        }
        buf
    }

    pub fn push(&mut self, candle: Candle) {
        if self.candles.len() >= self.max_size {
            self.candles.remove(0);
        }
        self.candles.push(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_n(&self, n: usize) -> &[Candle] {
        let len = self.candles.len();
        if n >= len {
            &self.candles[..]
        } else {
            &self.candles[len - n..]
        }
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn opens(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.open).collect()
    }

    pub fn volumes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// 24h ticker snapshot, used by the quality filter for spread context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    pub fn spread_pct(&self) -> Decimal {
        if self.bid.is_zero() {
            return Decimal::ZERO;
        }
        ((self.ask - self.bid) / self.bid).abs()
    }

    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::from(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: i64, high: i64, low: i64, close: i64) -> Candle {
        Candle {
            symbol: Symbol::new("BTCUSDT"),
            timeframe: TimeFrame::M15,
            open_time: Utc::now(),
            close_time: Utc::now(),
            open: Decimal::from(open),
            high: Decimal::from(high),
            low: Decimal::from(low),
            close: Decimal::from(close),
            volume: dec!(100),
            quote_volume: dec!(1000),
            trades: 10,
            is_closed: true,
        }
    }

    #[test]
    fn buffer_evicts_oldest() {
        let mut buf = CandleBuffer::new(2);
        buf.push(candle(1, 2, 0, 1));
        buf.push(candle(2, 3, 1, 2));
        buf.push(candle(3, 4, 2, 3));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.closes(), vec![Decimal::from(2), Decimal::from(3)]);
    }

    #[test]
    fn bullish_bearish_classification() {
        assert!(candle(1, 3, 0, 2).is_bullish());
        assert!(candle(2, 3, 0, 1).is_bearish());
    }
}
