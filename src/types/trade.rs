use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Side, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Partial,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Partial => "PARTIAL",
            TradeStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(TradeStatus::Open),
            "PARTIAL" => Some(TradeStatus::Partial),
            "CLOSED" => Some(TradeStatus::Closed),
            _ => None,
        }
    }
}

/// Why a trade's final close was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Tp2,
    Sl,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Tp2 => "TP2",
            CloseReason::Sl => "SL",
        }
    }
}

/// A simulated position owned by C10. Mutable; updated on every price tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry: Decimal,
    pub size_usd: Decimal,
    pub qty: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub sl: Decimal,
    pub filled_tp1_qty: Decimal,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl_usd: Decimal,
    pub realized_pnl_pct: Decimal,
    pub last_price: Decimal,
    pub last_update: DateTime<Utc>,
}

impl Trade {
    /// OPEN has no partial fill, PARTIAL is strictly between 0 and qty,
    /// CLOSED always has `closed_at` set.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            TradeStatus::Open => self.filled_tp1_qty.is_zero() && self.closed_at.is_none(),
            TradeStatus::Partial => {
                self.filled_tp1_qty > Decimal::ZERO
                    && self.filled_tp1_qty < self.qty
                    && self.closed_at.is_none()
            }
            TradeStatus::Closed => self.closed_at.is_some() && self.filled_tp1_qty <= self.qty,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, TradeStatus::Closed)
    }
}

/// A durable, admitted-signal row written through the storage port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: Symbol,
    pub price: Decimal,
    pub volume: Decimal,
    pub score: Decimal,
    pub rsi: Decimal,
    pub macd: Decimal,
    pub macd_signal: Decimal,
    pub volume_spike: bool,
    pub ts_utc: DateTime<Utc>,
}

/// A durable trade row, the persisted counterpart of [`Trade`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry: Decimal,
    pub size: Decimal,
    pub qty: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub sl: Decimal,
    pub filled_tp1_qty: Decimal,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pnl_usd: Decimal,
    pub pnl_pct: Decimal,
    pub last_price: Decimal,
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_trade() -> Trade {
        Trade {
            id: "t1".into(),
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            entry: dec!(100),
            size_usd: dec!(10000),
            qty: dec!(100),
            tp1: dec!(101.5),
            tp2: dec!(102.5),
            sl: dec!(99),
            filled_tp1_qty: Decimal::ZERO,
            status: TradeStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl_usd: Decimal::ZERO,
            realized_pnl_pct: Decimal::ZERO,
            last_price: dec!(100),
            last_update: Utc::now(),
        }
    }

    #[test]
    fn open_trade_is_consistent() {
        assert!(base_trade().is_consistent());
    }

    #[test]
    fn partial_without_closed_at_is_consistent() {
        let mut t = base_trade();
        t.status = TradeStatus::Partial;
        t.filled_tp1_qty = dec!(50);
        assert!(t.is_consistent());
    }

    #[test]
    fn closed_without_closed_at_is_inconsistent() {
        let mut t = base_trade();
        t.status = TradeStatus::Closed;
        assert!(!t.is_consistent());
    }
}
