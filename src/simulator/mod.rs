use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SimulatorSettings;
use crate::error::StorageError;
use crate::storage::Storage;
use crate::types::{CloseReason, Side, SignalCandidate, Symbol, Trade, TradeStatus};

/// Snapshot of the paper-trading book, for the `health` CLI surface and
/// periodic log lines.
#[derive(Debug, Clone)]
pub struct PortfolioSummary {
    pub symbols_with_trades: usize,
    pub open_count: usize,
    pub partial_count: usize,
    pub closed_count: usize,
    pub total_realized_pnl_usd: Decimal,
    pub win_rate_pct: Decimal,
}

/// Paper-trading position manager. Owns no market data; advances
/// purely from `on_tick` calls driven by the scanner's fetched closes.
pub struct Simulator {
    storage: Storage,
    settings: SimulatorSettings,
    symbol_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Simulator {
    pub fn new(storage: Storage, settings: SimulatorSettings) -> Self {
        Self {
            storage,
            settings,
            symbol_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, symbol: &Symbol) -> Arc<Mutex<()>> {
        let mut locks = self.symbol_locks.lock().await;
        locks
            .entry(symbol.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn fee(&self, notional: Decimal) -> Decimal {
        (self.settings.fee_bps / Decimal::from(10_000)) * notional
    }

    /// Opens a paper position for an admitted candidate. Zero or negative
    /// stop distance is an arithmetic fault: logged, the signal stays
    /// admitted, no trade is opened.
    pub async fn open_trade(&self, candidate: &SignalCandidate) -> Result<Option<Trade>, StorageError> {
        let lock = self.lock_for(&candidate.symbol).await;
        let _guard = lock.lock().await;

        let entry = candidate.entry_mid();
        let sl = candidate.stop_loss;
        let stop_distance = (entry - sl).abs();
        if stop_distance <= Decimal::ZERO {
            warn!(symbol = candidate.symbol.as_str(), "stop distance is zero; trade not opened");
            return Ok(None);
        }

        let risk_usd = self.settings.equity_usd * (self.settings.risk_pct / Decimal::from(100));
        let qty = risk_usd / stop_distance;
        if qty <= Decimal::ZERO {
            warn!(symbol = candidate.symbol.as_str(), "qty <= 0; trade not opened");
            return Ok(None);
        }
        let size_usd = qty * entry;

        let now = Utc::now();
        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            symbol: candidate.symbol.clone(),
            side: candidate.side,
            entry,
            size_usd,
            qty,
            tp1: candidate.tp_levels[0],
            tp2: candidate.tp_levels[1],
            sl,
            filled_tp1_qty: Decimal::ZERO,
            status: TradeStatus::Open,
            opened_at: now,
            closed_at: None,
            realized_pnl_usd: Decimal::ZERO,
            realized_pnl_pct: Decimal::ZERO,
            last_price: entry,
            last_update: now,
        };

        self.storage.upsert_trade(&trade).await?;
        info!(
            symbol = candidate.symbol.as_str(),
            side = candidate.side.as_str(),
            entry = %entry,
            qty = %qty,
            "trade opened"
        );
        Ok(Some(trade))
    }

    /// Advances every non-closed trade on `symbol` against `last_price`.
    pub async fn on_tick(&self, symbol: &Symbol, last_price: Decimal) -> Result<(), StorageError> {
        let lock = self.lock_for(symbol).await;
        let _guard = lock.lock().await;

        let trades = self.storage.open_trades_for_symbol(symbol).await?;
        for mut trade in trades {
            self.advance(&mut trade, last_price).await?;
        }
        Ok(())
    }

    async fn advance(&self, trade: &mut Trade, last_price: Decimal) -> Result<(), StorageError> {
        let hit_tp2 = match trade.side {
            Side::Long => last_price >= trade.tp2,
            Side::Short => last_price <= trade.tp2,
        };
        if hit_tp2 {
            self.final_close(trade, trade.tp2, CloseReason::Tp2).await?;
            return Ok(());
        }

        let hit_sl = match trade.side {
            Side::Long => last_price <= trade.sl,
            Side::Short => last_price >= trade.sl,
        };
        if hit_sl {
            self.final_close(trade, trade.sl, CloseReason::Sl).await?;
            return Ok(());
        }

        let hit_tp1 = match trade.side {
            Side::Long => last_price >= trade.tp1,
            Side::Short => last_price <= trade.tp1,
        };
        let tp1_target_qty = trade.qty * self.settings.tp1_ratio_qty;
        if hit_tp1 && trade.filled_tp1_qty < tp1_target_qty {
            let close_qty = tp1_target_qty - trade.filled_tp1_qty;
            if close_qty > Decimal::ZERO {
                let realized = match trade.side {
                    Side::Long => (trade.tp1 - trade.entry) * close_qty,
                    Side::Short => (trade.entry - trade.tp1) * close_qty,
                } - self.fee(trade.entry * close_qty)
                    - self.fee(trade.tp1 * close_qty);

                trade.filled_tp1_qty += close_qty;
                trade.last_price = last_price;
                trade.last_update = Utc::now();
                trade.status = if trade.filled_tp1_qty < trade.qty {
                    TradeStatus::Partial
                } else {
                    TradeStatus::Closed
                };
                if matches!(trade.status, TradeStatus::Closed) {
                    trade.closed_at = Some(trade.last_update);
                }

                self.storage.upsert_trade(trade).await?;
                info!(
                    symbol = trade.symbol.as_str(),
                    realized = %realized,
                    "tp1 partial close"
                );
            }
        }

        Ok(())
    }

    async fn final_close(&self, trade: &mut Trade, exit_price: Decimal, reason: CloseReason) -> Result<(), StorageError> {
        let q1 = trade.filled_tp1_qty.min(trade.qty);
        let q2 = (trade.qty - q1).max(Decimal::ZERO);

        let mut pnl = Decimal::ZERO;
        if q1 > Decimal::ZERO {
            pnl += match trade.side {
                Side::Long => (trade.tp1 - trade.entry) * q1,
                Side::Short => (trade.entry - trade.tp1) * q1,
            };
            pnl -= self.fee(trade.entry * q1) + self.fee(trade.tp1 * q1);
        }

        let effective_exit = if self.settings.be_on_tp1 && q1 > Decimal::ZERO && matches!(reason, CloseReason::Sl) {
            trade.entry
        } else {
            exit_price
        };

        if q2 > Decimal::ZERO {
            pnl += match trade.side {
                Side::Long => (effective_exit - trade.entry) * q2,
                Side::Short => (trade.entry - effective_exit) * q2,
            };
            pnl -= self.fee(trade.entry * q2) + self.fee(effective_exit * q2);
        }

        let pnl_pct = if trade.size_usd.is_zero() {
            Decimal::ZERO
        } else {
            pnl / trade.size_usd * Decimal::from(100)
        };

        let now = Utc::now();
        trade.status = TradeStatus::Closed;
        trade.closed_at = Some(now);
        trade.last_price = exit_price;
        trade.last_update = now;
        trade.realized_pnl_usd = pnl;
        trade.realized_pnl_pct = pnl_pct;

        self.storage.upsert_trade(trade).await?;
        info!(
            symbol = trade.symbol.as_str(),
            reason = reason.as_str(),
            pnl = %pnl,
            pnl_pct = %pnl_pct,
            "trade closed"
        );
        Ok(())
    }

    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary, StorageError> {
        let trades = self.storage.all_trades().await?;

        let mut symbols = std::collections::HashSet::new();
        let mut open_count = 0;
        let mut partial_count = 0;
        let mut closed_count = 0;
        let mut total_pnl = Decimal::ZERO;
        let mut wins = 0;

        for trade in &trades {
            symbols.insert(trade.symbol.as_str().to_string());
            match trade.status {
                TradeStatus::Open => open_count += 1,
                TradeStatus::Partial => partial_count += 1,
                TradeStatus::Closed => {
                    closed_count += 1;
                    total_pnl += trade.pnl_usd;
                    if trade.pnl_usd > Decimal::ZERO {
                        wins += 1;
                    }
                }
            }
        }

        let win_rate_pct = if closed_count == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(wins) / Decimal::from(closed_count) * Decimal::from(100)
        };

        Ok(PortfolioSummary {
            symbols_with_trades: symbols.len(),
            open_count,
            partial_count,
            closed_count,
            total_realized_pnl_usd: total_pnl,
            win_rate_pct,
        })
    }
}
