use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::StorageError;
use crate::types::{Side, Symbol, Trade, TradeRecord, TradeStatus};

/// Durable signal/trade store. An embedded SQLite database with
/// write-ahead logging: concurrent readers, serialized writers.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Connect(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        let storage = Self { pool };
        storage.create_schema().await?;
        Ok(storage)
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                price TEXT NOT NULL,
                volume TEXT NOT NULL,
                score TEXT NOT NULL,
                rsi TEXT NOT NULL,
                macd TEXT NOT NULL,
                macd_sig TEXT NOT NULL,
                volume_spike INTEGER NOT NULL,
                ts_utc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                entry TEXT NOT NULL,
                size TEXT NOT NULL,
                qty TEXT NOT NULL,
                tp1 TEXT NOT NULL,
                tp2 TEXT NOT NULL,
                sl TEXT NOT NULL,
                filled_tp1_qty TEXT NOT NULL,
                status TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                pnl_usd TEXT NOT NULL,
                pnl_pct TEXT NOT NULL,
                last_price TEXT NOT NULL,
                last_update TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_symbol_status ON trades(symbol, status)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        info!("storage schema ready");
        Ok(())
    }

    pub async fn insert_signal(
        &self,
        symbol: &Symbol,
        price: Decimal,
        volume: Decimal,
        score: Decimal,
        rsi: Decimal,
        macd: Decimal,
        macd_signal: Decimal,
        volume_spike: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO signals (symbol, price, volume, score, rsi, macd, macd_sig, volume_spike, ts_utc)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(symbol.as_str())
        .bind(price.to_string())
        .bind(volume.to_string())
        .bind(score.to_string())
        .bind(rsi.to_string())
        .bind(macd.to_string())
        .bind(macd_signal.to_string())
        .bind(volume_spike as i32)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    /// Upserts the full row for a trade: called on open and on every tick
    /// update, so a single statement covers both insert and mutation.
    pub async fn upsert_trade(&self, trade: &Trade) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO trades
                (id, symbol, side, entry, size, qty, tp1, tp2, sl, filled_tp1_qty,
                 status, opened_at, closed_at, pnl_usd, pnl_pct, last_price, last_update)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filled_tp1_qty = excluded.filled_tp1_qty,
                status = excluded.status,
                closed_at = excluded.closed_at,
                pnl_usd = excluded.pnl_usd,
                pnl_pct = excluded.pnl_pct,
                last_price = excluded.last_price,
                last_update = excluded.last_update
            "#,
        )
        .bind(&trade.id)
        .bind(trade.symbol.as_str())
        .bind(trade.side.as_str())
        .bind(trade.entry.to_string())
        .bind(trade.size_usd.to_string())
        .bind(trade.qty.to_string())
        .bind(trade.tp1.to_string())
        .bind(trade.tp2.to_string())
        .bind(trade.sl.to_string())
        .bind(trade.filled_tp1_qty.to_string())
        .bind(trade.status.as_str())
        .bind(trade.opened_at.to_rfc3339())
        .bind(trade.closed_at.map(|t| t.to_rfc3339()))
        .bind(trade.realized_pnl_usd.to_string())
        .bind(trade.realized_pnl_pct.to_string())
        .bind(trade.last_price.to_string())
        .bind(trade.last_update.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    /// All non-closed trades for a symbol, normally at most one, but the
    /// query doesn't assume it so a violated invariant surfaces loudly.
    pub async fn open_trades_for_symbol(&self, symbol: &Symbol) -> Result<Vec<Trade>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM trades WHERE symbol = ? AND status != 'CLOSED'",
        )
        .bind(symbol.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(row_to_trade).collect()
    }

    pub async fn all_trades(&self) -> Result<Vec<TradeRecord>, StorageError> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY opened_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(row_to_trade)
            .map(|r| r.map(trade_to_record))
            .collect()
    }
}

fn dec(s: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(s).map_err(|e| StorageError::Query(format!("bad decimal {s:?}: {e}")))
}

fn row_to_trade(row: &sqlx::sqlite::SqliteRow) -> Result<Trade, StorageError> {
    let side = match row.get::<String, _>("side").as_str() {
        "LONG" => Side::Long,
        "SHORT" => Side::Short,
        other => return Err(StorageError::Query(format!("unknown side {other:?}"))),
    };
    let status = TradeStatus::parse(&row.get::<String, _>("status"))
        .ok_or_else(|| StorageError::Query("unknown trade status".into()))?;

    let closed_at: Option<String> = row.get("closed_at");
    let closed_at = closed_at
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| StorageError::Query(e.to_string()))
        })
        .transpose()?;

    let opened_at = chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("opened_at"))
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(e.to_string()))?;
    let last_update = chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("last_update"))
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(e.to_string()))?;

    Ok(Trade {
        id: row.get("id"),
        symbol: Symbol::new(row.get::<String, _>("symbol")),
        side,
        entry: dec(&row.get::<String, _>("entry"))?,
        size_usd: dec(&row.get::<String, _>("size"))?,
        qty: dec(&row.get::<String, _>("qty"))?,
        tp1: dec(&row.get::<String, _>("tp1"))?,
        tp2: dec(&row.get::<String, _>("tp2"))?,
        sl: dec(&row.get::<String, _>("sl"))?,
        filled_tp1_qty: dec(&row.get::<String, _>("filled_tp1_qty"))?,
        status,
        opened_at,
        closed_at,
        realized_pnl_usd: dec(&row.get::<String, _>("pnl_usd"))?,
        realized_pnl_pct: dec(&row.get::<String, _>("pnl_pct"))?,
        last_price: dec(&row.get::<String, _>("last_price"))?,
        last_update,
    })
}

fn trade_to_record(t: Trade) -> TradeRecord {
    TradeRecord {
        id: t.id,
        symbol: t.symbol,
        side: t.side,
        entry: t.entry,
        size: t.size_usd,
        qty: t.qty,
        tp1: t.tp1,
        tp2: t.tp2,
        sl: t.sl,
        filled_tp1_qty: t.filled_tp1_qty,
        status: t.status,
        opened_at: t.opened_at,
        closed_at: t.closed_at,
        pnl_usd: t.realized_pnl_usd,
        pnl_pct: t.realized_pnl_pct,
        last_price: t.last_price,
        last_update: t.last_update,
    }
}

pub mod csv_report;
pub use csv_report::DailyCsvWriter;
