use thiserror::Error;

use crate::types::RejectionReason;

/// Errors from the injected market-data port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("request to market data provider timed out")]
    Timeout,
    #[error("market data provider returned HTTP {0}")]
    Http(u16),
    #[error("failed to decode market data response: {0}")]
    Decode(String),
}

/// Either a transient fetch failure or a typed rejection from the
/// analyzer. The coordinator treats the two differently: a fetch failure
/// skips this symbol for the tick, a rejection is a structured log line.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("market data fetch failed: {0}")]
    MarketData(#[from] MarketDataError),
    #[error("rejected: {0}")]
    Rejected(RejectionReason),
}

/// Errors from chart rendering. The coordinator treats any of these as
/// "null path", never a partial file on disk.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no candle data available to render")]
    NoData,
    #[error("failed to write chart file: {0}")]
    Io(String),
    #[error("chart renderer failed: {0}")]
    Render(String),
}

/// Errors from the persistent throttle store.
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("failed to read or write throttle state: {0}")]
    Io(String),
    #[error("throttle state file is corrupt: {0}")]
    Corrupt(String),
}

/// Errors from the storage port (signals/trades/CSV).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to storage: {0}")]
    Connect(String),
    #[error("storage query failed: {0}")]
    Query(String),
}
