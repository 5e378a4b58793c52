use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::types::Symbol;

/// Tracks the last admission time per symbol, in-process only. The
/// analyzer reads `hours_since_last` to decide whether
/// to relax ATR/volume thresholds; only the coordinator ever writes, via
/// `record`, after throttle has already accepted the symbol.
#[derive(Default)]
pub struct Sensitivity {
    last_admitted: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Sensitivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hours since the last admission for `symbol`, or `None` if it has never
    /// been admitted (treated as "starved" by the analyzer).
    pub async fn hours_since_last(&self, symbol: &Symbol) -> Option<Decimal> {
        let map = self.last_admitted.read().await;
        map.get(symbol.as_str()).map(|last| {
            let seconds = Utc::now().signed_duration_since(*last).num_seconds().max(0);
            Decimal::from(seconds) / Decimal::from(3600)
        })
    }

    pub async fn record(&self, symbol: &Symbol, now: DateTime<Utc>) {
        self.last_admitted.write().await.insert(symbol.as_str().to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseen_symbol_has_no_history() {
        let sensitivity = Sensitivity::new();
        assert_eq!(sensitivity.hours_since_last(&Symbol::new("BTCUSDT")).await, None);
    }

    #[tokio::test]
    async fn record_resets_the_clock_to_near_zero() {
        let sensitivity = Sensitivity::new();
        let symbol = Symbol::new("BTCUSDT");
        sensitivity.record(&symbol, Utc::now()).await;
        let hours = sensitivity.hours_since_last(&symbol).await.unwrap();
        assert!(hours < Decimal::new(1, 2)); // < 0.01h
    }
}
