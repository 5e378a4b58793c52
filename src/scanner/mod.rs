use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::analyzer::{self, AnalyzerRequest};
use crate::coordinator::Coordinator;
use crate::engine::EngineController;
use crate::market::MarketDataPort;
use crate::sensitivity::Sensitivity;
use crate::types::{Symbol, TimeFrame};

/// Drives the periodic, bounded-concurrent scan over the universe.
/// Owns the process's only timer; cancellation is cooperative via
/// [`EngineController::should_scan`].
pub struct Scanner {
    universe: Vec<Symbol>,
    base_timeframe: TimeFrame,
    htf_timeframe: TimeFrame,
    scan_period: Duration,
    concurrency_limit: usize,
    per_symbol_min_gap: Duration,
    leverage: u32,
    strategy_tag: String,
}

impl Scanner {
    pub fn new(
        universe: Vec<Symbol>,
        base_timeframe: TimeFrame,
        htf_timeframe: TimeFrame,
        scan_period: Duration,
        concurrency_limit: usize,
        per_symbol_min_gap: Duration,
    ) -> Self {
        Self {
            universe,
            base_timeframe,
            htf_timeframe,
            scan_period,
            concurrency_limit,
            per_symbol_min_gap,
            leverage: 10,
            strategy_tag: "midterm".to_string(),
        }
    }

    /// Runs the scan loop until `controller.should_scan()` turns false across
    /// a tick boundary. Each tick's analyzer tasks run on a
    /// `tokio::sync::Semaphore`-bounded pool of `concurrency_limit` permits.
    pub async fn run(
        &self,
        market: Arc<dyn MarketDataPort>,
        sensitivity: Arc<Sensitivity>,
        coordinator: Arc<Coordinator>,
        controller: Arc<EngineController>,
        starvation_window_hours: rust_decimal::Decimal,
    ) {
        while controller.should_scan() {
            let t0 = Utc::now();
            self.tick(&market, &sensitivity, &coordinator, starvation_window_hours).await;

            let elapsed = (Utc::now() - t0).num_milliseconds().max(0) as u64;
            let sleep_for = self.scan_period.saturating_sub(Duration::from_millis(elapsed));
            if sleep_for > Duration::ZERO {
                tokio::time::sleep(sleep_for).await;
            }
        }
    }

    pub(crate) async fn tick(
        &self,
        market: &Arc<dyn MarketDataPort>,
        sensitivity: &Arc<Sensitivity>,
        coordinator: &Arc<Coordinator>,
        starvation_window_hours: rust_decimal::Decimal,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut handles = Vec::with_capacity(self.universe.len());

        for symbol in &self.universe {
            if self.within_min_gap(symbol, sensitivity.as_ref()).await {
                continue;
            }

            let permit = semaphore.clone();
            let market = market.clone();
            let sensitivity = sensitivity.clone();
            let coordinator = coordinator.clone();
            let symbol = symbol.clone();
            let base_timeframe = self.base_timeframe;
            let htf_timeframe = self.htf_timeframe;
            let leverage = self.leverage;
            let strategy_tag = self.strategy_tag.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                let request = AnalyzerRequest {
                    symbol: &symbol,
                    base_timeframe,
                    htf_timeframe,
                    leverage,
                    strategy_tag: &strategy_tag,
                };
                match analyzer::analyze(market.as_ref(), sensitivity.as_ref(), starvation_window_hours, request).await {
                    Ok(output) => coordinator.admit(output.candidate, output.recent_candles).await,
                    Err(e) => debug!(symbol = symbol.as_str(), error = %e, "analyzer pass produced no candidate"),
                }
            }));
        }

        for (symbol, handle) in self.universe.iter().zip(handles) {
            if let Err(e) = handle.await {
                warn!(symbol = symbol.as_str(), error = %e, "analyzer task panicked");
            }
        }
    }

    /// Skips a symbol whose last admission is more recent than
    /// `per_symbol_min_gap`. Consults the same last-admit clock the
    /// analyzer's adaptive sensitivity gate reads: a symbol never admitted
    /// is never gapped.
    async fn within_min_gap(&self, symbol: &Symbol, sensitivity: &Sensitivity) -> bool {
        match sensitivity.hours_since_last(symbol).await {
            Some(hours) => {
                let gap_hours = Decimal::from(self.per_symbol_min_gap.as_secs()) / Decimal::from(3600);
                hours < gap_hours
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::fixtures::RecordingChat;
    use crate::chart::ChartGenerator;
    use crate::coordinator::Coordinator;
    use crate::market::fixtures::StubMarketData;
    use crate::quality::evaluate as _;
    use crate::throttle::Throttle;
    use crate::config::{EngineConfig, RuntimeConfigManager};
    use crate::storage::Storage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMarket {
        inner: StubMarketData,
        concurrent: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl MarketDataPort for CountingMarket {
        async fn get_klines(
            &self,
            symbol: &str,
            interval: TimeFrame,
            limit: u32,
        ) -> Result<Vec<crate::types::Candle>, crate::error::MarketDataError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = self.inner.get_klines(symbol, interval, limit).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn get_exchange_info(&self) -> Result<Vec<crate::types::SymbolInfo>, crate::error::MarketDataError> {
            self.inner.get_exchange_info().await
        }

        async fn get_server_time(&self) -> Result<u64, crate::error::MarketDataError> {
            self.inner.get_server_time().await
        }
    }

    async fn test_coordinator() -> Arc<Coordinator> {
        let dir = std::env::temp_dir().join(format!("scanner_test_{}", uuid::Uuid::new_v4()));
        let db_path = dir.join("trades.db");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let storage = Storage::connect(&format!("sqlite://{}", db_path.display())).await.unwrap();
        let throttle = Throttle::load(dir.join("throttle.json")).await.unwrap();
        let chart = ChartGenerator::new(dir.join("charts"));
        let chat = RecordingChat::default();
        let sensitivity = Arc::new(Sensitivity::new());
        let manager = RuntimeConfigManager::new(EngineConfig::default());
        let simulator = crate::simulator::Simulator::new(storage.clone(), EngineConfig::default().simulator);
        Arc::new(Coordinator::new(
            storage,
            throttle,
            chart,
            Box::new(chat),
            sensitivity,
            Arc::new(manager),
            simulator,
            dir.join("signals.csv"),
        ))
    }

    #[tokio::test]
    async fn never_exceeds_the_configured_concurrency_limit() {
        let mut inner = StubMarketData::default();
        for i in 0..6 {
            let symbol = format!("SYM{i}USDT");
            let flat = StubMarketData::with_flat_series(&symbol, TimeFrame::M15, 5, rust_decimal::Decimal::from(100));
            let htf = StubMarketData::with_flat_series(&symbol, TimeFrame::H1, 5, rust_decimal::Decimal::from(100));
            inner.klines.extend(flat.klines);
            inner.klines.extend(htf.klines);
        }

        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let market: Arc<dyn MarketDataPort> = Arc::new(CountingMarket {
            inner,
            concurrent,
            max_seen: max_seen.clone(),
        });

        let universe: Vec<Symbol> = (0..6).map(|i| Symbol::new(format!("SYM{i}USDT"))).collect();
        let scanner = Scanner::new(universe, TimeFrame::M15, TimeFrame::H1, Duration::from_secs(60), 2, Duration::from_secs(0));

        let sensitivity = Arc::new(Sensitivity::new());
        let coordinator = test_coordinator().await;
        scanner.tick(&market, &sensitivity, &coordinator, rust_decimal::Decimal::from(4)).await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
