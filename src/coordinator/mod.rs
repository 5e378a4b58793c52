use std::path::PathBuf;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chart::{ChartGenerator, ChartLevels};
use crate::chat::ChatPort;
use crate::config::RuntimeConfigManager;
use crate::quality;
use crate::sensitivity::Sensitivity;
use crate::simulator::Simulator;
use crate::storage::{DailyCsvWriter, Storage};
use crate::throttle::Throttle;
use crate::types::{Candle, MarketContext, SignalCandidate};

/// The only component that mutates shared state or produces externally
/// observable effects. Every step past the quality/throttle gates
/// is best-effort: a downstream failure never un-admits a candidate.
pub struct Coordinator {
    storage: Storage,
    throttle: Throttle,
    chart: ChartGenerator,
    chat: Box<dyn ChatPort>,
    sensitivity: std::sync::Arc<Sensitivity>,
    config: std::sync::Arc<RuntimeConfigManager>,
    simulator: Simulator,
    csv_writer: DailyCsvWriter,
}

impl Coordinator {
    pub fn new(
        storage: Storage,
        throttle: Throttle,
        chart: ChartGenerator,
        chat: Box<dyn ChatPort>,
        sensitivity: std::sync::Arc<Sensitivity>,
        config: std::sync::Arc<RuntimeConfigManager>,
        simulator: Simulator,
        daily_csv_path: PathBuf,
    ) -> Self {
        Self {
            storage,
            throttle,
            chart,
            chat,
            sensitivity,
            config,
            simulator,
            csv_writer: DailyCsvWriter::new(daily_csv_path),
        }
    }

    fn market_context(candidate: &SignalCandidate) -> MarketContext {
        let mid = candidate.entry_mid();
        MarketContext {
            price: mid,
            rsi: Some(candidate.context.rsi),
            atr_value: candidate.context.atr_pct * mid,
            risk_reward: candidate.context.risk_reward,
            volume_change_pct: candidate.context.volume_ratio - Decimal::ONE,
            spread_pct: Decimal::ZERO,
            liquidity_blocked: false,
            trend_ok: true,
            volume_spike: candidate.context.volume_ratio >= Decimal::new(12, 1),
            success_rate: Decimal::from(100),
        }
    }

    /// Runs a successfully analyzed candidate through every admission gate.
    /// `recent_candles` feeds the chart; callers fetch it from the same
    /// market-data port used by the analyzer.
    pub async fn admit(&self, mut candidate: SignalCandidate, recent_candles: Vec<Candle>) {
        let symbol = candidate.symbol.clone();
        let context = Self::market_context(&candidate);
        let config = self.config.get_config().await;

        let levels = ChartLevels {
            entry: candidate.entry_mid(),
            tp1: candidate.tp_levels[0],
            tp2: candidate.tp_levels[1],
            sl: candidate.stop_loss,
            side: candidate.side,
        };

        let chart_result = self
            .chart
            .render(symbol.as_str(), &recent_candles, &levels)
            .await;
        match chart_result {
            Ok(path) => candidate.chart_path = Some(path),
            Err(e) => {
                info!(symbol = symbol.as_str(), error = %e, code = "chart_render_failed", "rejected");
                return;
            }
        }

        if let Err(reason) = quality::evaluate(&candidate, &context, &config.quality) {
            info!(symbol = symbol.as_str(), code = reason.code(), "rejected");
            return;
        }

        match self.throttle.allow(&symbol, config.quality.throttle_minutes).await {
            Ok(true) => {}
            Ok(false) => {
                info!(symbol = symbol.as_str(), code = "throttle", "rejected");
                return;
            }
            Err(e) => {
                warn!(symbol = symbol.as_str(), error = %e, "throttle check failed; treating as rejected");
                return;
            }
        }

        let now = chrono::Utc::now();

        if let Err(e) = self
            .storage
            .insert_signal(
                &symbol,
                candidate.entry_mid(),
                Decimal::ZERO,
                candidate.context.risk_reward,
                candidate.context.rsi,
                Decimal::ZERO,
                Decimal::ZERO,
                context.volume_spike,
            )
            .await
        {
            warn!(symbol = symbol.as_str(), error = %e, "failed to persist signal");
        }

        if let Err(e) = self.csv_writer.append_row(
            now,
            symbol.as_str(),
            candidate.entry_mid(),
            candidate.context.risk_reward,
            &candidate.context.trend_label,
            candidate.tp_levels[0],
            candidate.tp_levels[1],
            candidate.stop_loss,
        ) {
            warn!(symbol = symbol.as_str(), error = %e, "failed to append daily csv row");
        }

        if let (Some(chat_id), Some(chart_path)) = (&config.chat.default_chat_id, &candidate.chart_path) {
            let caption = format!(
                "{} {} entry {} sl {} tp1 {}",
                candidate.side,
                symbol,
                candidate.entry_mid(),
                candidate.stop_loss,
                candidate.tp_levels[0]
            );
            if !self.chat.send_photo(chat_id, chart_path, &caption).await {
                warn!(symbol = symbol.as_str(), "chat notification failed");
            }
        }

        if let Err(e) = self.simulator.open_trade(&candidate).await {
            warn!(symbol = symbol.as_str(), error = %e, "failed to open paper trade");
        }

        self.sensitivity.record(&symbol, now).await;
        info!(symbol = symbol.as_str(), side = %candidate.side, "admitted");
    }
}
