use std::time::Duration;

use config::{Config, Environment};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::types::TimeFrame;

/// Flat view of every environment key this engine understands, read
/// once through the `config` crate's `Environment` source. Every field is a
/// string so a missing or malformed value can be reported with a precise
/// message instead of failing deserialization silently.
#[derive(Debug, Deserialize, Default)]
struct RawEnv {
    timeframe: Option<String>,
    htf_timeframe: Option<String>,
    scan_interval_seconds: Option<String>,
    scan_concurrency: Option<String>,
    symbol_interval_minutes: Option<String>,
    throttle_minutes: Option<String>,
    min_risk_reward: Option<String>,
    min_atr_pct: Option<String>,
    min_volume_ratio: Option<String>,
    min_rsi: Option<String>,
    max_rsi: Option<String>,
    max_spread_pct: Option<String>,
    volume_spike_threshold: Option<String>,
    min_success_rate: Option<String>,
    sim_equity_usd: Option<String>,
    sim_risk_per_trade_pct: Option<String>,
    sim_tp1_ratio_qty: Option<String>,
    sim_fee_bps: Option<String>,
    sim_be_on_tp1: Option<String>,
    daily_report_hour: Option<String>,
    daily_report_minute: Option<String>,
    symbols: Option<String>,
    charts_dir: Option<String>,
    throttle_state_path: Option<String>,
    database_url: Option<String>,
    daily_csv_path: Option<String>,
    starvation_window_hours: Option<String>,
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    control_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub base_timeframe: TimeFrame,
    pub htf_timeframe: TimeFrame,
    pub scan_interval_seconds: u64,
    pub concurrency: usize,
    pub per_symbol_min_gap: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            scan_interval_seconds: 60,
            concurrency: 3,
            per_symbol_min_gap: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualitySettings {
    pub throttle_minutes: i64,
    pub min_risk_reward: Decimal,
    pub min_atr_pct: Decimal,
    pub min_volume_ratio: Decimal,
    pub min_rsi: Decimal,
    pub max_rsi: Decimal,
    pub max_spread_pct: Decimal,
    pub volume_spike_threshold: Decimal,
    pub min_success_rate: Decimal,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            throttle_minutes: 5,
            min_risk_reward: dec!(1.2),
            min_atr_pct: Decimal::new(75, 6), // 7.5e-5
            min_volume_ratio: dec!(1.2),
            min_rsi: dec!(30),
            max_rsi: dec!(70),
            max_spread_pct: dec!(0.01),
            volume_spike_threshold: dec!(1.2),
            min_success_rate: dec!(25),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    pub equity_usd: Decimal,
    pub risk_pct: Decimal,
    pub tp1_ratio_qty: Decimal,
    pub fee_bps: Decimal,
    pub be_on_tp1: bool,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            equity_usd: dec!(10000),
            risk_pct: dec!(1.0),
            tp1_ratio_qty: dec!(0.5),
            fee_bps: dec!(8),
            be_on_tp1: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub daily_report_hour: u32,
    pub daily_report_minute: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            daily_report_hour: 23,
            daily_report_minute: 59,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub bot_token: Option<String>,
    pub default_chat_id: Option<String>,
    pub control_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scan: ScanSettings,
    pub quality: QualitySettings,
    pub simulator: SimulatorSettings,
    pub report: ReportSettings,
    pub chat: ChatSettings,
    pub symbols: Option<Vec<String>>,
    pub charts_dir: String,
    pub throttle_state_path: String,
    pub database_url: String,
    pub daily_csv_path: String,
    pub starvation_window_hours: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            quality: QualitySettings::default(),
            simulator: SimulatorSettings::default(),
            report: ReportSettings::default(),
            chat: ChatSettings::default(),
            symbols: None,
            charts_dir: "./charts".into(),
            throttle_state_path: "./signal_throttle.json".into(),
            database_url: "sqlite://trading_signals.db".into(),
            daily_csv_path: "./signals.csv".into(),
            starvation_window_hours: dec!(4),
        }
    }
}

fn parse_field<T: std::str::FromStr>(
    raw: &Option<String>,
    name: &str,
    default: T,
    errors: &mut Vec<String>,
) -> T {
    match raw {
        None => default,
        Some(s) => s.parse::<T>().unwrap_or_else(|_| {
            errors.push(format!("{name}: could not parse {s:?}"));
            default
        }),
    }
}

fn parse_timeframe(raw: &Option<String>, name: &str, default: TimeFrame, errors: &mut Vec<String>) -> TimeFrame {
    match raw {
        None => default,
        Some(s) => TimeFrame::parse(s).unwrap_or_else(|| {
            errors.push(format!("{name}: {s:?} is not one of 15m, 30m, 1h"));
            default
        }),
    }
}

impl EngineConfig {
    /// Assembles configuration from process environment variables (optionally
    /// preceded by a `.env` file loaded via `dotenvy` in `main`), returning
    /// every parse error at once rather than failing on the first.
    pub fn from_env() -> Result<Self, Vec<String>> {
        let raw: RawEnv = Config::builder()
            .add_source(Environment::default())
            .build()
            .map_err(|e| vec![format!("failed to read environment: {e}")])?
            .try_deserialize()
            .unwrap_or_default();

        let mut errors = Vec::new();
        let defaults = EngineConfig::default();

        let scan = ScanSettings {
            base_timeframe: parse_timeframe(&raw.timeframe, "TIMEFRAME", defaults.scan.base_timeframe, &mut errors),
            htf_timeframe: parse_timeframe(
                &raw.htf_timeframe,
                "HTF_TIMEFRAME",
                defaults.scan.htf_timeframe,
                &mut errors,
            ),
            scan_interval_seconds: parse_field(
                &raw.scan_interval_seconds,
                "SCAN_INTERVAL_SECONDS",
                defaults.scan.scan_interval_seconds,
                &mut errors,
            ),
            concurrency: parse_field(&raw.scan_concurrency, "SCAN_CONCURRENCY", defaults.scan.concurrency, &mut errors),
            per_symbol_min_gap: Duration::from_secs(
                parse_field(&raw.symbol_interval_minutes, "SYMBOL_INTERVAL_MINUTES", 5u64, &mut errors) * 60,
            ),
        };

        let quality = QualitySettings {
            throttle_minutes: parse_field(&raw.throttle_minutes, "THROTTLE_MINUTES", defaults.quality.throttle_minutes, &mut errors),
            min_risk_reward: parse_field(&raw.min_risk_reward, "MIN_RISK_REWARD", defaults.quality.min_risk_reward, &mut errors),
            min_atr_pct: parse_field(&raw.min_atr_pct, "MIN_ATR_PCT", defaults.quality.min_atr_pct, &mut errors),
            min_volume_ratio: parse_field(&raw.min_volume_ratio, "MIN_VOLUME_RATIO", defaults.quality.min_volume_ratio, &mut errors),
            min_rsi: parse_field(&raw.min_rsi, "MIN_RSI", defaults.quality.min_rsi, &mut errors),
            max_rsi: parse_field(&raw.max_rsi, "MAX_RSI", defaults.quality.max_rsi, &mut errors),
            max_spread_pct: parse_field(&raw.max_spread_pct, "MAX_SPREAD_PCT", defaults.quality.max_spread_pct, &mut errors),
            volume_spike_threshold: parse_field(
                &raw.volume_spike_threshold,
                "VOLUME_SPIKE_THRESHOLD",
                defaults.quality.volume_spike_threshold,
                &mut errors,
            ),
            min_success_rate: parse_field(&raw.min_success_rate, "MIN_SUCCESS_RATE", defaults.quality.min_success_rate, &mut errors),
        };

        let simulator = SimulatorSettings {
            equity_usd: parse_field(&raw.sim_equity_usd, "SIM_EQUITY_USD", defaults.simulator.equity_usd, &mut errors),
            risk_pct: parse_field(&raw.sim_risk_per_trade_pct, "SIM_RISK_PER_TRADE_PCT", defaults.simulator.risk_pct, &mut errors),
            tp1_ratio_qty: parse_field(&raw.sim_tp1_ratio_qty, "SIM_TP1_RATIO_QTY", defaults.simulator.tp1_ratio_qty, &mut errors),
            fee_bps: parse_field(&raw.sim_fee_bps, "SIM_FEE_BPS", defaults.simulator.fee_bps, &mut errors),
            be_on_tp1: raw
                .sim_be_on_tp1
                .as_deref()
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.simulator.be_on_tp1),
        };

        let report = ReportSettings {
            daily_report_hour: parse_field(&raw.daily_report_hour, "DAILY_REPORT_HOUR", defaults.report.daily_report_hour, &mut errors),
            daily_report_minute: parse_field(
                &raw.daily_report_minute,
                "DAILY_REPORT_MINUTE",
                defaults.report.daily_report_minute,
                &mut errors,
            ),
        };

        let chat = ChatSettings {
            bot_token: raw.telegram_bot_token.clone(),
            default_chat_id: raw.telegram_chat_id.clone(),
            control_user_id: raw.control_user_id.clone(),
        };

        let symbols = raw.symbols.as_ref().map(|s| {
            s.split(',')
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        });

        let config = EngineConfig {
            scan,
            quality,
            simulator,
            report,
            chat,
            symbols,
            charts_dir: raw.charts_dir.unwrap_or(defaults.charts_dir),
            throttle_state_path: raw.throttle_state_path.unwrap_or(defaults.throttle_state_path),
            database_url: raw.database_url.unwrap_or(defaults.database_url),
            daily_csv_path: raw.daily_csv_path.unwrap_or(defaults.daily_csv_path),
            starvation_window_hours: parse_field(
                &raw.starvation_window_hours,
                "STARVATION_WINDOW_HOURS",
                defaults.starvation_window_hours,
                &mut errors,
            ),
        };

        if let Err(mut validation_errors) = config.validate() {
            errors.append(&mut validation_errors);
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.scan.scan_interval_seconds < 30 {
            errors.push("SCAN_INTERVAL_SECONDS must be >= 30".to_string());
        }
        if self.scan.concurrency == 0 {
            errors.push("SCAN_CONCURRENCY must be > 0".to_string());
        }
        if self.quality.throttle_minutes < 0 {
            errors.push("THROTTLE_MINUTES must be >= 0".to_string());
        }
        if self.simulator.risk_pct <= Decimal::ZERO || self.simulator.risk_pct > dec!(100) {
            errors.push("SIM_RISK_PER_TRADE_PCT must be in (0, 100]".to_string());
        }
        if self.simulator.tp1_ratio_qty <= Decimal::ZERO || self.simulator.tp1_ratio_qty > Decimal::ONE {
            errors.push("SIM_TP1_RATIO_QTY must be in (0, 1]".to_string());
        }
        if self.simulator.equity_usd <= Decimal::ZERO {
            errors.push("SIM_EQUITY_USD must be > 0".to_string());
        }
        if self.starvation_window_hours <= Decimal::ZERO {
            errors.push("STARVATION_WINDOW_HOURS must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_risk_pct() {
        let mut cfg = EngineConfig::default();
        cfg.simulator.risk_pct = dec!(150);
        cfg.simulator.tp1_ratio_qty = dec!(1.5);
        cfg.scan.scan_interval_seconds = 10;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("SIM_RISK_PER_TRADE_PCT")));
        assert!(errors.iter().any(|e| e.contains("SIM_TP1_RATIO_QTY")));
        assert!(errors.iter().any(|e| e.contains("SCAN_INTERVAL_SECONDS")));
    }
}
