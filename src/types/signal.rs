use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Side, Symbol, TimeFrame};

/// Trend classification produced from the higher timeframe in the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

impl Trend {
    pub fn label(&self, htf: TimeFrame) -> String {
        match self {
            Trend::Up => format!("HTF {} Uptrend", htf),
            Trend::Down => format!("HTF {} Downtrend", htf),
            Trend::Sideways => format!("HTF {} Sideways", htf),
        }
    }
}

/// Additional derived features carried alongside a candidate, read by the
/// quality filter and persisted with the signal row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContext {
    pub rsi: Decimal,
    pub atr_pct: Decimal,
    pub volume_ratio: Decimal,
    pub risk_reward: Decimal,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
    pub trend_label: String,
}

/// An immutable candidate produced by the analyzer. `chart_path` starts unset
/// and is filled in exactly once, by the admission coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub symbol: Symbol,
    pub side: Side,
    pub base_timeframe: TimeFrame,
    pub htf_timeframe: TimeFrame,
    pub entry_range: (Decimal, Decimal),
    pub tp_levels: Vec<Decimal>,
    pub stop_loss: Decimal,
    pub leverage: u32,
    pub strategy: String,
    pub created_at: DateTime<Utc>,
    pub chart_path: Option<String>,
    pub context: SignalContext,
}

impl SignalCandidate {
    pub fn entry_mid(&self) -> Decimal {
        (self.entry_range.0 + self.entry_range.1) / Decimal::from(2)
    }

    /// True iff stop/targets are monotonic in the trade direction.
    pub fn is_well_formed(&self) -> bool {
        let mid = self.entry_mid();
        if self.entry_range.0 > self.entry_range.1 {
            return false;
        }
        if self.tp_levels.len() < 2 || self.tp_levels.len() > 3 {
            return false;
        }
        match self.side {
            Side::Long => {
                self.stop_loss < self.entry_range.0
                    && mid < self.tp_levels[0]
                    && self.tp_levels.windows(2).all(|w| w[0] < w[1])
            }
            Side::Short => {
                self.stop_loss > self.entry_range.1
                    && mid > self.tp_levels[0]
                    && self.tp_levels.windows(2).all(|w| w[0] > w[1])
            }
        }
    }
}

/// Computed at the start of admission; feeds the quality filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub price: Decimal,
    pub rsi: Option<Decimal>,
    pub atr_value: Decimal,
    pub risk_reward: Decimal,
    pub volume_change_pct: Decimal,
    pub spread_pct: Decimal,
    pub liquidity_blocked: bool,
    pub trend_ok: bool,
    pub volume_spike: bool,
    pub success_rate: Decimal,
}

/// Typed rejection reasons, covering both the analyzer and the downstream
/// admission gates. Kept as one enum so operator-facing logs and the
/// `health`/`testsignal` CLI surface can match on a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    NoHtfTrend,
    InsufficientHistory,
    AtrBand,
    Volume,
    Structure,
    SwingMissing,
    QualityPrice,
    QualityTrend,
    QualityRsi,
    QualityRiskReward,
    QualityAtrPct,
    QualityLiquidity,
    QualitySpread,
    QualityChartMissing,
    ChartRenderFailed,
    Throttled,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::NoHtfTrend => "no_htf_trend",
            RejectionReason::InsufficientHistory => "insufficient_history",
            RejectionReason::AtrBand => "atr_band",
            RejectionReason::Volume => "volume",
            RejectionReason::Structure => "structure",
            RejectionReason::SwingMissing => "swing_missing",
            RejectionReason::QualityPrice => "quality_price",
            RejectionReason::QualityTrend => "quality_trend",
            RejectionReason::QualityRsi => "quality_rsi",
            RejectionReason::QualityRiskReward => "quality_risk_reward",
            RejectionReason::QualityAtrPct => "quality_atr_pct",
            RejectionReason::QualityLiquidity => "quality_liquidity",
            RejectionReason::QualitySpread => "quality_spread",
            RejectionReason::QualityChartMissing => "quality_chart_missing",
            RejectionReason::ChartRenderFailed => "chart_render_failed",
            RejectionReason::Throttled => "throttle",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_candidate() -> SignalCandidate {
        SignalCandidate {
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            entry_range: (dec!(110.075), dec!(110.325)),
            tp_levels: vec![dec!(111.5), dec!(112.5), dec!(113.5)],
            stop_loss: dec!(109.0),
            leverage: 10,
            strategy: "midterm".into(),
            created_at: Utc::now(),
            chart_path: None,
            context: SignalContext {
                rsi: dec!(55),
                atr_pct: dec!(0.01),
                volume_ratio: dec!(1.4),
                risk_reward: dec!(1.5),
                swing_high: None,
                swing_low: Some(dec!(109.25)),
                trend_label: "HTF 1h Uptrend".into(),
            },
        }
    }

    #[test]
    fn well_formed_long_candidate_passes() {
        assert!(long_candidate().is_well_formed());
    }

    #[test]
    fn stop_on_wrong_side_is_malformed() {
        let mut c = long_candidate();
        c.stop_loss = dec!(110.2);
        assert!(!c.is_well_formed());
    }
}
