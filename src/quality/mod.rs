use rust_decimal::Decimal;

use crate::config::QualitySettings;
use crate::types::{MarketContext, RejectionReason, SignalCandidate};

/// Pure boolean admission predicate. Mandatory checks reject on
/// first failure; soft checks are logged by the caller but never block.
pub fn evaluate(
    candidate: &SignalCandidate,
    context: &MarketContext,
    settings: &QualitySettings,
) -> Result<(), RejectionReason> {
    if context.price <= Decimal::ZERO {
        return Err(RejectionReason::QualityPrice);
    }
    if !context.trend_ok {
        return Err(RejectionReason::QualityTrend);
    }
    if let Some(rsi) = context.rsi {
        if rsi < settings.min_rsi || rsi > settings.max_rsi {
            return Err(RejectionReason::QualityRsi);
        }
    }
    if context.risk_reward < settings.min_risk_reward {
        return Err(RejectionReason::QualityRiskReward);
    }
    if context.price.is_zero() || context.atr_value / context.price < settings.min_atr_pct {
        return Err(RejectionReason::QualityAtrPct);
    }
    if context.liquidity_blocked {
        return Err(RejectionReason::QualityLiquidity);
    }
    if context.spread_pct > settings.max_spread_pct {
        return Err(RejectionReason::QualitySpread);
    }
    match &candidate.chart_path {
        Some(path) if std::path::Path::new(path).exists() => {}
        _ => return Err(RejectionReason::QualityChartMissing),
    }

    Ok(())
}

/// Soft signal worth logging but never blocking admission: weak volume
/// spike, or a rolling success rate below the floor.
pub fn soft_warnings(context: &MarketContext, settings: &QualitySettings) -> Vec<String> {
    let mut warnings = Vec::new();
    if !context.volume_spike {
        warnings.push("no volume spike".to_string());
    }
    if context.success_rate < settings.min_success_rate {
        warnings.push(format!(
            "success_rate {} below floor {}",
            context.success_rate, settings.min_success_rate
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, SignalContext, Symbol, TimeFrame};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candidate_with_chart(chart_path: Option<String>) -> SignalCandidate {
        SignalCandidate {
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Long,
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            entry_range: (dec!(110), dec!(110.25)),
            tp_levels: vec![dec!(111), dec!(112), dec!(113)],
            stop_loss: dec!(109),
            leverage: 10,
            strategy: "midterm".into(),
            created_at: Utc::now(),
            chart_path,
            context: SignalContext {
                rsi: dec!(55),
                atr_pct: dec!(0.01),
                volume_ratio: dec!(1.5),
                risk_reward: dec!(1.5),
                swing_high: None,
                swing_low: Some(dec!(109.1)),
                trend_label: "HTF 1h Uptrend".into(),
            },
        }
    }

    fn passing_context() -> MarketContext {
        MarketContext {
            price: dec!(110),
            rsi: Some(dec!(55)),
            atr_value: dec!(1.1),
            risk_reward: dec!(1.5),
            volume_change_pct: dec!(0.4),
            spread_pct: dec!(0.002),
            liquidity_blocked: false,
            trend_ok: true,
            volume_spike: true,
            success_rate: dec!(40),
        }
    }

    #[test]
    fn admits_a_clean_candidate() {
        let candidate = candidate_with_chart(Some("/tmp".to_string()));
        let result = evaluate(&candidate, &passing_context(), &QualitySettings::default());
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_missing_chart() {
        let candidate = candidate_with_chart(None);
        let result = evaluate(&candidate, &passing_context(), &QualitySettings::default());
        assert_eq!(result, Err(RejectionReason::QualityChartMissing));
    }

    #[test]
    fn rejects_rsi_outside_band() {
        let candidate = candidate_with_chart(Some("/tmp".to_string()));
        let mut context = passing_context();
        context.rsi = Some(dec!(85));
        assert_eq!(
            evaluate(&candidate, &context, &QualitySettings::default()),
            Err(RejectionReason::QualityRsi)
        );
    }

    #[test]
    fn rejects_wide_spread() {
        let candidate = candidate_with_chart(Some("/tmp".to_string()));
        let mut context = passing_context();
        context.spread_pct = dec!(0.05);
        assert_eq!(
            evaluate(&candidate, &context, &QualitySettings::default()),
            Err(RejectionReason::QualitySpread)
        );
    }
}
