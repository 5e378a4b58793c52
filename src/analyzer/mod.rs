use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::AnalyzerError;
use crate::indicators::{atr_series, ema_series, find_last_swing, rolling_mean, rsi_last};
use crate::market::MarketDataPort;
use crate::sensitivity::Sensitivity;
use crate::types::{Candle, RejectionReason, Side, SignalCandidate, SignalContext, Symbol, TimeFrame, Trend};

const MIN_USABLE_CANDLES: usize = 60;
const FETCH_LIMIT: u32 = 150;
const SWING_LOOKBACK: usize = 40;

const ATR_BAND_STRICT: (Decimal, Decimal) = (dec!(0.6), dec!(1.8));
const ATR_BAND_ADAPTIVE: (Decimal, Decimal) = (dec!(0.5), dec!(2.0));
const VOLUME_RATIO_STRICT: Decimal = dec!(1.5);
const VOLUME_RATIO_ADAPTIVE: Decimal = dec!(1.2);

/// Inputs to one analyzer pass. Produced fresh per scanner tick, per symbol.
pub struct AnalyzerRequest<'a> {
    pub symbol: &'a Symbol,
    pub base_timeframe: TimeFrame,
    pub htf_timeframe: TimeFrame,
    pub leverage: u32,
    pub strategy_tag: &'a str,
}

fn series(candles: &[Candle], f: impl Fn(&Candle) -> Decimal) -> Vec<Decimal> {
    candles.iter().map(f).collect()
}

fn classify_trend(close: Decimal, ema20: Decimal, ema50: Decimal, ema100: Decimal) -> Trend {
    if close > ema20 && ema20 > ema50 && ema50 > ema100 {
        Trend::Up
    } else if close < ema20 && ema20 < ema50 && ema50 < ema100 {
        Trend::Down
    } else {
        Trend::Sideways
    }
}

/// A candidate together with the base-timeframe window the coordinator
/// hands to the chart generator: the analyzer is the only component that
/// has already fetched the candles, so it carries them forward rather than
/// making the coordinator fetch again.
pub struct AnalyzerOutput {
    pub candidate: SignalCandidate,
    pub recent_candles: Vec<Candle>,
}

const CHART_WINDOW: usize = 50;

/// Runs the full multi-timeframe pipeline for one symbol and produces at
/// most one candidate, or a typed rejection reason.
pub async fn analyze(
    market: &dyn MarketDataPort,
    sensitivity: &Sensitivity,
    starvation_window_hours: Decimal,
    request: AnalyzerRequest<'_>,
) -> Result<AnalyzerOutput, AnalyzerError> {
    let base_candles = market
        .get_klines(request.symbol.as_str(), request.base_timeframe, FETCH_LIMIT)
        .await?;
    let htf_candles = market
        .get_klines(request.symbol.as_str(), request.htf_timeframe, FETCH_LIMIT)
        .await?;

    if base_candles.len() < MIN_USABLE_CANDLES || htf_candles.len() < MIN_USABLE_CANDLES {
        return Err(AnalyzerError::Rejected(RejectionReason::InsufficientHistory));
    }

    // --- higher-timeframe trend classification ---
    let htf_closes = series(&htf_candles, |c| c.close);
    let htf_ema20 = ema_series(&htf_closes, 20);
    let htf_ema50 = ema_series(&htf_closes, 50);
    let htf_ema100 = ema_series(&htf_closes, 100);

    let (Some(ema20_now), Some(ema50_now), Some(ema100_now)) =
        (htf_ema20.last(), htf_ema50.last(), htf_ema100.last())
    else {
        return Err(AnalyzerError::Rejected(RejectionReason::InsufficientHistory));
    };
    let htf_close_now = *htf_closes.last().unwrap();
    let trend = classify_trend(htf_close_now, *ema20_now, *ema50_now, *ema100_now);
    if matches!(trend, Trend::Sideways) {
        return Err(AnalyzerError::Rejected(RejectionReason::NoHtfTrend));
    }

    // --- base-timeframe features ---
    let base_closes = series(&base_candles, |c| c.close);
    let base_highs = series(&base_candles, |c| c.high);
    let base_lows = series(&base_candles, |c| c.low);
    let base_volumes = series(&base_candles, |c| c.volume);

    let base_ema20 = ema_series(&base_closes, 20);
    let atr14 = atr_series(&base_highs, &base_lows, &base_closes, 14)
        .ok_or(AnalyzerError::Rejected(RejectionReason::InsufficientHistory))?;
    let vol_ma20 = rolling_mean(&base_volumes, 20).unwrap_or(Decimal::ZERO);
    let rsi14 = rsi_last(&base_closes, 14);

    let (Some(ema20_base_now), Some(atr_now)) = (base_ema20.last(), atr14.last()) else {
        return Err(AnalyzerError::Rejected(RejectionReason::InsufficientHistory));
    };

    // --- adaptive sensitivity gate ---
    let hours_since_last = sensitivity.hours_since_last(request.symbol).await;
    let starved = hours_since_last.map(|h| h > starvation_window_hours).unwrap_or(true);
    let (atr_min_factor, atr_max_factor) = if starved { ATR_BAND_ADAPTIVE } else { ATR_BAND_STRICT };
    let volume_threshold = if starved { VOLUME_RATIO_ADAPTIVE } else { VOLUME_RATIO_STRICT };

    // --- ATR band ---
    if atr14.len() < 100 {
        return Err(AnalyzerError::Rejected(RejectionReason::InsufficientHistory));
    }
    let mean100_atr = rolling_mean(&atr14, 100).unwrap_or(*atr_now);
    if mean100_atr.is_zero() {
        return Err(AnalyzerError::Rejected(RejectionReason::AtrBand));
    }
    let atr_floor = atr_min_factor * mean100_atr;
    let atr_ceiling = atr_max_factor * mean100_atr;
    if *atr_now < atr_floor || *atr_now > atr_ceiling {
        return Err(AnalyzerError::Rejected(RejectionReason::AtrBand));
    }

    // --- volume ratio ---
    let vol_now = *base_volumes.last().unwrap();
    if vol_ma20.is_zero() {
        return Err(AnalyzerError::Rejected(RejectionReason::Volume));
    }
    let volume_ratio = vol_now / vol_ma20;
    if volume_ratio < volume_threshold {
        return Err(AnalyzerError::Rejected(RejectionReason::Volume));
    }

    // --- pullback-and-break structure ---
    let n = base_closes.len();
    let close_now = base_closes[n - 1];
    let prev_high = base_highs[n - 2];
    let prev_low = base_lows[n - 2];
    let last3_closes = &base_closes[n - 3..];
    let last3_lows = &base_lows[n - 3..];
    let last3_highs = &base_highs[n - 3..];

    let side = match trend {
        Trend::Up => {
            let pulled_back =
                last3_closes.iter().copied().fold(Decimal::MAX, Decimal::min) <= *ema20_base_now
                    || last3_lows.iter().copied().fold(Decimal::MAX, Decimal::min) <= *ema20_base_now;
            if close_now > *ema20_base_now && close_now >= prev_high && pulled_back {
                Some(Side::Long)
            } else {
                None
            }
        }
        Trend::Down => {
            let pulled_back =
                last3_closes.iter().copied().fold(Decimal::MIN, Decimal::max) >= *ema20_base_now
                    || last3_highs.iter().copied().fold(Decimal::MIN, Decimal::max) >= *ema20_base_now;
            if close_now < *ema20_base_now && close_now <= prev_low && pulled_back {
                Some(Side::Short)
            } else {
                None
            }
        }
        Trend::Sideways => None,
    };

    let Some(side) = side else {
        return Err(AnalyzerError::Rejected(RejectionReason::Structure));
    };

    // --- stop via swing pivot ---
    let (swing_high, swing_low) = find_last_swing(&base_highs, &base_lows, SWING_LOOKBACK);
    let stop_loss = match side {
        Side::Long => {
            let base = swing_low.unwrap_or(close_now - dec!(1.5) * atr_now);
            base - dec!(0.25) * atr_now
        }
        Side::Short => {
            let base = swing_high.unwrap_or(close_now + dec!(1.5) * atr_now);
            base + dec!(0.25) * atr_now
        }
    };

    // --- entry range and R-multiple targets ---
    let entry_range = (close_now - dec!(0.25) * atr_now, close_now + dec!(0.25) * atr_now);
    let risk = match side {
        Side::Long => close_now - stop_loss,
        Side::Short => stop_loss - close_now,
    };
    if risk <= Decimal::ZERO {
        return Err(AnalyzerError::Rejected(RejectionReason::SwingMissing));
    }

    let tp_levels = match side {
        Side::Long => vec![
            close_now + dec!(1.5) * risk,
            close_now + dec!(2.5) * risk,
            close_now + dec!(3.5) * risk,
        ],
        Side::Short => vec![
            close_now - dec!(1.5) * risk,
            close_now - dec!(2.5) * risk,
            close_now - dec!(3.5) * risk,
        ],
    };

    let risk_reward = dec!(1.5); // TP1 is always 1.5R by construction

    let atr_pct = if close_now.is_zero() { Decimal::ZERO } else { atr_now / close_now };

    let candidate = SignalCandidate {
        symbol: request.symbol.clone(),
        side,
        base_timeframe: request.base_timeframe,
        htf_timeframe: request.htf_timeframe,
        entry_range,
        tp_levels,
        stop_loss,
        leverage: request.leverage,
        strategy: request.strategy_tag.to_string(),
        created_at: chrono::Utc::now(),
        chart_path: None,
        context: SignalContext {
            rsi: rsi14.unwrap_or(dec!(50)),
            atr_pct,
            volume_ratio,
            risk_reward,
            swing_high,
            swing_low,
            trend_label: trend.label(request.htf_timeframe),
        },
    };

    let recent_candles = base_candles[base_candles.len().saturating_sub(CHART_WINDOW)..].to_vec();
    Ok(AnalyzerOutput { candidate, recent_candles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::fixtures::StubMarketData;
    use chrono::{TimeZone, Utc};

    fn uptrend_market() -> StubMarketData {
        // HTF: 100 flat candles at 200, then a sustained 60-candle ramp to
        // 380. Faster EMAs escape the flat anchor quicker than slower ones
        // in a sustained ramp, so ema20 > ema50 > ema100 holds by the end.
        let mut htf = Vec::new();
        for i in 0..100 {
            htf.push(make_candle("BTCUSDT", TimeFrame::H1, dec!(200), dec!(201), dec!(199), dec!(200), i));
        }
        for i in 0..60 {
            let price = dec!(200) + Decimal::from(i + 1) * dec!(3);
            htf.push(make_candle("BTCUSDT", TimeFrame::H1, price, price + dec!(1), price - dec!(1), price, 100 + i));
        }

        // Base: 130 flat candles at 300 (true range 2, so ATR settles at a
        // steady non-zero value), then a three-candle pullback to EMA20
        // followed by a break to a new local high.
        let mut base = Vec::new();
        for i in 0..130 {
            base.push(make_candle("BTCUSDT", TimeFrame::M15, dec!(300), dec!(301), dec!(299), dec!(300), i));
        }
        base.push(make_candle("BTCUSDT", TimeFrame::M15, dec!(296), dec!(296), dec!(293), dec!(295), 130));
        base.push(make_candle("BTCUSDT", TimeFrame::M15, dec!(296), dec!(299), dec!(297), dec!(298), 131));
        let mut last = make_candle("BTCUSDT", TimeFrame::M15, dec!(299), dec!(303), dec!(298), dec!(303), 132);
        last.volume = dec!(200);
        base.push(last);

        let mut market = StubMarketData::default();
        market.klines.insert(("BTCUSDT".to_string(), TimeFrame::H1), htf);
        market.klines.insert(("BTCUSDT".to_string(), TimeFrame::M15), base);
        market
    }

    fn make_candle(symbol: &str, tf: TimeFrame, open: Decimal, high: Decimal, low: Decimal, close: Decimal, i: i64) -> Candle {
        let t = Utc.timestamp_opt(1_700_000_000 + i * 900, 0).unwrap();
        Candle {
            symbol: Symbol::new(symbol),
            timeframe: tf,
            open_time: t,
            close_time: t,
            open,
            high,
            low,
            close,
            volume: Decimal::from(100),
            quote_volume: Decimal::from(100) * close,
            trades: 10,
            is_closed: true,
        }
    }

    #[tokio::test]
    async fn rejects_when_history_is_too_short() {
        let mut market = StubMarketData::with_flat_series("BTCUSDT", TimeFrame::M15, 10, dec!(100));
        let htf_candles = (0..10)
            .map(|i| make_candle("BTCUSDT", TimeFrame::H1, dec!(100), dec!(100), dec!(100), dec!(100), i))
            .collect();
        market.klines.insert(("BTCUSDT".to_string(), TimeFrame::H1), htf_candles);
        let sensitivity = Sensitivity::new();
        let request = AnalyzerRequest {
            symbol: &Symbol::new("BTCUSDT"),
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            leverage: 10,
            strategy_tag: "midterm",
        };
        let result = analyze(&market, &sensitivity, dec!(4), request).await;
        assert!(matches!(result, Err(AnalyzerError::Rejected(RejectionReason::InsufficientHistory))));
    }

    #[tokio::test]
    async fn rejects_flat_series_as_sideways() {
        let market = StubMarketData::with_flat_series("BTCUSDT", TimeFrame::M15, 200, dec!(100));
        // flat htf series too, reuse the same key via a second stub merge
        let mut market = market;
        let htf_candles = (0..200)
            .map(|i| make_candle("BTCUSDT", TimeFrame::H1, dec!(100), dec!(100), dec!(100), dec!(100), i))
            .collect();
        market.klines.insert(("BTCUSDT".to_string(), TimeFrame::H1), htf_candles);

        let sensitivity = Sensitivity::new();
        let request = AnalyzerRequest {
            symbol: &Symbol::new("BTCUSDT"),
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            leverage: 10,
            strategy_tag: "midterm",
        };
        let result = analyze(&market, &sensitivity, dec!(4), request).await;
        assert!(matches!(result, Err(AnalyzerError::Rejected(RejectionReason::NoHtfTrend))));
    }

    #[tokio::test]
    async fn admits_a_clean_uptrend_pullback() {
        let market = uptrend_market();
        let sensitivity = Sensitivity::new();
        let request = AnalyzerRequest {
            symbol: &Symbol::new("BTCUSDT"),
            base_timeframe: TimeFrame::M15,
            htf_timeframe: TimeFrame::H1,
            leverage: 10,
            strategy_tag: "midterm",
        };
        let result = analyze(&market, &sensitivity, dec!(4), request).await;
        let output = result.expect("expected admission");
        assert_eq!(output.candidate.side, Side::Long);
        assert!(output.candidate.is_well_formed());
        assert!(!output.recent_candles.is_empty());
    }
}
