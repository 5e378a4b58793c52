pub mod atr;
pub mod ema;
pub mod rsi;
pub mod swing;

pub use atr::*;
pub use ema::*;
pub use rsi::*;
pub use swing::*;

use rust_decimal::Decimal;

pub trait Indicator {
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
    fn reset(&mut self);
}

pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    let sum: Decimal = values.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period as u32))
}

pub fn highest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    values.iter().rev().take(period).max().copied()
}

pub fn lowest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    values.iter().rev().take(period).min().copied()
}

/// Plain windowed mean over the trailing `period` samples of `values`
/// (distinct from EMA, used for the volume moving average and the ATR-band
/// divisor). Falls back to the whole series when fewer than `period`
/// samples are available; callers that need a hard minimum enforce it
/// themselves before calling in.
pub fn rolling_mean(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let take = period.min(values.len());
    let sum: Decimal = values.iter().rev().take(take).sum();
    Some(sum / Decimal::from(take as u32))
}

pub fn stddev(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    let mean = sma(values, period)?;
    let variance: Decimal = values
        .iter()
        .rev()
        .take(period)
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / Decimal::from(period as u32);

    Some(sqrt_decimal(variance))
}

/// Newton's-method square root over `Decimal`, since `rust_decimal` has no
/// native sqrt and volatility-adjacent math needs to stay fixed-point.
pub fn sqrt_decimal(value: Decimal) -> Decimal {
    if value.is_zero() || value.is_sign_negative() {
        return Decimal::ZERO;
    }

    let mut guess = value / Decimal::from(2);
    let epsilon = Decimal::new(1, 10); // 0.0000000001

    for _ in 0..50 {
        let new_guess = (guess + value / guess) / Decimal::from(2);
        if (new_guess - guess).abs() < epsilon {
            return new_guess;
        }
        guess = new_guess;
    }
    guess
}

/// EMA over a full series, one value per input sample from the first:
/// the array-oriented counterpart of the streaming [`ema::EMA`].
pub fn ema_series(values: &[Decimal], period: usize) -> Vec<Decimal> {
    let mut ema = ema::EMA::new(period);
    values.iter().filter_map(|v| ema.update(*v)).collect()
}

/// RSI over a full close-price series. Returns `None` if fewer than
/// `period + 1` samples are available.
pub fn rsi_last(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if closes.len() < period + 1 {
        return None;
    }
    let mut rsi = rsi::RSI::new(period);
    let mut last = None;
    for c in closes {
        last = rsi.update(*c).or(last);
    }
    last
}

/// ATR over full OHLC series, one value per candle from the first.
/// `highs`/`lows`/`closes` must be equal length or this returns `None`.
pub fn atr_series(
    highs: &[Decimal],
    lows: &[Decimal],
    closes: &[Decimal],
    period: usize,
) -> Option<Vec<Decimal>> {
    if highs.len() != lows.len() || highs.len() != closes.len() {
        return None;
    }
    let mut atr = atr::ATR::new(period);
    Some(
        highs
            .iter()
            .zip(lows.iter())
            .zip(closes.iter())
            .filter_map(|((h, l), c)| atr.update(*h, *l, *c))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = vec![dec!(10); 30];
        let series = ema_series(&values, 5);
        assert!(series.iter().all(|v| *v == dec!(10)));
    }

    #[test]
    fn rolling_mean_caps_at_available_history() {
        let values: Vec<Decimal> = (1..=10).map(Decimal::from).collect();
        // fewer than 100 samples available: falls back to the full series
        let mean = rolling_mean(&values, 100).unwrap();
        let expected: Decimal = values.iter().sum::<Decimal>() / Decimal::from(10);
        assert_eq!(mean, expected);
    }

    #[test]
    fn sqrt_decimal_matches_known_values() {
        let root = sqrt_decimal(dec!(144));
        assert!((root - dec!(12)).abs() < dec!(0.0001));
    }
}
