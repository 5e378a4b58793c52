use rust_decimal::Decimal;

/// True if `highs[idx]` is strictly greater than its two neighbors on each
/// side: a 5-bar fractal pivot, the same window the analyzer uses to mark
/// swing structure.
fn is_pivot_high(highs: &[Decimal], idx: usize) -> bool {
    if idx < 2 || idx + 2 >= highs.len() {
        return false;
    }
    highs[idx] > highs[idx - 1]
        && highs[idx] > highs[idx - 2]
        && highs[idx] > highs[idx + 1]
        && highs[idx] > highs[idx + 2]
}

fn is_pivot_low(lows: &[Decimal], idx: usize) -> bool {
    if idx < 2 || idx + 2 >= lows.len() {
        return false;
    }
    lows[idx] < lows[idx - 1]
        && lows[idx] < lows[idx - 2]
        && lows[idx] < lows[idx + 1]
        && lows[idx] < lows[idx + 2]
}

/// Scans backward from the most recent fully-confirmed bar over the trailing
/// `lookback` candles and returns the first swing high and first swing low
/// encountered (independently; one can resolve well before the other).
/// `highs` and `lows` must be equal length and in chronological order.
pub fn find_last_swing(
    highs: &[Decimal],
    lows: &[Decimal],
    lookback: usize,
) -> (Option<Decimal>, Option<Decimal>) {
    if highs.len() != lows.len() || highs.len() < 5 {
        return (None, None);
    }

    let mut swing_high = None;
    let mut swing_low = None;
    let start = (highs.len().saturating_sub(lookback)).max(2);

    for i in (start..highs.len()).rev() {
        if swing_high.is_none() && is_pivot_high(highs, i) {
            swing_high = Some(highs[i]);
        }
        if swing_low.is_none() && is_pivot_low(lows, i) {
            swing_low = Some(lows[i]);
        }
        if swing_high.is_some() && swing_low.is_some() {
            break;
        }
    }

    (swing_high, swing_low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(vals: &[i64]) -> Vec<Decimal> {
        vals.iter().map(|v| Decimal::from(*v)).collect()
    }

    #[test]
    fn finds_a_clean_pivot_high_and_low() {
        let highs = series(&[10, 11, 12, 20, 12, 11, 10, 9, 8]);
        let lows = series(&[5, 4, 3, 2, 1, 0, 6, 7, 8]);
        let (high, low) = find_last_swing(&highs, &lows, 40);
        assert_eq!(high, Some(dec!(20)));
        assert_eq!(low, Some(dec!(0)));
    }

    #[test]
    fn too_short_series_yields_nothing() {
        let highs = series(&[1, 2, 3]);
        let lows = series(&[1, 2, 3]);
        assert_eq!(find_last_swing(&highs, &lows, 40), (None, None));
    }

    #[test]
    fn respects_lookback_window() {
        let mut highs = vec![Decimal::from(1); 50];
        highs[5] = Decimal::from(100); // pivot far outside the lookback window
        let lows = vec![Decimal::from(1); 50];
        let (high, _) = find_last_swing(&highs, &lows, 10);
        assert_eq!(high, None);
    }
}
