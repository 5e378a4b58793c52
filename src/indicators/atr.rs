use rust_decimal::Decimal;
use super::Indicator;

#[derive(Debug, Clone)]
pub struct ATR {
    period: usize,
    prev_close: Option<Decimal>,
    value: Option<Decimal>,
}

impl ATR {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            value: None,
        }
    }

    /// Seeds with the first true range, then applies the Wilder recursive
    /// update from the second sample onward, so one value comes back per
    /// input from the very first call.
    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> Option<Decimal> {
        let tr = self.calculate_true_range(high, low, close);
        self.prev_close = Some(close);

        self.value = Some(match self.value {
            None => tr,
            Some(prev_atr) => {
                let period_dec = Decimal::from(self.period as u32);
                (prev_atr * (period_dec - Decimal::ONE) + tr) / period_dec
            }
        });

        self.value
    }

    fn calculate_true_range(&self, high: Decimal, low: Decimal, close: Decimal) -> Decimal {
        let hl = high - low;

        match self.prev_close {
            Some(prev_close) => {
                let hc = (high - prev_close).abs();
                let lc = (low - prev_close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    /// ATR expressed as a fraction of `price` (the "atr_pct" read throughout
    /// the analyzer and quality filter).
    pub fn value_pct(&self, price: Decimal) -> Option<Decimal> {
        if price.is_zero() {
            return None;
        }
        self.value.map(|atr| atr / price)
    }
}

impl Indicator for ATR {
    fn name(&self) -> &'static str {
        "ATR"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn seeds_with_the_first_true_range_then_recurses() {
        let mut atr = ATR::new(2);
        assert_eq!(atr.update(dec!(10), dec!(8), dec!(9)), Some(dec!(2))); // tr = 10-8 = 2, seed
        let next = atr.update(dec!(11), dec!(9), dec!(10)).unwrap(); // tr = 2
        assert_eq!(next, dec!(2)); // (2*(2-1) + 2) / 2
    }

    #[test]
    fn value_pct_divides_by_price() {
        let mut atr = ATR::new(1);
        atr.update(dec!(10), dec!(8), dec!(9));
        assert_eq!(atr.value_pct(dec!(100)), Some(dec!(0.02)));
    }
}
