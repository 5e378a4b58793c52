use rust_decimal::Decimal;
use super::Indicator;

#[derive(Debug, Clone)]
pub struct EMA {
    period: usize,
    multiplier: Decimal,
    value: Option<Decimal>,
}

impl EMA {
    pub fn new(period: usize) -> Self {
        let multiplier = Decimal::from(2) / Decimal::from(period as u32 + 1);
        Self {
            period,
            multiplier,
            value: None,
        }
    }

    /// Seeds with the first sample, then recurses from the second sample
    /// onward, so one value comes back per input from the very first call.
    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        self.value = Some(match self.value {
            None => price,
            Some(prev_ema) => (price - prev_ema) * self.multiplier + prev_ema,
        });

        self.value
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for EMA {
    fn name(&self) -> &'static str {
        "EMA"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn seeds_with_first_sample_then_recurses() {
        let mut ema = EMA::new(3);
        assert_eq!(ema.update(dec!(1)), Some(dec!(1)));
        assert_eq!(ema.update(dec!(2)), Some(dec!(1.5)));
        let third = ema.update(dec!(3)).unwrap();
        assert!(third > dec!(1.5));
    }

    #[test]
    fn constant_series_stays_constant_from_the_first_value() {
        let mut ema = EMA::new(5);
        for _ in 0..10 {
            assert_eq!(ema.update(dec!(10)), Some(dec!(10)));
        }
    }
}
