use rust_decimal::Decimal;
use super::Indicator;

#[derive(Debug, Clone)]
pub struct RSI {
    period: usize,
    avg_gain: Option<Decimal>,
    avg_loss: Option<Decimal>,
    prev_price: Option<Decimal>,
    gains: Vec<Decimal>,
    losses: Vec<Decimal>,
    value: Option<Decimal>,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            avg_gain: None,
            avg_loss: None,
            prev_price: None,
            gains: Vec::with_capacity(period),
            losses: Vec::with_capacity(period),
            value: None,
        }
    }

    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        if let Some(prev) = self.prev_price {
            let change = price - prev;
            let gain = if change > Decimal::ZERO { change } else { Decimal::ZERO };
            let loss = if change < Decimal::ZERO { change.abs() } else { Decimal::ZERO };

            if self.gains.len() < self.period {
                self.gains.push(gain);
                self.losses.push(loss);

                if self.gains.len() == self.period {
                    let sum_gain: Decimal = self.gains.iter().sum();
                    let sum_loss: Decimal = self.losses.iter().sum();
                    self.avg_gain = Some(sum_gain / Decimal::from(self.period as u32));
                    self.avg_loss = Some(sum_loss / Decimal::from(self.period as u32));
                    self.value = self.calculate_rsi();
                }
            } else if let (Some(avg_gain), Some(avg_loss)) = (self.avg_gain, self.avg_loss) {
                let period_dec = Decimal::from(self.period as u32);
                let new_avg_gain = (avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec;
                let new_avg_loss = (avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec;
                self.avg_gain = Some(new_avg_gain);
                self.avg_loss = Some(new_avg_loss);
                self.value = self.calculate_rsi();
            }
        }

        self.prev_price = Some(price);
        self.value
    }

    fn calculate_rsi(&self) -> Option<Decimal> {
        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                if avg_loss.is_zero() {
                    Some(Decimal::from(100))
                } else {
                    let rs = avg_gain / avg_loss;
                    Some(Decimal::from(100) - (Decimal::from(100) / (Decimal::ONE + rs)))
                }
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn is_oversold(&self, threshold: Decimal) -> bool {
        self.value.map(|v| v < threshold).unwrap_or(false)
    }

    pub fn is_overbought(&self, threshold: Decimal) -> bool {
        self.value.map(|v| v > threshold).unwrap_or(false)
    }

    pub fn zone(&self) -> Option<RSIZone> {
        self.value.map(|v| {
            if v < Decimal::from(30) {
                RSIZone::Oversold
            } else if v > Decimal::from(70) {
                RSIZone::Overbought
            } else if v < Decimal::from(50) {
                RSIZone::BearishNeutral
            } else {
                RSIZone::BullishNeutral
            }
        })
    }
}

impl Indicator for RSI {
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.avg_gain = None;
        self.avg_loss = None;
        self.prev_price = None;
        self.gains.clear();
        self.losses.clear();
        self.value = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RSIZone {
    Oversold,
    BearishNeutral,
    BullishNeutral,
    Overbought,
}

impl RSIZone {
    pub fn is_extreme(&self) -> bool {
        matches!(self, RSIZone::Oversold | RSIZone::Overbought)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_series_yields_rsi_100() {
        let mut rsi = RSI::new(3);
        for p in [dec!(10), dec!(11), dec!(12), dec!(13), dec!(14)] {
            rsi.update(p);
        }
        assert_eq!(rsi.value(), Some(dec!(100)));
    }

    #[test]
    fn zone_classifies_extremes() {
        let mut rsi = RSI::new(2);
        for p in [dec!(10), dec!(9), dec!(8), dec!(7)] {
            rsi.update(p);
        }
        assert_eq!(rsi.zone(), Some(RSIZone::Oversold));
        assert!(rsi.zone().unwrap().is_extreme());
    }
}
