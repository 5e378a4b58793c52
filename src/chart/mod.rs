use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::error::ChartError;
use crate::indicators::ema_series;
use crate::types::{Candle, Side};

/// Levels to draw as horizontal reference lines, colored by trade side.
pub struct ChartLevels {
    pub entry: rust_decimal::Decimal,
    pub tp1: rust_decimal::Decimal,
    pub tp2: rust_decimal::Decimal,
    pub sl: rust_decimal::Decimal,
    pub side: Side,
}

/// Renders the last 50 base-timeframe candles plus EMA20/EMA50 overlays, the
/// signal's entry/TP/SL levels, and a volume subplot, to a PNG under
/// `charts_dir`. Never leaves a partial file: rendering happens against a
/// temporary path and only the finished chart is left under the public name.
pub struct ChartGenerator {
    charts_dir: PathBuf,
    collision_counter: AtomicU32,
}

impl ChartGenerator {
    pub fn new(charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            charts_dir: charts_dir.into(),
            collision_counter: AtomicU32::new(0),
        }
    }

    pub async fn render(&self, symbol: &str, candles: &[Candle], levels: &ChartLevels) -> Result<String, ChartError> {
        if candles.is_empty() {
            return Err(ChartError::NoData);
        }

        tokio::fs::create_dir_all(&self.charts_dir)
            .await
            .map_err(|e| ChartError::Io(e.to_string()))?;

        let window: Vec<&Candle> = candles.iter().rev().take(50).rev().collect();
        let path = self.unique_path(symbol);

        let result = render_png(&path, symbol, &window, levels);
        match result {
            Ok(()) => Ok(path.to_string_lossy().into_owned()),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(ChartError::Render(e))
            }
        }
    }

    fn unique_path(&self, symbol: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut filename = format!("chart_{symbol}_{stamp}.png");
        let mut candidate = self.charts_dir.join(&filename);

        while candidate.exists() {
            let n = self.collision_counter.fetch_add(1, Ordering::Relaxed) + 1;
            filename = format!("chart_{symbol}_{stamp}_{n}.png");
            candidate = self.charts_dir.join(&filename);
        }

        candidate
    }
}

fn render_png(path: &Path, symbol: &str, candles: &[&Candle], levels: &ChartLevels) -> Result<(), String> {
    let closes: Vec<rust_decimal::Decimal> = candles.iter().map(|c| c.close).collect();
    let ema20 = ema_series(&closes, 20);
    let ema50 = ema_series(&closes, 50);

    let to_f64 = |d: rust_decimal::Decimal| d.to_f64().unwrap_or(0.0);

    let price_min = candles
        .iter()
        .map(|c| to_f64(c.low))
        .fold(f64::MAX, f64::min)
        .min(to_f64(levels.sl))
        .min(to_f64(levels.entry));
    let price_max = candles
        .iter()
        .map(|c| to_f64(c.high))
        .fold(f64::MIN, f64::max)
        .max(to_f64(levels.tp2))
        .max(to_f64(levels.entry));
    let pad = (price_max - price_min).max(1e-9) * 0.05;

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| e.to_string())?;
    let (price_area, volume_area) = root.split_vertically(560);

    let mut price_chart = ChartBuilder::on(&price_area)
        .caption(format!("{symbol} — {} candles", candles.len()), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(60)
        .build_cartesian_2d(0..candles.len(), (price_min - pad)..(price_max + pad))
        .map_err(|e| e.to_string())?;

    price_chart.configure_mesh().draw().map_err(|e| e.to_string())?;

    price_chart
        .draw_series(candles.iter().enumerate().map(|(i, c)| {
            let color = if c.is_bullish() { GREEN } else { RED };
            CandleStick::new(i, to_f64(c.open), to_f64(c.high), to_f64(c.low), to_f64(c.close), color.filled(), color.filled(), 8)
        }))
        .map_err(|e| e.to_string())?;

    price_chart
        .draw_series(LineSeries::new(ema20.iter().enumerate().map(|(i, v)| (i, to_f64(*v))), &BLUE))
        .map_err(|e| e.to_string())?
        .label("EMA20");

    price_chart
        .draw_series(LineSeries::new(ema50.iter().enumerate().map(|(i, v)| (i, to_f64(*v))), &MAGENTA))
        .map_err(|e| e.to_string())?
        .label("EMA50");

    let entry_color = if matches!(levels.side, Side::Long) { GREEN } else { RED };
    for (value, color, label) in [
        (levels.entry, entry_color, "entry"),
        (levels.tp1, BLUE, "tp1"),
        (levels.tp2, BLUE, "tp2"),
        (levels.sl, RED, "sl"),
    ] {
        let y = to_f64(value);
        price_chart
            .draw_series(LineSeries::new((0..candles.len()).map(|i| (i, y)), color.stroke_width(1)))
            .map_err(|e| e.to_string())?
            .label(label);
    }

    let volume_max = candles.iter().map(|c| to_f64(c.volume)).fold(0.0, f64::max).max(1.0);
    let mut volume_chart = ChartBuilder::on(&volume_area)
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(60)
        .build_cartesian_2d(0..candles.len(), 0.0..volume_max)
        .map_err(|e| e.to_string())?;

    volume_chart.configure_mesh().draw().map_err(|e| e.to_string())?;
    volume_chart
        .draw_series(candles.iter().enumerate().map(|(i, c)| {
            let color = if c.is_bullish() { GREEN } else { RED };
            Rectangle::new([(i, 0.0), (i, to_f64(c.volume))], color.filled())
        }))
        .map_err(|e| e.to_string())?;

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Symbol, TimeFrame};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(i: i64, close: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: Symbol::new("BTCUSDT"),
            timeframe: TimeFrame::M15,
            open_time: Utc::now(),
            close_time: Utc::now(),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: dec!(100) + rust_decimal::Decimal::from(i),
            quote_volume: dec!(1000),
            trades: 5,
            is_closed: true,
        }
    }

    #[tokio::test]
    async fn rejects_empty_candle_slice() {
        let dir = std::env::temp_dir().join(format!("chart_test_{}", uuid::Uuid::new_v4()));
        let gen = ChartGenerator::new(dir);
        let levels = ChartLevels {
            entry: dec!(100),
            tp1: dec!(101),
            tp2: dec!(102),
            sl: dec!(99),
            side: Side::Long,
        };
        let result = gen.render("BTCUSDT", &[], &levels).await;
        assert!(matches!(result, Err(ChartError::NoData)));
    }

    #[tokio::test]
    async fn renders_a_file_and_returns_its_path() {
        let dir = std::env::temp_dir().join(format!("chart_test_{}", uuid::Uuid::new_v4()));
        let gen = ChartGenerator::new(&dir);
        let candles: Vec<Candle> = (0..60).map(|i| candle(i, dec!(100) + rust_decimal::Decimal::from(i))).collect();
        let levels = ChartLevels {
            entry: dec!(150),
            tp1: dec!(153),
            tp2: dec!(156),
            sl: dec!(147),
            side: Side::Long,
        };
        let path = gen.render("BTCUSDT", &candles, &levels).await.unwrap();
        assert!(std::path::Path::new(&path).exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
