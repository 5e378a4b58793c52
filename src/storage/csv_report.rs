use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::StorageError;

/// Append-only daily CSV of admitted signals. One row per admission:
/// `ts, symbol, entry_mid, score, trend_label, tp1, tp2, sl`.
pub struct DailyCsvWriter {
    path: PathBuf,
}

impl DailyCsvWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append_row(
        &self,
        ts: DateTime<Utc>,
        symbol: &str,
        entry_mid: Decimal,
        score: Decimal,
        trend_label: &str,
        tp1: Decimal,
        tp2: Decimal,
        sl: Decimal,
    ) -> Result<(), StorageError> {
        let needs_header = !Path::new(&self.path).exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::Query(format!("failed to open daily csv: {e}")))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer
                .write_record(["ts", "symbol", "entry_mid", "score", "trend_label", "tp1", "tp2", "sl"])
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        writer
            .write_record([
                ts.to_rfc3339(),
                symbol.to_string(),
                entry_mid.to_string(),
                score.to_string(),
                trend_label.to_string(),
                tp1.to_string(),
                tp2.to_string(),
                sl.to_string(),
            ])
            .map_err(|e| StorageError::Query(e.to_string()))?;

        writer
            .flush()
            .map_err(|e| StorageError::Query(format!("failed to flush daily csv: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_header_once_then_appends_rows() {
        let dir = std::env::temp_dir().join(format!("csv_report_test_{}", uuid::Uuid::new_v4()));
        let path = dir.with_extension("csv");
        let writer = DailyCsvWriter::new(&path);

        writer
            .append_row(Utc::now(), "BTCUSDT", dec!(100), dec!(1.5), "HTF 1h Uptrend", dec!(101.5), dec!(102.5), dec!(99))
            .unwrap();
        writer
            .append_row(Utc::now(), "ETHUSDT", dec!(200), dec!(1.8), "HTF 1h Uptrend", dec!(203), dec!(206), dec!(195))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3); // header + 2 rows
        std::fs::remove_file(&path).ok();
    }
}
