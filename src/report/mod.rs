use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chat::ChatPort;
use crate::config::ReportSettings;
use crate::engine::EngineController;
use crate::storage::Storage;
use crate::types::TradeStatus;

/// Cooperative daily summary job: closed-trade counts, win rate, and total
/// realized PnL, delivered through the same chat port the coordinator uses
/// for signal notifications.
pub struct DailyReportScheduler {
    storage: Storage,
    chat: Box<dyn ChatPort>,
    chat_id: Option<String>,
    settings: ReportSettings,
}

impl DailyReportScheduler {
    pub fn new(storage: Storage, chat: Box<dyn ChatPort>, chat_id: Option<String>, settings: ReportSettings) -> Self {
        Self { storage, chat, chat_id, settings }
    }

    /// Sleeps until the next configured hour:minute, emits a report, repeats,
    /// until the controller stops. Checked cooperatively at every wake-up so
    /// a long sleep never blocks shutdown for more than one tick.
    pub async fn run(&self, controller: Arc<EngineController>) {
        while controller.is_running() {
            let sleep_for = duration_until_next_run(&self.settings, Utc::now());
            tokio::time::sleep(sleep_for.min(Duration::from_secs(3600))).await;

            if !controller.is_running() {
                break;
            }
            if sleep_for > Duration::from_secs(3600) {
                continue;
            }

            if let Err(e) = self.emit().await {
                warn!(error = %e, "failed to generate daily report");
            }
        }
    }

    async fn emit(&self) -> Result<(), crate::error::StorageError> {
        let trades = self.storage.all_trades().await?;
        let closed: Vec<_> = trades.iter().filter(|t| t.status == TradeStatus::Closed).collect();

        let win = closed.iter().filter(|t| t.pnl_usd > Decimal::ZERO).count();
        let lose = closed.len() - win;
        let total_pnl: Decimal = closed.iter().map(|t| t.pnl_usd).sum();
        let win_rate = if closed.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(win) * Decimal::from(100) / Decimal::from(closed.len())
        };

        let summary = format!(
            "Daily summary\nclosed trades: {} (win {} / loss {})\nwin rate: {win_rate:.1}%\ntotal pnl usd: {total_pnl}",
            closed.len(),
            win,
            lose,
        );

        info!("{}", summary);
        if let Some(chat_id) = &self.chat_id {
            self.chat.send_text(chat_id, &summary).await;
        }

        Ok(())
    }
}

/// Standalone so it can be unit-tested without a live storage/chat pair.
fn duration_until_next_run(settings: &ReportSettings, now: DateTime<Utc>) -> Duration {
    let target = NaiveTime::from_hms_opt(settings.daily_report_hour.min(23), settings.daily_report_minute.min(59), 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).unwrap());

    let today_run = now.date_naive().and_time(target).and_utc();
    let next_run = if today_run > now { today_run } else { today_run + chrono::Duration::days(1) };

    (next_run - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules_later_today_when_target_has_not_passed() {
        let settings = ReportSettings { daily_report_hour: 23, daily_report_minute: 59 };
        let now: DateTime<Utc> = "2026-01-01T10:00:00Z".parse().unwrap();
        let wait = duration_until_next_run(&settings, now);
        assert!(wait < Duration::from_secs(24 * 3600));
        assert!(wait > Duration::from_secs(13 * 3600));
    }

    #[test]
    fn schedules_tomorrow_when_target_already_passed() {
        let settings = ReportSettings { daily_report_hour: 1, daily_report_minute: 0 };
        let now: DateTime<Utc> = "2026-01-01T10:00:00Z".parse().unwrap();
        let wait = duration_until_next_run(&settings, now);
        assert!(wait > Duration::from_secs(14 * 3600));
    }
}
