use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Running => write!(f, "Running"),
            EngineStatus::Paused => write!(f, "Paused"),
            EngineStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    pub status: EngineStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub signals_admitted: u64,
}

/// Cooperative lifecycle flag for the scanner loop. The
/// scan loop checks `should_scan()` at the top of every tick and the
/// shutdown signal flips `is_running` to false.
pub struct EngineController {
    is_running: AtomicBool,
    is_paused: AtomicBool,
    started_at: RwLock<Option<DateTime<Utc>>>,
    paused_at: RwLock<Option<DateTime<Utc>>>,
    signals_admitted: AtomicU64,
    status_tx: broadcast::Sender<EngineStatus>,
}

impl EngineController {
    pub fn new_running() -> Self {
        let (status_tx, _) = broadcast::channel(32);
        Self {
            is_running: AtomicBool::new(true),
            is_paused: AtomicBool::new(false),
            started_at: RwLock::new(Some(Utc::now())),
            paused_at: RwLock::new(None),
            signals_admitted: AtomicU64::new(0),
            status_tx,
        }
    }

    pub async fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
        self.is_paused.store(false, Ordering::Release);
        info!("engine stop requested");
        let _ = self.status_tx.send(EngineStatus::Stopped);
    }

    pub async fn pause(&self) -> Result<(), String> {
        if !self.is_running.load(Ordering::Acquire) {
            return Err("engine is not running".to_string());
        }
        self.is_paused.store(true, Ordering::Release);
        *self.paused_at.write().await = Some(Utc::now());
        let _ = self.status_tx.send(EngineStatus::Paused);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), String> {
        if !self.is_paused.load(Ordering::Acquire) {
            return Err("engine is not paused".to_string());
        }
        self.is_paused.store(false, Ordering::Release);
        *self.paused_at.write().await = None;
        let _ = self.status_tx.send(EngineStatus::Running);
        Ok(())
    }

    pub fn should_scan(&self) -> bool {
        self.is_running.load(Ordering::Acquire) && !self.is_paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn record_admission(&self) {
        self.signals_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn state(&self) -> EngineState {
        let started_at = *self.started_at.read().await;
        let paused_at = *self.paused_at.read().await;

        let status = if !self.is_running.load(Ordering::Acquire) {
            EngineStatus::Stopped
        } else if self.is_paused.load(Ordering::Acquire) {
            EngineStatus::Paused
        } else {
            EngineStatus::Running
        };

        let uptime_seconds = started_at
            .map(|start| (Utc::now() - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        EngineState {
            status,
            started_at,
            paused_at,
            uptime_seconds,
            signals_admitted: self.signals_admitted.load(Ordering::Relaxed),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }
}

impl Default for EngineController {
    fn default() -> Self {
        Self::new_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_transitions_to_stopped() {
        let controller = EngineController::new_running();
        assert!(controller.should_scan());
        controller.stop().await;
        assert!(!controller.should_scan());
        assert_eq!(controller.state().await.status, EngineStatus::Stopped);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips() {
        let controller = EngineController::new_running();
        controller.pause().await.unwrap();
        assert!(!controller.should_scan());
        controller.resume().await.unwrap();
        assert!(controller.should_scan());
    }
}
