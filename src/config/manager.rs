use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use super::runtime::{EngineConfig, QualitySettings, ScanSettings, SimulatorSettings};

#[derive(Debug, Clone, Serialize)]
pub enum ConfigChangeEvent {
    ScanUpdated,
    QualityUpdated,
    SimulatorUpdated,
    FullConfigUpdated,
}

/// Holds the live `EngineConfig` behind a lock and broadcasts change events to
/// anyone subscribed (the `config`/`setrisk`/`sethorizon` operator commands
/// mutate through here rather than touching components directly).
pub struct RuntimeConfigManager {
    config: Arc<RwLock<EngineConfig>>,
    change_tx: broadcast::Sender<ConfigChangeEvent>,
}

impl RuntimeConfigManager {
    pub fn new(initial: EngineConfig) -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self {
            config: Arc::new(RwLock::new(initial)),
            change_tx,
        }
    }

    pub async fn get_config(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    pub async fn update_scan(&self, settings: ScanSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.scan.clone();
        config.scan = settings;

        if let Err(errors) = config.validate() {
            config.scan = old;
            return Err(errors.join(", "));
        }

        info!(concurrency = config.scan.concurrency, "scan settings updated");
        let _ = self.change_tx.send(ConfigChangeEvent::ScanUpdated);
        Ok(())
    }

    pub async fn update_quality(&self, settings: QualitySettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.quality.clone();
        config.quality = settings;

        if let Err(errors) = config.validate() {
            config.quality = old;
            return Err(errors.join(", "));
        }

        info!("quality settings updated");
        let _ = self.change_tx.send(ConfigChangeEvent::QualityUpdated);
        Ok(())
    }

    pub async fn update_simulator(&self, settings: SimulatorSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.simulator.clone();
        config.simulator = settings;

        if let Err(errors) = config.validate() {
            config.simulator = old;
            return Err(errors.join(", "));
        }

        info!(
            risk_pct = %config.simulator.risk_pct,
            "simulator settings updated"
        );
        let _ = self.change_tx.send(ConfigChangeEvent::SimulatorUpdated);
        Ok(())
    }

    pub async fn update_full(&self, new_config: EngineConfig) -> Result<(), String> {
        if let Err(errors) = new_config.validate() {
            return Err(errors.join(", "));
        }

        let mut config = self.config.write().await;
        *config = new_config;

        info!("full configuration replaced");
        let _ = self.change_tx.send(ConfigChangeEvent::FullConfigUpdated);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_tx.subscribe()
    }

    pub fn config_arc(&self) -> Arc<RwLock<EngineConfig>> {
        Arc::clone(&self.config)
    }
}

impl Clone for RuntimeConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            change_tx: self.change_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_scan_update_and_keeps_old_value() {
        let manager = RuntimeConfigManager::new(EngineConfig::default());
        let mut bad = manager.get_config().await.scan;
        bad.concurrency = 0;
        assert!(manager.update_scan(bad).await.is_err());
        assert_eq!(manager.get_config().await.scan.concurrency, 3);
    }
}
