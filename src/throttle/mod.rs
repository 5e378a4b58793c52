use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ThrottleError;
use crate::types::Symbol;

/// Persistent per-symbol cooldown gate. Backed by a JSON file
/// holding `{symbol: ISO-8601 timestamp}`, rewritten atomically (tmp +
/// rename) on every update so a crash mid-write never corrupts the prior
/// state a restart needs to read.
pub struct Throttle {
    path: PathBuf,
    state: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Throttle {
    /// Loads existing state from `path` if present; starts empty otherwise.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ThrottleError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_state(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(ThrottleError::Io(e.to_string())),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Returns true and records `now` iff `symbol` was not emitted within the
    /// last `cooldown_minutes`. Persists on every successful (true) call.
    pub async fn allow(&self, symbol: &Symbol, cooldown_minutes: i64) -> Result<bool, ThrottleError> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        if let Some(last) = state.get(symbol.as_str()) {
            let elapsed = now.signed_duration_since(*last);
            if elapsed < chrono::Duration::minutes(cooldown_minutes) {
                debug!(symbol = symbol.as_str(), "throttled");
                return Ok(false);
            }
        }

        state.insert(symbol.as_str().to_string(), now);
        persist_atomic(&self.path, &state).await?;
        Ok(true)
    }

    pub async fn last_emitted(&self, symbol: &Symbol) -> Option<DateTime<Utc>> {
        self.state.read().await.get(symbol.as_str()).copied()
    }
}

fn parse_state(contents: &str) -> Result<HashMap<String, DateTime<Utc>>, ThrottleError> {
    if contents.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let raw: HashMap<String, String> =
        serde_json::from_str(contents).map_err(|e| ThrottleError::Corrupt(e.to_string()))?;

    raw.into_iter()
        .map(|(k, v)| {
            DateTime::parse_from_rfc3339(&v)
                .map(|d| (k, d.with_timezone(&Utc)))
                .map_err(|e| ThrottleError::Corrupt(e.to_string()))
        })
        .collect()
}

async fn persist_atomic(path: &Path, state: &HashMap<String, DateTime<Utc>>) -> Result<(), ThrottleError> {
    let serializable: HashMap<&str, String> = state.iter().map(|(k, v)| (k.as_str(), v.to_rfc3339())).collect();
    let json = serde_json::to_string_pretty(&serializable).map_err(|e| ThrottleError::Io(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| ThrottleError::Io(e.to_string()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ThrottleError::Io(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("throttle_test_{name}_{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn first_allow_succeeds_second_within_cooldown_fails() {
        let path = temp_path("idempotence");
        let throttle = Throttle::load(&path).await.unwrap();
        let symbol = Symbol::new("BTCUSDT");

        assert!(throttle.allow(&symbol, 5).await.unwrap());
        assert!(!throttle.allow(&symbol, 5).await.unwrap());

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn restart_recovers_persisted_state() {
        let path = temp_path("restart");
        {
            let throttle = Throttle::load(&path).await.unwrap();
            throttle.allow(&Symbol::new("ETHUSDT"), 5).await.unwrap();
        }

        let reloaded = Throttle::load(&path).await.unwrap();
        assert!(!reloaded.allow(&Symbol::new("ETHUSDT"), 5).await.unwrap());

        tokio::fs::remove_file(&path).await.ok();
    }
}
