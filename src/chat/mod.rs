pub mod telegram;

pub use telegram::TelegramChat;

use async_trait::async_trait;

/// Injected chat delivery channel. Never throws: transient failures
/// (rate limits, network) are logged by the caller and do not roll back
/// anything already persisted.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> bool;
    async fn send_photo(&self, chat_id: &str, file_path: &str, caption: &str) -> bool;
}

/// Stand-in used when no bot token is configured: logs what would have been
/// sent instead of delivering it, so the coordinator's best-effort chat step
/// stays well-defined even without a transport.
#[derive(Debug, Default)]
pub struct NullChat;

#[async_trait]
impl ChatPort for NullChat {
    async fn send_text(&self, chat_id: &str, text: &str) -> bool {
        tracing::debug!(chat_id, text, "chat not configured; dropping text notification");
        true
    }

    async fn send_photo(&self, chat_id: &str, file_path: &str, caption: &str) -> bool {
        tracing::debug!(chat_id, file_path, caption, "chat not configured; dropping photo notification");
        true
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingChat {
        pub texts: Mutex<Vec<(String, String)>>,
        pub photos: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ChatPort for RecordingChat {
        async fn send_text(&self, chat_id: &str, text: &str) -> bool {
            self.texts.lock().unwrap().push((chat_id.to_string(), text.to_string()));
            true
        }

        async fn send_photo(&self, chat_id: &str, file_path: &str, caption: &str) -> bool {
            self.photos
                .lock()
                .unwrap()
                .push((chat_id.to_string(), file_path.to_string(), caption.to_string()));
            true
        }
    }
}
