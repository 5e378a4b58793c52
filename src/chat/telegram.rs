use std::time::Duration;

use reqwest::multipart;
use reqwest::Client;
use tracing::warn;

use super::ChatPort;

/// Minimal Telegram Bot API client over `reqwest`. Only the two calls the
/// chat port needs (`sendMessage`, `sendPhoto`): no update polling, no
/// inline keyboards, no webhook server.
#[derive(Debug, Clone)]
pub struct TelegramChat {
    client: Client,
    bot_token: String,
}

impl TelegramChat {
    pub fn new(bot_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            bot_token: bot_token.into(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

#[async_trait::async_trait]
impl ChatPort for TelegramChat {
    async fn send_text(&self, chat_id: &str, text: &str) -> bool {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .form(&[("chat_id", chat_id), ("text", text), ("parse_mode", "HTML")])
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                warn!(status = %r.status(), "telegram sendMessage failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "telegram sendMessage request failed");
                false
            }
        }
    }

    async fn send_photo(&self, chat_id: &str, file_path: &str, caption: &str) -> bool {
        let bytes = match tokio::fs::read(file_path).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, file_path, "failed to read chart file for telegram upload");
                return false;
            }
        };

        let filename = std::path::Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("chart.png")
            .to_string();

        let part = match multipart::Part::bytes(bytes).file_name(filename).mime_str("image/png") {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to build telegram multipart body");
                return false;
            }
        };

        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let resp = self.client.post(self.api_url("sendPhoto")).multipart(form).send().await;

        match resp {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                warn!(status = %r.status(), "telegram sendPhoto failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "telegram sendPhoto request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token_and_method() {
        let chat = TelegramChat::new("12345:ABC");
        assert_eq!(chat.api_url("sendMessage"), "https://api.telegram.org/bot12345:ABC/sendMessage");
    }
}
