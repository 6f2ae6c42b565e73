//! Telegram-backed delivery — one notifier per user, shared HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};

use crate::error::NotifyError;
use crate::languages;

use super::{Notifier, ReplyMarkup, render};

/// Shared Telegram Bot API client.
pub struct TelegramApi {
    client: reqwest::Client,
    token: SecretString,
}

impl TelegramApi {
    pub fn new(token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    pub(crate) fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.token.expose_secret()
        )
    }

    /// POST a JSON body to a Bot API method and return the parsed reply.
    pub(crate) async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, NotifyError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| NotifyError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api(format!(
                "{method} returned {status}: {detail}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| NotifyError::Api(e.to_string()))
    }
}

/// Delivery channel for a single user.
pub struct TelegramNotifier {
    api: Arc<TelegramApi>,
    chat_id: i64,
    locale: RwLock<String>,
}

impl TelegramNotifier {
    fn new(api: Arc<TelegramApi>, chat_id: i64) -> Self {
        Self {
            api,
            chat_id,
            locale: RwLock::new("en".to_string()),
        }
    }

    /// Language code the user's messages are currently rendered in.
    pub async fn locale(&self) -> String {
        self.locale.read().await.clone()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_notification(
        &self,
        template: &str,
        args: &[String],
        markup: Option<ReplyMarkup>,
    ) -> Result<(), NotifyError> {
        let text = render(template, args);
        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if let Some(markup) = markup {
            body["reply_markup"] = markup.to_json();
        }
        self.api
            .post("sendMessage", &body)
            .await
            .map_err(|e| NotifyError::SendFailed {
                user_id: self.chat_id,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn update_locale(&self, codes: &[String]) {
        let code = codes
            .iter()
            .find(|code| languages::name_for_code(code).is_some())
            .map(|code| code.as_str())
            .unwrap_or("en");
        *self.locale.write().await = code.to_string();
    }
}

/// Fetch-or-create registry of per-user notifiers.
///
/// Each user gets exactly one notifier for the hub's lifetime; the
/// dialogue resolves it once at construction and holds on to it.
pub struct NotifierHub {
    api: Arc<TelegramApi>,
    senders: Mutex<HashMap<i64, Arc<TelegramNotifier>>>,
}

impl NotifierHub {
    pub fn new(token: SecretString) -> Self {
        Self {
            api: Arc::new(TelegramApi::new(token)),
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// The shared API client, for the update poller.
    pub fn api(&self) -> Arc<TelegramApi> {
        Arc::clone(&self.api)
    }

    /// Get the notifier for a user, creating it on first request.
    pub async fn get_or_create(&self, user_id: i64) -> Arc<TelegramNotifier> {
        let mut senders = self.senders.lock().await;
        Arc::clone(
            senders
                .entry(user_id)
                .or_insert_with(|| Arc::new(TelegramNotifier::new(Arc::clone(&self.api), user_id))),
        )
    }
}
