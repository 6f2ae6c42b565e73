//! Outer message router — long-polls Telegram and feeds the dialogue.
//!
//! The setup wizard always gets the first look at an update; whatever it
//! declines falls through to the small set of top-level commands here.
//! Matchmaking itself runs elsewhere, so `/begin` and `/end` from users
//! with finished profiles are only logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::message::IncomingMessage;
use crate::notify::{Notifier, NotifierHub};
use crate::profile::Profile;
use crate::setup::SetupWizard;
use crate::store::ProfileStore;

pub const GREETING: &str = "Hi! RandMeet matches you with a random stranger for an anonymous chat. Let's set up your profile first.";
pub const HELP_NOTICE: &str = "Commands: /setup to change your profile, /begin to look for a partner, /help to show this message.";
pub const UNKNOWN_COMMAND_NOTICE: &str = "Unknown command. Use /help to list what I understand.";

/// Long-poll driver: keeps one wizard per user and routes updates.
///
/// Updates are dispatched sequentially off one stream, so per-user
/// handling is naturally serialized.
pub struct Bot {
    hub: Arc<NotifierHub>,
    store: Arc<dyn ProfileStore>,
    wizards: HashMap<i64, SetupWizard>,
    poll_timeout_secs: u64,
}

impl Bot {
    pub fn new(config: BotConfig, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            hub: Arc::new(NotifierHub::new(config.bot_token)),
            store,
            wizards: HashMap::new(),
            poll_timeout_secs: config.poll_timeout_secs,
        }
    }

    /// Drive the bot until the update stream ends.
    pub async fn run(&mut self) {
        let mut updates = self.updates();
        info!("listening for Telegram updates");
        while let Some(message) = updates.next().await {
            self.dispatch(message).await;
        }
    }

    /// Route one inbound message.
    pub async fn dispatch(&mut self, message: IncomingMessage) {
        let user_id = message.sender_id;
        if !self.wizards.contains_key(&user_id) {
            let wizard = self.wizard_for(user_id).await;
            self.wizards.insert(user_id, wizard);
        }

        let is_command = message.command().is_some();
        let consumed = match self.wizards.get_mut(&user_id) {
            Some(wizard) if is_command => wizard.handle_command(&message).await,
            Some(wizard) => wizard.handle(&message).await,
            None => false,
        };
        if consumed {
            return;
        }

        if is_command {
            self.run_command(&message).await;
        } else {
            debug!(user_id, "message left for the matching layer");
        }
    }

    /// Load or create the profile and attach a wizard to it.
    async fn wizard_for(&self, user_id: i64) -> SetupWizard {
        let profile = match self.store.load(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => Profile::new(user_id),
            Err(err) => {
                warn!(user_id, error = %err, "failed to load profile, starting fresh");
                Profile::new(user_id)
            }
        };
        SetupWizard::attach(profile, Arc::clone(&self.store), &self.hub).await
    }

    /// Top-level commands, tried only after the wizard declined.
    async fn run_command(&mut self, message: &IncomingMessage) {
        let user_id = message.sender_id;
        match message.command() {
            Some("start") => {
                // Novices were already pulled into the dialogue by the
                // wizard's command gate; this only greets.
                self.send(user_id, GREETING).await;
            }
            Some("setup") => {
                if let Some(wizard) = self.wizards.get_mut(&user_id) {
                    wizard.activate().await;
                }
            }
            Some("help") => {
                self.send(user_id, HELP_NOTICE).await;
            }
            Some("begin") | Some("end") => {
                debug!(user_id, "matchmaking command left for the matching layer");
            }
            Some(other) => {
                debug!(user_id, command = other, "unknown command");
                self.send(user_id, UNKNOWN_COMMAND_NOTICE).await;
            }
            None => {}
        }
    }

    /// Best-effort plain message outside the dialogue.
    async fn send(&self, user_id: i64, text: &'static str) {
        let notifier = self.hub.get_or_create(user_id).await;
        if let Err(err) = notifier.send_notification(text, &[], None).await {
            warn!(user_id, error = %err, "failed to deliver message");
        }
    }

    /// Spawn the long-poll task and return its message stream.
    fn updates(&self) -> UnboundedReceiverStream<IncomingMessage> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let api = self.hub.api();
        let timeout = self.poll_timeout_secs;

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": timeout,
                    "allowed_updates": ["message"],
                });
                let data = match api.post("getUpdates", &body).await {
                    Ok(data) => data,
                    Err(err) => {
                        warn!(error = %err, "update poll failed");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    continue;
                };
                for update in results {
                    if let Some(update_id) =
                        update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = update_id + 1;
                    }
                    let Some(message) = update.get("message") else {
                        continue;
                    };
                    let Some(text) = message.get("text").and_then(serde_json::Value::as_str)
                    else {
                        continue;
                    };
                    let Some(sender_id) = message
                        .get("from")
                        .and_then(|from| from.get("id"))
                        .and_then(serde_json::Value::as_i64)
                    else {
                        continue;
                    };

                    if tx.send(IncomingMessage::new(sender_id, text)).is_err() {
                        info!("update listener closed");
                        return;
                    }
                }
            }
        });

        UnboundedReceiverStream::new(rx)
    }
}
