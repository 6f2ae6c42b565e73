//! Configuration types.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, read from the environment.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Path of the local profile database.
    pub database_path: String,
    /// Long-poll timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    /// Read the configuration from `RANDMEET_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("RANDMEET_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("RANDMEET_BOT_TOKEN".into()))?;

        let database_path =
            std::env::var("RANDMEET_DB_PATH").unwrap_or_else(|_| "./data/randmeet.db".to_string());

        let poll_timeout_secs = match std::env::var("RANDMEET_POLL_TIMEOUT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RANDMEET_POLL_TIMEOUT".into(),
                message: format!("not a number of seconds: {raw}"),
            })?,
            Err(_) => 30,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            database_path,
            poll_timeout_secs,
        })
    }
}
