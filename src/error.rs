//! Error types for RandMeet.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Language error: {0}")]
    Language(#[from] LanguageError),

    #[error("Sex error: {0}")]
    Sex(#[from] SexError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Profile storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Outbound delivery errors. Delivery is best effort; a transition that
/// already happened is never rolled back because of one of these.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification to user {user_id}: {reason}")]
    SendFailed { user_id: i64, reason: String },

    #[error("Telegram API request failed: {0}")]
    Api(String),
}

/// Free-text language parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error("No languages were recognized in the input")]
    Empty,

    #[error("Language \"{0}\" wasn't found")]
    NotFound(String),
}

/// A free-text answer that doesn't name a sex.
#[derive(Debug, thiserror::Error)]
#[error("Unknown sex: \"{0}\"")]
pub struct SexError(pub String);

/// Profile validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Too many languages: {count} given, at most {max} allowed")]
    TooManyLanguages { count: usize, max: usize },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
