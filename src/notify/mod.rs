//! Outbound notification seam — per-user delivery channel abstraction.

pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use telegram::{NotifierHub, TelegramApi, TelegramNotifier};

/// Reply-keyboard instruction attached to an outgoing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// Show a one-tap reply keyboard; one inner vec per row.
    Keyboard(Vec<Vec<String>>),
    /// Remove any keyboard shown earlier.
    HideKeyboard,
}

impl ReplyMarkup {
    /// Telegram `reply_markup` JSON for this instruction.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Keyboard(rows) => serde_json::json!({
                "keyboard": rows,
                "resize_keyboard": true,
                "one_time_keyboard": true,
            }),
            Self::HideKeyboard => serde_json::json!({ "remove_keyboard": true }),
        }
    }
}

/// Per-user outbound delivery channel.
///
/// Implementations deliver one rendered template to one user. Callers
/// decide whether a failure matters; nothing here retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `template` with positional `{0}`-style placeholders
    /// substituted from `args`.
    async fn send_notification(
        &self,
        template: &str,
        args: &[String],
        markup: Option<ReplyMarkup>,
    ) -> Result<(), NotifyError>;

    /// Record the user's committed language choice so later messages can
    /// be rendered in it.
    async fn update_locale(&self, codes: &[String]);
}

/// Substitute positional `{0}`, `{1}`, ... placeholders.
pub fn render(template: &str, args: &[String]) -> String {
    let mut text = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        text = text.replace(&format!("{{{i}}}"), arg);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_positional_args() {
        assert_eq!(
            render("Language \"{0}\" wasn't found.", &["Klingon".to_string()]),
            "Language \"Klingon\" wasn't found."
        );
    }

    #[test]
    fn render_without_placeholders_ignores_args() {
        assert_eq!(
            render("Please specify at least one language.", &[String::new()]),
            "Please specify at least one language."
        );
    }

    #[test]
    fn render_handles_multiple_args() {
        assert_eq!(
            render("{0} then {1}", &["a".to_string(), "b".to_string()]),
            "a then b"
        );
    }

    #[test]
    fn keyboard_markup_serializes_rows() {
        let markup = ReplyMarkup::Keyboard(vec![
            vec!["Female".to_string(), "Male".to_string()],
            vec!["Not specified".to_string()],
        ]);
        let json = markup.to_json();
        assert_eq!(json["keyboard"][0][1], "Male");
        assert_eq!(json["keyboard"][1][0], "Not specified");
        assert_eq!(json["one_time_keyboard"], true);
    }

    #[test]
    fn hide_markup_serializes_remove_flag() {
        assert_eq!(ReplyMarkup::HideKeyboard.to_json()["remove_keyboard"], true);
    }
}
