//! Prompt and keyboard generation for each dialogue step.
//!
//! Pure mapping from (step, profile snapshot) to a notification payload.
//! Nothing here persists or sends; the wizard owns both.

use tracing::warn;

use crate::languages;
use crate::notify::ReplyMarkup;
use crate::profile::{Profile, SetupStep};

pub const LANGUAGES_PROMPT_NONE: &str = "Enumerate the languages you speak like this: \"English, Italiano\" -- in descending order of your speaking convenience or just pick one at special keyboard.";
pub const LANGUAGES_PROMPT_ONE: &str = "Your current language is {0}. Enumerate the languages you speak like this: \"English, Italiano\" -- in descending order of your speaking convenience or just pick one at special keyboard.";
pub const LANGUAGES_PROMPT_MANY: &str = "Your current languages are: {0}. Enumerate the languages you speak the same way -- in descending order of your speaking convenience or just pick one at special keyboard.";
pub const KEEP_LANGUAGE: &str = "Leave the language unchanged";
pub const KEEP_LANGUAGES: &str = "Leave the languages unchanged";
pub const SEX_PROMPT: &str = "Set up your sex. If you pick \"Not specified\" you can't choose your partner's sex.";
pub const PARTNER_SEX_PROMPT: &str = "Choose your partner's sex";

/// A ready-to-send notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub template: &'static str,
    pub args: Vec<String>,
    pub markup: Option<ReplyMarkup>,
}

impl Notice {
    pub fn plain(template: &'static str) -> Self {
        Self {
            template,
            args: Vec::new(),
            markup: None,
        }
    }

    pub fn with_arg(template: &'static str, arg: impl Into<String>) -> Self {
        Self {
            template,
            args: vec![arg.into()],
            markup: None,
        }
    }
}

/// Base language keyboard: display names two per row in table order, any
/// trailing unpaired name alone on the last row.
fn language_rows() -> Vec<Vec<String>> {
    let names: Vec<&str> = languages::supported_names().collect();
    names
        .chunks(2)
        .map(|pair| pair.iter().map(|name| name.to_string()).collect())
        .collect()
}

fn sex_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(vec![
        vec!["Female".to_string(), "Male".to_string()],
        vec!["Not specified".to_string()],
    ])
}

/// Build the question for a step from the current profile snapshot.
pub fn step_prompt(step: SetupStep, profile: &Profile) -> Notice {
    match step {
        SetupStep::Languages => languages_prompt(profile),
        SetupStep::Sex => Notice {
            template: SEX_PROMPT,
            args: Vec::new(),
            markup: Some(sex_keyboard()),
        },
        SetupStep::PartnerSex => Notice {
            template: PARTNER_SEX_PROMPT,
            args: Vec::new(),
            markup: Some(sex_keyboard()),
        },
    }
}

fn from_scratch(rows: Vec<Vec<String>>) -> Notice {
    Notice {
        template: LANGUAGES_PROMPT_NONE,
        args: vec![String::new()],
        markup: Some(ReplyMarkup::Keyboard(rows)),
    }
}

fn languages_prompt(profile: &Profile) -> Notice {
    let codes = profile.languages();
    let mut rows = language_rows();

    if codes.is_empty() {
        return from_scratch(rows);
    }

    let names = match languages::resolve_names_from_codes(codes.iter().map(String::as_str)) {
        Ok(names) => names,
        Err(err) => {
            warn!(
                user_id = profile.user_id(),
                error = %err,
                "stored language codes no longer resolve, prompting from scratch"
            );
            return from_scratch(rows);
        }
    };

    if let [name] = names.as_slice() {
        rows.push(vec![KEEP_LANGUAGE.to_string()]);
        Notice {
            template: LANGUAGES_PROMPT_ONE,
            args: vec![(*name).to_string()],
            markup: Some(ReplyMarkup::Keyboard(rows)),
        }
    } else {
        rows.push(vec![KEEP_LANGUAGES.to_string()]);
        Notice {
            template: LANGUAGES_PROMPT_MANY,
            args: vec![names.join(", ")],
            markup: Some(ReplyMarkup::Keyboard(rows)),
        }
    }
}
