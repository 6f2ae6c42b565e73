//! Supported languages and free-text language parsing.
//!
//! The table below is the single source of truth: keyboard order,
//! name lookup, and code validation all derive from it.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::LanguageError;

/// Supported languages in display order. Codes are ISO 639-1; names are
/// the native display names shown on the reply keyboard.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("pt", "Português"),
    ("it", "Italiano"),
    ("ru", "Русский"),
    ("es", "Español"),
    ("de", "Deutsch"),
    ("fr", "Français"),
];

/// Display names in table order.
pub fn supported_names() -> impl Iterator<Item = &'static str> {
    SUPPORTED_LANGUAGES.iter().map(|(_, name)| *name)
}

/// The display name for a supported code.
pub fn name_for_code(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn code_for_token(token: &str) -> Option<&'static str> {
    let lowered = token.to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(code, name)| *code == lowered || name.to_lowercase() == lowered)
        .map(|(code, _)| *code)
}

fn delimiter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;\n]").expect("valid delimiter pattern"))
}

/// Parse a free-text enumeration like `"English, Italiano"` into codes.
///
/// Accepts display names or codes, case-insensitive, split on commas,
/// semicolons, or newlines. Order is preserved, duplicates dropped.
pub fn parse_codes_from_text(text: &str) -> Result<Vec<String>, LanguageError> {
    let mut codes: Vec<String> = Vec::new();
    for raw in delimiter().split(text) {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        let code =
            code_for_token(token).ok_or_else(|| LanguageError::NotFound(token.to_string()))?;
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }
    if codes.is_empty() {
        return Err(LanguageError::Empty);
    }
    Ok(codes)
}

/// Resolve stored codes back to display names, keeping order.
pub fn resolve_names_from_codes<'a, I>(codes: I) -> Result<Vec<&'static str>, LanguageError>
where
    I: IntoIterator<Item = &'a str>,
{
    codes
        .into_iter()
        .map(|code| name_for_code(code).ok_or_else(|| LanguageError::NotFound(code.to_string())))
        .collect()
}
