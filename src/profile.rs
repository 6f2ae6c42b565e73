//! Per-user profile: matching preferences plus the dialogue position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, SexError};

/// Most languages a profile may list, best first.
pub const MAX_LANGUAGES: usize = 6;

/// A user's sex, as far as they chose to share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    NotSpecified,
    Female,
    Male,
}

impl Sex {
    /// Parse a free-text or keyboard answer.
    pub fn from_text(text: &str) -> Result<Self, SexError> {
        let token = text.trim();
        match token.to_lowercase().as_str() {
            "female" => Ok(Self::Female),
            "male" => Ok(Self::Male),
            "not specified" | "not_specified" => Ok(Self::NotSpecified),
            _ => Err(SexError(token.to_string())),
        }
    }

    pub(crate) fn as_stored(&self) -> &'static str {
        match self {
            Self::NotSpecified => "not_specified",
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    pub(crate) fn from_stored(s: &str) -> Option<Self> {
        match s {
            "not_specified" => Some(Self::NotSpecified),
            "female" => Some(Self::Female),
            "male" => Some(Self::Male),
            _ => None,
        }
    }
}

/// One question of the setup dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Languages,
    Sex,
    PartnerSex,
}

impl SetupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Languages => "languages",
            Self::Sex => "sex",
            Self::PartnerSex => "partner_sex",
        }
    }
}

impl std::fmt::Display for SetupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which dialogue, if any, currently owns a user's messages.
///
/// Mode and step are collapsed into one tag, so an inactive profile can
/// never carry a stale step. Stored rows written by other software may
/// still hold values this build does not own; decoding keeps them
/// distinct so the router can leave those sessions alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    /// No wizard is active.
    Inactive,
    /// The setup dialogue owns the session, at the given step.
    Setup(SetupStep),
    /// The setup tag paired with a step value we don't recognize.
    Corrupted(String),
    /// A different dialogue owns the session.
    Foreign(String),
}

impl WizardState {
    /// Decode the stored `(wizard, wizard_step)` column pair.
    pub fn from_stored(wizard: &str, step: Option<&str>) -> Self {
        match wizard {
            "none" => Self::Inactive,
            "setup" => match step {
                Some("languages") => Self::Setup(SetupStep::Languages),
                Some("sex") => Self::Setup(SetupStep::Sex),
                Some("partner_sex") => Self::Setup(SetupStep::PartnerSex),
                Some(other) => Self::Corrupted(other.to_string()),
                None => Self::Corrupted(String::new()),
            },
            other => Self::Foreign(other.to_string()),
        }
    }

    /// Encode back to the stored column pair.
    pub fn as_stored(&self) -> (&str, Option<&str>) {
        match self {
            Self::Inactive => ("none", None),
            Self::Setup(step) => ("setup", Some(step.as_str())),
            Self::Corrupted(step) => ("setup", Some(step.as_str())),
            Self::Foreign(owner) => (owner.as_str(), None),
        }
    }
}

/// Persisted per-user record.
///
/// Mutated only through the validated setters; the dialogue decides when
/// a mutation is committed to storage.
#[derive(Debug, Clone)]
pub struct Profile {
    user_id: i64,
    wizard: WizardState,
    languages: Option<Vec<String>>,
    sex: Option<Sex>,
    partner_sex: Option<Sex>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile for a user seen for the first time.
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            wizard: WizardState::Inactive,
            languages: None,
            sex: None,
            partner_sex: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reassemble a profile from its stored parts.
    pub(crate) fn from_parts(
        user_id: i64,
        wizard: WizardState,
        languages: Option<Vec<String>>,
        sex: Option<Sex>,
        partner_sex: Option<Sex>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            wizard,
            languages,
            sex,
            partner_sex,
            created_at,
            updated_at,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn wizard(&self) -> &WizardState {
        &self.wizard
    }

    pub(crate) fn set_wizard(&mut self, state: WizardState) {
        self.wizard = state;
    }

    /// Languages the user listed, best first. Empty when never set.
    pub fn languages(&self) -> &[String] {
        self.languages.as_deref().unwrap_or(&[])
    }

    /// Commit a validated language list, best first.
    pub fn set_languages(&mut self, codes: Vec<String>) -> Result<(), ProfileError> {
        if codes.len() > MAX_LANGUAGES {
            return Err(ProfileError::TooManyLanguages {
                count: codes.len(),
                max: MAX_LANGUAGES,
            });
        }
        self.languages = Some(codes);
        Ok(())
    }

    pub fn sex(&self) -> Option<Sex> {
        self.sex
    }

    pub fn partner_sex(&self) -> Option<Sex> {
        self.partner_sex
    }

    /// Record the user's own sex from a free-text answer.
    pub fn set_sex(&mut self, text: &str) -> Result<Sex, SexError> {
        let sex = Sex::from_text(text)?;
        self.sex = Some(sex);
        Ok(sex)
    }

    /// Record the desired partner sex from a free-text answer.
    pub fn set_partner_sex(&mut self, text: &str) -> Result<Sex, SexError> {
        let sex = Sex::from_text(text)?;
        self.partner_sex = Some(sex);
        Ok(sex)
    }

    /// True until the user has picked languages for the first time.
    pub fn is_novice(&self) -> bool {
        self.languages.is_none()
    }

    /// Whether enough fields are set to use the bot outside the dialogue.
    pub fn is_full(&self) -> bool {
        self.languages.is_some() && self.sex.is_some() && self.partner_sex.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
