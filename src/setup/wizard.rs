//! The per-user setup dialogue state machine.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{LanguageError, SexError};
use crate::languages;
use crate::message::IncomingMessage;
use crate::notify::{Notifier, NotifierHub, ReplyMarkup};
use crate::profile::{Profile, Sex, SetupStep, WizardState};
use crate::setup::prompt::{self, Notice};
use crate::store::ProfileStore;

/// Command reserved for the first-contact handler; never consumed here.
const START_COMMAND: &str = "start";

pub const COMPLETION_NOTICE: &str = "Thank you. Use /begin to start looking for a conversational partner, once you're matched you can use /end to end the conversation.";
pub const EMPTY_LANGUAGES_NOTICE: &str = "Please specify at least one language.";
pub const LANGUAGE_NOT_FOUND_NOTICE: &str = "Language \"{0}\" wasn't found.";
pub const TOO_MANY_LANGUAGES_NOTICE: &str = "Too many languages were specified. Please shorten your list to 6 languages.";
pub const UNKNOWN_SEX_NOTICE: &str = "Unknown sex: \"{0}\" -- is not a valid sex name.";
pub const FINISH_SETUP_NOTICE: &str = "Finish setup process please. After that you can start using bot.";

/// Walks one user through the profile questions.
///
/// Owns the user's profile for its lifetime and talks to the outside
/// world through the store and notifier seams. Invocations must be
/// serialized per user; the handlers take `&mut self` and assume no
/// concurrent caller.
pub struct SetupWizard {
    profile: Profile,
    store: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
}

impl SetupWizard {
    /// Build a wizard around an already-resolved notifier.
    pub fn new(
        profile: Profile,
        store: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            profile,
            store,
            notifier,
        }
    }

    /// Build a wizard, resolving the user's notifier from the hub
    /// exactly once.
    pub async fn attach(profile: Profile, store: Arc<dyn ProfileStore>, hub: &NotifierHub) -> Self {
        let notifier = hub.get_or_create(profile.user_id()).await;
        Self::new(profile, store, notifier)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Feed an inbound text message to the dialogue.
    ///
    /// Returns whether the message was consumed. Unconsumed messages
    /// belong to whatever handler the router tries next.
    pub async fn handle(&mut self, message: &IncomingMessage) -> bool {
        match self.profile.wizard().clone() {
            WizardState::Inactive => {
                if self.profile.is_novice() {
                    self.activate().await;
                    true
                } else {
                    false
                }
            }
            WizardState::Foreign(_) => false,
            WizardState::Corrupted(step) => {
                warn!(
                    user_id = self.profile.user_id(),
                    step = %step,
                    "unknown wizard step value was found"
                );
                true
            }
            WizardState::Setup(SetupStep::Languages) => {
                self.handle_languages(&message.text).await;
                true
            }
            WizardState::Setup(SetupStep::Sex) => {
                self.handle_sex(&message.text).await;
                true
            }
            WizardState::Setup(SetupStep::PartnerSex) => {
                self.handle_partner_sex(&message.text).await;
                true
            }
        }
    }

    /// Feed a slash command to the dialogue.
    ///
    /// Commands are consumed only while the user still has setup to
    /// finish; `/start` is left to the first-contact handler no matter
    /// what.
    pub async fn handle_command(&mut self, message: &IncomingMessage) -> bool {
        match self.profile.wizard().clone() {
            WizardState::Inactive => {
                let handled = self.handle(message).await;
                if message.command() == Some(START_COMMAND) {
                    return false;
                }
                handled
            }
            WizardState::Foreign(_) => false,
            WizardState::Corrupted(step) => {
                warn!(
                    user_id = self.profile.user_id(),
                    step = %step,
                    "unknown wizard step value was found"
                );
                true
            }
            WizardState::Setup(_) => {
                if self.profile.is_full() {
                    // A finished profile stuck mid-dialogue should not
                    // hold ordinary commands hostage.
                    self.deactivate().await;
                    false
                } else {
                    self.try_notify(&Notice::plain(FINISH_SETUP_NOTICE)).await;
                    self.prompt().await;
                    true
                }
            }
        }
    }

    /// Enter the dialogue at the first question.
    pub async fn activate(&mut self) {
        self.profile
            .set_wizard(WizardState::Setup(SetupStep::Languages));
        self.persist().await;
        self.prompt().await;
    }

    /// Leave the dialogue, thank the user, and drop the keyboard.
    pub async fn deactivate(&mut self) {
        self.profile.set_wizard(WizardState::Inactive);
        self.persist().await;
        self.try_notify(&Notice {
            template: COMPLETION_NOTICE,
            args: Vec::new(),
            markup: Some(ReplyMarkup::HideKeyboard),
        })
        .await;
    }

    async fn handle_languages(&mut self, text: &str) {
        let codes = if self.keeps_languages(text) {
            self.profile.languages().to_vec()
        } else {
            match languages::parse_codes_from_text(text) {
                Ok(codes) => codes,
                Err(LanguageError::Empty) => {
                    self.try_notify(&Notice::plain(EMPTY_LANGUAGES_NOTICE)).await;
                    self.prompt().await;
                    return;
                }
                Err(LanguageError::NotFound(name)) => {
                    self.try_notify(&Notice::with_arg(LANGUAGE_NOT_FOUND_NOTICE, name))
                        .await;
                    self.prompt().await;
                    return;
                }
            }
        };

        if self.profile.set_languages(codes).is_err() {
            info!(
                user_id = self.profile.user_id(),
                text, "too many languages were specified"
            );
            self.try_notify(&Notice::plain(TOO_MANY_LANGUAGES_NOTICE)).await;
            self.prompt().await;
            return;
        }

        self.notifier.update_locale(self.profile.languages()).await;
        self.profile.set_wizard(WizardState::Setup(SetupStep::Sex));
        self.persist().await;
        self.prompt().await;
    }

    async fn handle_sex(&mut self, text: &str) {
        match self.profile.set_sex(text) {
            // Without an own sex there is nothing to ask about partners.
            Ok(Sex::NotSpecified) => self.deactivate().await,
            Ok(_) => {
                self.profile
                    .set_wizard(WizardState::Setup(SetupStep::PartnerSex));
                self.persist().await;
                self.prompt().await;
            }
            Err(SexError(value)) => {
                self.try_notify(&Notice::with_arg(UNKNOWN_SEX_NOTICE, value))
                    .await;
                self.prompt().await;
            }
        }
    }

    async fn handle_partner_sex(&mut self, text: &str) {
        match self.profile.set_partner_sex(text) {
            // Any parsable answer ends the dialogue, "Not specified" included.
            Ok(_) => self.deactivate().await,
            Err(SexError(value)) => {
                self.try_notify(&Notice::with_arg(UNKNOWN_SEX_NOTICE, value))
                    .await;
                self.prompt().await;
            }
        }
    }

    /// The "leave unchanged" keyboard reply, valid only when the profile
    /// already has stored languages.
    fn keeps_languages(&self, text: &str) -> bool {
        if self.profile.languages().is_empty() {
            return false;
        }
        let text = text.trim();
        text == prompt::KEEP_LANGUAGE || text == prompt::KEEP_LANGUAGES
    }

    /// Re-send the question for the current step.
    ///
    /// Quietly does nothing when no step is active, so a stray call can
    /// never message a user outside the dialogue.
    async fn prompt(&self) {
        let WizardState::Setup(step) = self.profile.wizard() else {
            return;
        };
        let notice = prompt::step_prompt(*step, &self.profile);
        self.try_notify(&notice).await;
    }

    /// Deliver a notice, swallowing transport failures.
    ///
    /// A failed send is logged and nothing else; transitions that
    /// already happened stand.
    async fn try_notify(&self, notice: &Notice) {
        if let Err(err) = self
            .notifier
            .send_notification(notice.template, &notice.args, notice.markup.clone())
            .await
        {
            warn!(
                user_id = self.profile.user_id(),
                error = %err,
                "failed to deliver setup notification"
            );
        }
    }

    /// Write the profile through the store seam.
    ///
    /// A failed write is logged; the in-memory transition is not rolled
    /// back.
    async fn persist(&self) {
        if let Err(err) = self.store.save(&self.profile).await {
            error!(
                user_id = self.profile.user_id(),
                error = %err,
                "failed to persist profile"
            );
        } else {
            debug!(user_id = self.profile.user_id(), "profile persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{NotifyError, StorageError};

    /// Captures everything pushed through the notifier seam.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, Vec<String>, Option<ReplyMarkup>)>>,
        locales: Mutex<Vec<Vec<String>>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<(String, Vec<String>, Option<ReplyMarkup>)> {
            self.sent.lock().unwrap().clone()
        }

        fn templates(&self) -> Vec<String> {
            self.sent().into_iter().map(|(t, _, _)| t).collect()
        }

        fn locale_updates(&self) -> usize {
            self.locales.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_notification(
            &self,
            template: &str,
            args: &[String],
            markup: Option<ReplyMarkup>,
        ) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::SendFailed {
                    user_id: 31416,
                    reason: "connection reset".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((template.to_string(), args.to_vec(), markup));
            Ok(())
        }

        async fn update_locale(&self, codes: &[String]) {
            self.locales.lock().unwrap().push(codes.to_vec());
        }
    }

    /// Records every saved profile snapshot.
    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Profile>>,
    }

    impl RecordingStore {
        fn save_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }

        fn last_saved(&self) -> Option<Profile> {
            self.saved.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ProfileStore for RecordingStore {
        async fn load(&self, _user_id: i64) -> Result<Option<Profile>, StorageError> {
            Ok(None)
        }

        async fn save(&self, profile: &Profile) -> Result<(), StorageError> {
            self.saved.lock().unwrap().push(profile.clone());
            Ok(())
        }
    }

    fn wizard_for(
        profile: Profile,
    ) -> (SetupWizard, Arc<RecordingNotifier>, Arc<RecordingStore>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(RecordingStore::default());
        let wizard = SetupWizard::new(profile, store.clone(), notifier.clone());
        (wizard, notifier, store)
    }

    fn at_step(step: SetupStep) -> Profile {
        let mut profile = Profile::new(31416);
        profile.set_wizard(WizardState::Setup(step));
        profile
    }

    fn msg(text: &str) -> IncomingMessage {
        IncomingMessage::new(31416, text)
    }

    #[tokio::test]
    async fn activate_enters_languages_and_prompts_once() {
        let (mut wizard, notifier, store) = wizard_for(Profile::new(31416));
        wizard.activate().await;

        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::Languages)
        );
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            notifier.templates(),
            vec![prompt::LANGUAGES_PROMPT_NONE.to_string()]
        );
    }

    #[tokio::test]
    async fn deactivate_clears_state_and_hides_the_keyboard() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::PartnerSex));
        wizard.deactivate().await;

        assert_eq!(wizard.profile().wizard(), &WizardState::Inactive);
        assert_eq!(store.save_count(), 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, COMPLETION_NOTICE);
        assert_eq!(sent[0].2, Some(ReplyMarkup::HideKeyboard));
    }

    #[tokio::test]
    async fn deactivate_survives_a_delivery_failure() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Sex));
        notifier.fail.store(true, Ordering::SeqCst);
        wizard.deactivate().await;

        assert_eq!(wizard.profile().wizard(), &WizardState::Inactive);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn inactive_novice_is_auto_activated() {
        let (mut wizard, notifier, store) = wizard_for(Profile::new(31416));
        assert!(wizard.handle(&msg("hi there")).await);

        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::Languages)
        );
        assert_eq!(store.save_count(), 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn inactive_veteran_is_left_alone() {
        let mut profile = Profile::new(31416);
        profile.set_languages(vec!["en".into()]).unwrap();
        let (mut wizard, notifier, store) = wizard_for(profile);

        assert!(!wizard.handle(&msg("hi again")).await);
        assert_eq!(store.save_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn foreign_wizard_messages_pass_through() {
        let mut profile = Profile::new(31416);
        profile.set_wizard(WizardState::Foreign("report".into()));
        let (mut wizard, notifier, store) = wizard_for(profile);

        assert!(!wizard.handle(&msg("anything")).await);
        assert_eq!(store.save_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn corrupted_step_is_consumed_silently() {
        let mut profile = Profile::new(31416);
        profile.set_wizard(WizardState::Corrupted("favorite_color".into()));
        let (mut wizard, notifier, store) = wizard_for(profile);

        assert!(wizard.handle(&msg("blue")).await);
        assert_eq!(store.save_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn languages_commit_advances_to_sex() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Languages));
        assert!(wizard.handle(&msg("English")).await);

        assert_eq!(wizard.profile().languages(), ["en".to_string()]);
        assert_eq!(wizard.profile().wizard(), &WizardState::Setup(SetupStep::Sex));
        assert_eq!(notifier.locale_updates(), 1);
        assert_eq!(store.save_count(), 1);
        assert_eq!(notifier.templates(), vec![prompt::SEX_PROMPT.to_string()]);
    }

    #[tokio::test]
    async fn empty_languages_reprompt_without_committing() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Languages));
        assert!(wizard.handle(&msg(" , ")).await);

        assert!(wizard.profile().is_novice());
        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::Languages)
        );
        assert_eq!(store.save_count(), 0);
        assert_eq!(
            notifier.templates(),
            vec![
                EMPTY_LANGUAGES_NOTICE.to_string(),
                prompt::LANGUAGES_PROMPT_NONE.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_language_is_named_in_the_notice() {
        let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::Languages));
        assert!(wizard.handle(&msg("Klingon")).await);

        let sent = notifier.sent();
        assert_eq!(sent[0].0, LANGUAGE_NOT_FOUND_NOTICE);
        assert_eq!(sent[0].1, vec!["Klingon".to_string()]);
        assert_eq!(sent[1].0, prompt::LANGUAGES_PROMPT_NONE);
    }

    #[tokio::test]
    async fn too_many_languages_reprompt_without_committing() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Languages));
        let all_seven = "English, Português, Italiano, Русский, Español, Deutsch, Français";
        assert!(wizard.handle(&msg(all_seven)).await);

        assert!(wizard.profile().is_novice());
        assert_eq!(store.save_count(), 0);
        assert_eq!(notifier.locale_updates(), 0);
        assert_eq!(
            notifier.templates(),
            vec![
                TOO_MANY_LANGUAGES_NOTICE.to_string(),
                prompt::LANGUAGES_PROMPT_NONE.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn keep_languages_reply_advances_with_stored_codes() {
        let mut profile = at_step(SetupStep::Languages);
        profile.set_languages(vec!["pt".into()]).unwrap();
        let (mut wizard, notifier, store) = wizard_for(profile);

        assert!(wizard.handle(&msg(prompt::KEEP_LANGUAGE)).await);
        assert_eq!(wizard.profile().languages(), ["pt".to_string()]);
        assert_eq!(wizard.profile().wizard(), &WizardState::Setup(SetupStep::Sex));
        assert_eq!(notifier.locale_updates(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn sex_answer_advances_to_partner_sex() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Sex));
        assert!(wizard.handle(&msg("Male")).await);

        assert_eq!(wizard.profile().sex(), Some(Sex::Male));
        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::PartnerSex)
        );
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            notifier.templates(),
            vec![prompt::PARTNER_SEX_PROMPT.to_string()]
        );
    }

    #[tokio::test]
    async fn unspecified_sex_ends_the_dialogue() {
        let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::Sex));
        assert!(wizard.handle(&msg("Not specified")).await);

        assert_eq!(wizard.profile().wizard(), &WizardState::Inactive);
        assert_eq!(wizard.profile().sex(), Some(Sex::NotSpecified));
        assert_eq!(notifier.templates(), vec![COMPLETION_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn garbage_sex_answer_reprompts() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Sex));
        assert!(wizard.handle(&msg("dragon")).await);

        assert_eq!(wizard.profile().wizard(), &WizardState::Setup(SetupStep::Sex));
        assert_eq!(store.save_count(), 0);
        let sent = notifier.sent();
        assert_eq!(sent[0].0, UNKNOWN_SEX_NOTICE);
        assert_eq!(sent[0].1, vec!["dragon".to_string()]);
        assert_eq!(sent[1].0, prompt::SEX_PROMPT);
    }

    #[tokio::test]
    async fn any_partner_sex_answer_ends_the_dialogue() {
        for answer in ["Female", "Male", "Not specified"] {
            let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::PartnerSex));
            assert!(wizard.handle(&msg(answer)).await);
            assert_eq!(wizard.profile().wizard(), &WizardState::Inactive);
            assert_eq!(notifier.templates(), vec![COMPLETION_NOTICE.to_string()]);
        }
    }

    #[tokio::test]
    async fn garbage_partner_sex_answer_reprompts() {
        let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::PartnerSex));
        assert!(wizard.handle(&msg("unsure")).await);

        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::PartnerSex)
        );
        let sent = notifier.sent();
        assert_eq!(sent[0].0, UNKNOWN_SEX_NOTICE);
        assert_eq!(sent[1].0, prompt::PARTNER_SEX_PROMPT);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_change_the_verdict() {
        let (mut wizard, notifier, store) = wizard_for(at_step(SetupStep::Languages));
        notifier.fail.store(true, Ordering::SeqCst);

        assert!(wizard.handle(&msg("English")).await);
        assert_eq!(wizard.profile().wizard(), &WizardState::Setup(SetupStep::Sex));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn start_command_is_never_consumed_when_inactive() {
        let (mut wizard, _notifier, store) = wizard_for(Profile::new(31416));
        assert!(!wizard.handle_command(&msg("/start")).await);

        // The underlying handler still ran: the novice got activated.
        assert_eq!(
            wizard.profile().wizard(),
            &WizardState::Setup(SetupStep::Languages)
        );
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn inactive_novice_command_is_consumed() {
        let (mut wizard, _notifier, _store) = wizard_for(Profile::new(31416));
        assert!(wizard.handle_command(&msg("/begin")).await);
    }

    #[tokio::test]
    async fn inactive_veteran_command_falls_through() {
        let mut profile = Profile::new(31416);
        profile.set_languages(vec!["en".into()]).unwrap();
        let (mut wizard, notifier, _store) = wizard_for(profile);

        assert!(!wizard.handle_command(&msg("/begin")).await);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unfinished_profile_blocks_commands() {
        let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::Sex));
        assert!(wizard.handle_command(&msg("/begin")).await);

        assert_eq!(
            notifier.templates(),
            vec![FINISH_SETUP_NOTICE.to_string(), prompt::SEX_PROMPT.to_string()]
        );
        assert_eq!(wizard.profile().wizard(), &WizardState::Setup(SetupStep::Sex));
    }

    #[tokio::test]
    async fn full_profile_mid_dialogue_deactivates_and_falls_through() {
        let mut profile = at_step(SetupStep::Sex);
        profile.set_languages(vec!["en".into()]).unwrap();
        profile.set_sex("male").unwrap();
        profile.set_partner_sex("female").unwrap();
        let (mut wizard, notifier, store) = wizard_for(profile);

        assert!(!wizard.handle_command(&msg("/begin")).await);
        assert_eq!(wizard.profile().wizard(), &WizardState::Inactive);
        assert_eq!(store.save_count(), 1);
        // Only the completion notice, no step prompt and no block notice.
        assert_eq!(notifier.templates(), vec![COMPLETION_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn blocked_command_survives_a_delivery_failure() {
        let (mut wizard, notifier, _store) = wizard_for(at_step(SetupStep::Sex));
        notifier.fail.store(true, Ordering::SeqCst);
        assert!(wizard.handle_command(&msg("/begin")).await);
    }
}
