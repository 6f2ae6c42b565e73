//! The setup dialogue — state machine, prompts, and command gating.
//!
//! New users are walked through three questions (spoken languages, own
//! sex, desired partner sex) before the rest of the bot will talk to
//! them. The wizard owns the step transitions; prompt generation lives
//! in [`prompt`] as pure functions.

pub mod prompt;
pub mod wizard;

pub use prompt::{Notice, step_prompt};
pub use wizard::SetupWizard;
