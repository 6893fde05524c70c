//! Add-contact dialogue: a pure state machine over user input.
//!
//! Progresses Idle → AwaitingName → AwaitingPhone → Idle. The machine owns
//! no storage: [`advance`] maps `(state, input)` to the next state plus the
//! effect the caller must carry out. The caller decides when a state is
//! committed (see `contacts::registry`).

use serde::{Deserialize, Serialize};

use super::model::{PhoneNumber, normalize_name};
use crate::error::ValidationError;

/// Where a user is in the add-contact dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogueState {
    /// No dialogue in progress.
    #[default]
    Idle,
    AwaitingName,
    AwaitingPhone { name: String },
}

impl DialogueState {
    /// State entered by the "Add Contact" command. Any previous dialogue is
    /// discarded; there is no resume.
    pub fn begin() -> Self {
        Self::AwaitingName
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Step label, matching the serde tag.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPhone { .. } => "awaiting_phone",
        }
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.step())
    }
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Input arrived with no dialogue in progress; not ours to handle.
    Ignore,
    /// Name accepted; ask for the phone number.
    PromptPhone { name: String },
    /// Name rejected; ask again.
    RejectName(ValidationError),
    /// Phone rejected; ask again.
    RejectPhone(ValidationError),
    /// Both fields captured; persist exactly one contact.
    SaveContact { name: String, phone: PhoneNumber },
}

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: DialogueState,
    pub effect: Effect,
}

/// Advance the dialogue by one user input.
pub fn advance(state: &DialogueState, input: &str) -> Transition {
    match state {
        DialogueState::Idle => Transition {
            next: DialogueState::Idle,
            effect: Effect::Ignore,
        },
        DialogueState::AwaitingName => match normalize_name(input) {
            Ok(name) => Transition {
                next: DialogueState::AwaitingPhone { name: name.clone() },
                effect: Effect::PromptPhone { name },
            },
            Err(e) => Transition {
                next: DialogueState::AwaitingName,
                effect: Effect::RejectName(e),
            },
        },
        DialogueState::AwaitingPhone { name } => match PhoneNumber::parse(input) {
            Ok(phone) => Transition {
                next: DialogueState::Idle,
                effect: Effect::SaveContact {
                    name: name.clone(),
                    phone,
                },
            },
            Err(e) => Transition {
                next: state.clone(),
                effect: Effect::RejectPhone(e),
            },
        },
    }
}
