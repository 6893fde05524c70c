//! Menu commands and the reply texts that go with them.

use crate::channels::Keyboard;

/// Parsed user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    AddContact,
    DownloadVcf,
    Help,
    /// Anything else. Fed to the add-contact dialogue when one is active.
    Input(String),
}

impl Command {
    /// Parse message content. Button labels are matched exactly (after
    /// trimming); slash aliases are accepted for typed use.
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        match trimmed {
            "/start" | "start" => Self::Start,
            "Add Contact" | "/add" => Self::AddContact,
            "Download VCF" | "/vcf" => Self::DownloadVcf,
            "Help" | "/help" => Self::Help,
            _ => Self::Input(trimmed.to_string()),
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AddContact => "add_contact",
            Self::DownloadVcf => "download_vcf",
            Self::Help => "help",
            Self::Input(_) => "input",
        }
    }

    /// Reply sent when handling this command hit a storage failure.
    pub fn failure_reply(&self) -> &'static str {
        match self {
            Self::DownloadVcf => DOWNLOAD_FAILED,
            Self::Input(_) => SAVE_FAILED,
            _ => GENERIC_FAILURE,
        }
    }
}

/// The persistent menu shown after `/start`.
pub fn menu_keyboard() -> Keyboard {
    vec![
        vec!["Add Contact".to_string(), "Download VCF".to_string()],
        vec!["Help".to_string()],
    ]
}

pub const WELCOME: &str = "Welcome! Choose an option:";
pub const HELP: &str = "📌 Bot Commands:\n- Add Contact: Step-by-step Name+Number\n- Download VCF: Must have added at least 1 contact and joined before last monthly update";
pub const NAME_PROMPT: &str = "Step 1/2: Enter Name of the contact:";
pub const NAME_EMPTY: &str = "❌ Name cannot be empty. Enter Name of the contact:";
pub const PHONE_PROMPT: &str =
    "Step 2/2: Enter WhatsApp Number with country code (e.g. +8801712345678):";
pub const INVALID_PHONE: &str = "❌ Invalid number format. Try again.";
pub const USE_MENU: &str = "Please choose an option from the menu, or send /start.";
pub const NOTIFY_FAILED: &str = "⚠️ Something went wrong while notifying the admin.";
pub const DOWNLOAD_FAILED: &str = "❌ Error fetching VCF.";
pub const SAVE_FAILED: &str = "❌ Could not save the contact. Please send the number again.";
pub const GENERIC_FAILURE: &str = "❌ Something went wrong. Please try again.";

/// Confirmation after a contact is stored.
pub fn contact_saved(name: &str, phone: &str) -> String {
    format!("✅ Contact saved: {name} - {phone}")
}
