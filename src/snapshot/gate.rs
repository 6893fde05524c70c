//! Access gate: decides whether a user may download the current snapshot.

use chrono::{DateTime, Utc};

use super::model::Snapshot;

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    /// `None` when the user never registered.
    pub user_joined_at: Option<DateTime<Utc>>,
    /// At least one contact was submitted by the user.
    pub has_contributed: bool,
    /// `None` when no snapshot was ever compiled.
    pub snapshot: Option<&'a Snapshot>,
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow { artifact_location: String },
    DenyNotRegistered,
    DenyNoContribution,
    /// No snapshot yet, or the user joined at or after its compilation.
    DenyNotEligible,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Text shown to the user.
    pub fn reply_text(&self) -> String {
        match self {
            Self::Allow { artifact_location } => {
                format!("✅ Download latest VCF:\n{artifact_location}")
            }
            Self::DenyNotRegistered => "❌ You are not registered.".to_string(),
            Self::DenyNoContribution => "❌ Add at least one contact first.".to_string(),
            Self::DenyNotEligible => "❌ You cannot access this month's VCF yet.".to_string(),
        }
    }
}

/// Decide access. Checks run in order: registration, contribution, timing.
///
/// Timing is strict: a user who joined at the exact compilation instant
/// is denied, since their contribution cannot be in that artifact.
pub fn evaluate(input: &GateInput<'_>) -> AccessDecision {
    let Some(joined_at) = input.user_joined_at else {
        return AccessDecision::DenyNotRegistered;
    };
    if !input.has_contributed {
        return AccessDecision::DenyNoContribution;
    }
    match input.snapshot {
        Some(snapshot) if joined_at < snapshot.generated_at => AccessDecision::Allow {
            artifact_location: snapshot.artifact_location.clone(),
        },
        _ => AccessDecision::DenyNotEligible,
    }
}
