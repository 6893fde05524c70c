//! The current compiled address book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of the most recent successful compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the artifact was compiled. Users who joined before this may
    /// download it.
    pub generated_at: DateTime<Utc>,
    /// Where users fetch the artifact.
    pub artifact_location: String,
    /// Number of contacts in the artifact.
    pub contact_count: u64,
}
