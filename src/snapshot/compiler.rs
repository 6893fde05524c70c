//! Snapshot compiler: turns the whole contact repository into one artifact.
//!
//! A cycle reads every contact, renders the vCard blob, writes the artifact,
//! and only then records the new snapshot metadata. A failure at any step
//! leaves the previous snapshot current.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::artifact::ArtifactStore;
use super::model::Snapshot;
use super::vcard;
use crate::error::SnapshotError;
use crate::store::Database;

/// Result of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot is current.
    Compiled(Snapshot),
    /// The repository was empty; nothing was written.
    SkippedEmpty,
}

/// Compiles snapshots from the contact repository.
pub struct SnapshotCompiler {
    store: Arc<dyn Database>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl SnapshotCompiler {
    pub fn new(store: Arc<dyn Database>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { store, artifacts }
    }

    /// Run one compilation cycle stamped with `now`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome, SnapshotError> {
        // Full scan. Fine while the repository stays small.
        let contacts = self
            .store
            .list_contacts()
            .await
            .map_err(SnapshotError::ReadContacts)?;

        if contacts.is_empty() {
            return Ok(CycleOutcome::SkippedEmpty);
        }

        let blob = vcard::render_contacts(&contacts);
        let artifact_location = self
            .artifacts
            .write_artifact(blob.as_bytes())
            .await
            .map_err(SnapshotError::WriteArtifact)?;

        // Metadata last: the gate must never see a generation time whose
        // artifact is not yet durable.
        let snapshot = Snapshot {
            generated_at: now,
            artifact_location,
            contact_count: contacts.len() as u64,
        };
        self.store
            .set_snapshot(&snapshot)
            .await
            .map_err(SnapshotError::UpdateMetadata)?;

        Ok(CycleOutcome::Compiled(snapshot))
    }

    /// Run a cycle from the scheduler. Failures are logged, never propagated;
    /// the next scheduled trigger is the retry.
    pub async fn run_scheduled(&self, now: DateTime<Utc>) -> Option<CycleOutcome> {
        match self.run_cycle(now).await {
            Ok(CycleOutcome::Compiled(snapshot)) => {
                tracing::info!(
                    contacts = snapshot.contact_count,
                    location = %snapshot.artifact_location,
                    generated_at = %snapshot.generated_at,
                    "Master VCF updated"
                );
                Some(CycleOutcome::Compiled(snapshot))
            }
            Ok(CycleOutcome::SkippedEmpty) => {
                tracing::info!("No contacts yet, snapshot compilation skipped");
                Some(CycleOutcome::SkippedEmpty)
            }
            Err(e) => {
                tracing::error!("Snapshot compilation failed, previous snapshot kept: {}", e);
                None
            }
        }
    }
}
