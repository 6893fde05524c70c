//! Unified `Database` trait: single async interface for all persistence.
//!
//! Covers the user registry (join timestamps), the append-only contact
//! repository, and the single current snapshot record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::contacts::Contact;
use crate::error::DatabaseError;
use crate::snapshot::Snapshot;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    /// Channel the user first arrived on.
    pub channel: String,
    /// First interaction. Written once, never updated.
    pub joined_at: DateTime<Utc>,
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert the user with `joined_at = now` unless they already exist.
    /// Returns the stored record, whose `joined_at` never changes.
    async fn register_user(
        &self,
        user_id: &str,
        channel: &str,
        now: DateTime<Utc>,
    ) -> Result<User, DatabaseError>;

    /// Look up a user by id.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, DatabaseError>;

    // ── Contacts ────────────────────────────────────────────────────

    /// Append one contact. A single statement, so readers never see half a row.
    async fn insert_contact(&self, contact: &Contact) -> Result<(), DatabaseError>;

    /// Every contact, in insertion order.
    async fn list_contacts(&self) -> Result<Vec<Contact>, DatabaseError>;

    /// Number of contacts submitted by a user.
    async fn count_contacts_by(&self, user_id: &str) -> Result<u64, DatabaseError>;

    // ── Snapshot ────────────────────────────────────────────────────

    /// The current snapshot, if one was ever compiled.
    async fn get_snapshot(&self) -> Result<Option<Snapshot>, DatabaseError>;

    /// Replace the current snapshot in one statement.
    async fn set_snapshot(&self, snapshot: &Snapshot) -> Result<(), DatabaseError>;
}
