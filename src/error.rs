//! Error types for vcf-bot.

use std::path::PathBuf;

/// Failure inside one unit of work: handling a message or running the bot loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} not registered")]
    NotFound { name: String },
}

/// Rejected dialogue input. Recovered locally by reprompting the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Contact name cannot be empty")]
    EmptyName,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}

/// Artifact storage errors.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A snapshot compilation cycle failed; the previous snapshot stays current.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to read contacts: {0}")]
    ReadContacts(#[source] DatabaseError),

    #[error("Failed to persist artifact: {0}")]
    WriteArtifact(#[source] ArtifactError),

    #[error("Failed to update snapshot metadata: {0}")]
    UpdateMetadata(#[source] DatabaseError),

    #[error("Invalid schedule '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },
}

/// Operator notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(#[from] ChannelError),
}
