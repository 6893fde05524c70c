//! Operator notifications for newly added contacts.
//!
//! The bot emits a [`ContactAdded`] event only after the contact is
//! persisted. Delivery failures are returned to the caller, which logs them;
//! they never undo the write.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{ChannelManager, OutgoingResponse};
use crate::error::NotifyError;

/// A contact was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactAdded {
    pub contributor_id: String,
    pub contributor_name: String,
    pub name: String,
    pub phone: String,
}

impl ContactAdded {
    /// Plain-text message sent to the operator.
    pub fn message(&self) -> String {
        format!(
            "New contact added:\nName: {}\nPhone: {}\nFrom: {} ({})",
            self.name, self.phone, self.contributor_name, self.contributor_id
        )
    }
}

/// Consumer of contact events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ContactAdded) -> Result<(), NotifyError>;
}

/// Sends events to one operator through a named channel.
pub struct OperatorNotifier {
    channels: Arc<ChannelManager>,
    channel: String,
    operator_id: String,
}

impl OperatorNotifier {
    pub fn new(
        channels: Arc<ChannelManager>,
        channel: impl Into<String>,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            channels,
            channel: channel.into(),
            operator_id: operator_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for OperatorNotifier {
    async fn notify(&self, event: &ContactAdded) -> Result<(), NotifyError> {
        self.channels
            .send_to(
                &self.channel,
                &self.operator_id,
                OutgoingResponse::text(event.message()),
            )
            .await?;
        tracing::debug!(
            channel = %self.channel,
            operator = %self.operator_id,
            "Operator notified"
        );
        Ok(())
    }
}

/// Used when no operator is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &ContactAdded) -> Result<(), NotifyError> {
        Ok(())
    }
}
