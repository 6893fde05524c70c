//! Dialogue registry: in-memory per-user dialogue state.
//!
//! Entries exist only while a dialogue is in progress. Nothing is persisted,
//! so a restart drops every unfinished dialogue.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::dialogue::DialogueState;

/// Maps user id to that user's active dialogue.
#[derive(Debug, Default)]
pub struct DialogueRegistry {
    states: RwLock<HashMap<String, DialogueState>>,
}

impl DialogueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a user; `Idle` when no dialogue is active.
    pub async fn get(&self, user_id: &str) -> DialogueState {
        self.states
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Start (or restart) a dialogue for a user.
    pub async fn begin(&self, user_id: &str) -> DialogueState {
        let state = DialogueState::begin();
        self.set(user_id, state.clone()).await;
        state
    }

    /// Commit a state. Setting `Idle` removes the entry.
    pub async fn set(&self, user_id: &str, state: DialogueState) {
        let mut states = self.states.write().await;
        if state.is_active() {
            states.insert(user_id.to_string(), state);
        } else {
            states.remove(user_id);
        }
    }

    /// Number of dialogues currently in progress.
    pub async fn active_count(&self) -> usize {
        self.states.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_is_idle() {
        let registry = DialogueRegistry::new();
        assert_eq!(registry.get("nobody").await, DialogueState::Idle);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn begin_overwrites_abandoned_dialogue() {
        let registry = DialogueRegistry::new();
        registry
            .set("u1", DialogueState::AwaitingPhone { name: "Old".into() })
            .await;

        let state = registry.begin("u1").await;
        assert_eq!(state, DialogueState::AwaitingName);
        assert_eq!(registry.get("u1").await, DialogueState::AwaitingName);
    }

    #[tokio::test]
    async fn setting_idle_removes_entry() {
        let registry = DialogueRegistry::new();
        registry.begin("u1").await;
        assert_eq!(registry.active_count().await, 1);

        registry.set("u1", DialogueState::Idle).await;
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(registry.get("u1").await, DialogueState::Idle);
    }

    #[tokio::test]
    async fn users_are_independent() {
        let registry = DialogueRegistry::new();
        registry.begin("u1").await;
        registry
            .set("u2", DialogueState::AwaitingPhone { name: "Bob".into() })
            .await;

        registry.set("u1", DialogueState::Idle).await;

        assert_eq!(registry.get("u1").await, DialogueState::Idle);
        assert_eq!(
            registry.get("u2").await,
            DialogueState::AwaitingPhone { name: "Bob".into() }
        );
        assert_eq!(registry.active_count().await, 1);
    }
}
