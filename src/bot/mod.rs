//! The bot: routes menu commands, drives the add-contact dialogue, and
//! answers download requests through the access gate.

pub mod command;

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

pub use command::{Command, menu_keyboard};

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse};
use crate::contacts::{Contact, DialogueRegistry, Effect, NewContact, Transition, advance};
use crate::error::Error;
use crate::notifier::{ContactAdded, Notifier};
use crate::snapshot::{GateInput, evaluate};
use crate::store::Database;

/// Shared components the bot needs.
pub struct BotDeps {
    pub store: Arc<dyn Database>,
    pub registry: Arc<DialogueRegistry>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Bot {
    deps: BotDeps,
}

impl Bot {
    pub fn new(deps: BotDeps) -> Self {
        Self { deps }
    }

    pub fn registry(&self) -> &Arc<DialogueRegistry> {
        &self.deps.registry
    }

    /// Handle one message and produce the reply.
    ///
    /// The message's `received_at` is the clock for everything this turn
    /// records (join time, contact creation). Failures are logged and turned
    /// into a reply; nothing escapes.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> OutgoingResponse {
        let command = Command::parse(&msg.content);
        tracing::debug!(
            channel = %msg.channel,
            user_id = %msg.user_id,
            command = command.label(),
            "Handling message"
        );

        let result = match &command {
            Command::Start => self.start(msg).await,
            Command::AddContact => Ok(self.add_contact(msg).await),
            Command::DownloadVcf => self.download_vcf(msg).await,
            Command::Help => Ok(OutgoingResponse::text(command::HELP)),
            Command::Input(text) => self.dialogue_input(msg, text).await,
        };

        result.unwrap_or_else(|e| {
            tracing::error!(
                user_id = %msg.user_id,
                command = command.label(),
                "Failed to handle message: {}",
                e
            );
            OutgoingResponse::text(command.failure_reply())
        })
    }

    async fn start(&self, msg: &IncomingMessage) -> Result<OutgoingResponse, Error> {
        let user = self
            .deps
            .store
            .register_user(&msg.user_id, &msg.channel, msg.received_at)
            .await?;
        tracing::debug!(user_id = %user.id, joined_at = %user.joined_at, "User registered");

        Ok(OutgoingResponse::text(command::WELCOME).with_keyboard(menu_keyboard()))
    }

    async fn add_contact(&self, msg: &IncomingMessage) -> OutgoingResponse {
        self.deps.registry.begin(&msg.user_id).await;
        OutgoingResponse::text(command::NAME_PROMPT)
    }

    async fn download_vcf(&self, msg: &IncomingMessage) -> Result<OutgoingResponse, Error> {
        let store = &self.deps.store;

        let user = store.get_user(&msg.user_id).await?;
        let has_contributed = match &user {
            Some(user) => store.count_contacts_by(&user.id).await? > 0,
            None => false,
        };
        let snapshot = store.get_snapshot().await?;

        let decision = evaluate(&GateInput {
            user_joined_at: user.map(|u| u.joined_at),
            has_contributed,
            snapshot: snapshot.as_ref(),
        });
        if !decision.is_allowed() {
            tracing::debug!(user_id = %msg.user_id, ?decision, "Download denied");
        }

        Ok(OutgoingResponse::text(decision.reply_text()))
    }

    async fn dialogue_input(
        &self,
        msg: &IncomingMessage,
        input: &str,
    ) -> Result<OutgoingResponse, Error> {
        let registry = &self.deps.registry;
        let state = registry.get(&msg.user_id).await;
        let Transition { next, effect } = advance(&state, input);

        let reply = match effect {
            Effect::Ignore => command::USE_MENU.to_string(),
            Effect::PromptPhone { .. } => {
                registry.set(&msg.user_id, next).await;
                command::PHONE_PROMPT.to_string()
            }
            Effect::RejectName(_) => command::NAME_EMPTY.to_string(),
            Effect::RejectPhone(_) => command::INVALID_PHONE.to_string(),
            Effect::SaveContact { name, phone } => {
                let contact = Contact::from_new(
                    NewContact {
                        name,
                        phone,
                        submitted_by: msg.user_id.clone(),
                    },
                    msg.received_at,
                );
                // On failure the dialogue stays at the phone step.
                self.deps.store.insert_contact(&contact).await?;
                registry.set(&msg.user_id, next).await;
                tracing::info!(
                    user_id = %msg.user_id,
                    contact_id = %contact.id,
                    "Contact saved"
                );

                let saved = command::contact_saved(&contact.name, contact.phone.as_str());
                self.announce(msg, &contact, saved).await
            }
        };

        Ok(OutgoingResponse::text(reply))
    }

    /// Notify the operator about a stored contact. Returns the user's reply.
    async fn announce(&self, msg: &IncomingMessage, contact: &Contact, saved: String) -> String {
        let event = ContactAdded {
            contributor_id: msg.user_id.clone(),
            contributor_name: msg.display_name().to_string(),
            name: contact.name.clone(),
            phone: contact.phone.to_string(),
        };

        match self.deps.notifier.notify(&event).await {
            Ok(()) => saved,
            Err(e) => {
                tracing::warn!(
                    user_id = %msg.user_id,
                    contact_id = %contact.id,
                    "Operator notification failed: {}",
                    e
                );
                format!("{saved}\n{}", command::NOTIFY_FAILED)
            }
        }
    }

    /// Run the main loop until Ctrl+C or until every channel stream ends.
    ///
    /// Messages from different users are handled concurrently; messages from
    /// one user are handled strictly in arrival order.
    pub async fn run(self: Arc<Self>, channels: Arc<ChannelManager>) -> Result<(), Error> {
        let mut message_stream = channels.start_all().await?;
        let mut lanes: HashMap<String, JoinHandle<()>> = HashMap::new();

        tracing::info!(channels = ?channels.names(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            lanes.retain(|_, handle| !handle.is_finished());

            let lane = format!("{}:{}", message.channel, message.user_id);
            let previous = lanes.remove(&lane);
            let bot = Arc::clone(&self);
            let channels = Arc::clone(&channels);

            let handle = tokio::spawn(async move {
                // Wait for this user's previous message.
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                let response = bot.handle_message(&message).await;
                if let Err(e) = channels.respond(&message, response).await {
                    tracing::warn!(
                        channel = %message.channel,
                        user_id = %message.user_id,
                        "Failed to send reply: {}",
                        e
                    );
                }
            });
            lanes.insert(lane, handle);
        }

        for (_, handle) in lanes.drain() {
            let _ = handle.await;
        }
        let abandoned = self.deps.registry.active_count().await;
        if abandoned > 0 {
            tracing::info!(dialogues = abandoned, "Dropping unfinished dialogues");
        }
        channels.shutdown_all().await;

        Ok(())
    }
}
