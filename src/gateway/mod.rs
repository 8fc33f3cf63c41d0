use async_trait::async_trait;

use crate::embed::{MessageButton, MessageEmbed};
use crate::BotError;

pub mod adapter;
pub mod discord;

/// What goes into one message send or edit. `components: None` leaves a
/// message's existing buttons alone on edit; `Some(vec![])` strips them.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub text: Option<String>,
    pub embed: Option<MessageEmbed>,
    pub components: Option<Vec<MessageButton>>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn embed_only(embed: MessageEmbed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn with_embed(mut self, embed: MessageEmbed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn with_components(mut self, components: Vec<MessageButton>) -> Self {
        self.components = Some(components);
        self
    }
}

/// A channel message as fetched back from the platform.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message_id: String,
    pub embed: Option<MessageEmbed>,
}

/// The capabilities this system needs from the chat platform. The Discord
/// SDK sits behind this seam; test doubles are plain records.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts a message, returning the new message id.
    async fn send_message(
        &self,
        channel_id: &str,
        content: MessageContent,
    ) -> Result<String, BotError>;

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<FetchedMessage, BotError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: MessageContent,
    ) -> Result<(), BotError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError>;

    /// Edits the (usually ephemeral) original response of an interaction,
    /// addressed by its token.
    async fn edit_interaction_response(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError>;

    /// Sends an ephemeral follow-up on an interaction.
    async fn send_followup(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError>;

    async fn dm_user(&self, user_id: &str, content: MessageContent) -> Result<(), BotError>;

    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), BotError>;

    /// Guild nickname when set, username otherwise.
    async fn display_name(&self, guild_id: &str, user_id: &str) -> Result<String, BotError>;
}
