use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ButtonStyle, ChannelId, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponseFollowup, CreateMessage, EditInteractionResponse, EditMessage,
    GuildId, Http, HttpError, Message, MessageId, RoleId, UserId,
};

use crate::embed::{ButtonStyleKind, EmbedField, MessageButton, MessageEmbed};
use crate::errors::CoreError;
use crate::BotError;

use super::{ChatGateway, FetchedMessage, MessageContent};

/// Hard ceiling on any single chat-platform call.
pub const CALL_DEADLINE: Duration = Duration::from_secs(5);

/// The serenity-backed gateway used in production.
pub struct DiscordGateway {
    http: Arc<Http>,
    deadline: Duration,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            deadline: CALL_DEADLINE,
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, BotError>
    where
        F: std::future::Future<Output = Result<T, poise::serenity_prelude::Error>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Err(_) => Err(CoreError::Transient(format!("{} timed out", what)).into()),
            Ok(Err(e)) => Err(map_discord_error(what, e)),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

fn map_discord_error(what: &str, e: poise::serenity_prelude::Error) -> BotError {
    if let poise::serenity_prelude::Error::Http(HttpError::UnsuccessfulRequest(ref resp)) = e {
        let status = resp.status_code.as_u16();
        if status == 404 {
            return CoreError::NotFound(what.to_string()).into();
        }
        if status >= 500 {
            return CoreError::Transient(format!("{}: discord returned {}", what, status)).into();
        }
    }
    anyhow!("{}: {}", what, e)
}

fn parse_id(kind: &str, raw: &str) -> Result<u64, BotError> {
    raw.parse::<u64>()
        .map_err(|_| anyhow!("{} id {:?} is not a snowflake", kind, raw))
}

fn to_create_embed(embed: &MessageEmbed) -> CreateEmbed {
    let mut builder = CreateEmbed::new().title(embed.title.clone()).colour(embed.colour);
    if let Some(description) = &embed.description {
        builder = builder.description(description.clone());
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer.clone()));
    }
    for field in &embed.fields {
        builder = builder.field(field.name.clone(), field.value.clone(), field.inline);
    }
    builder
}

fn from_discord_embed(embed: &poise::serenity_prelude::Embed) -> MessageEmbed {
    MessageEmbed {
        title: embed.title.clone().unwrap_or_default(),
        description: embed.description.clone(),
        colour: embed.colour.map(|c| c.0).unwrap_or_default(),
        footer: embed.footer.as_ref().map(|f| f.text.clone()),
        fields: embed
            .fields
            .iter()
            .map(|f| EmbedField::new(f.name.clone(), f.value.clone(), f.inline))
            .collect(),
    }
}

fn to_button_style(style: ButtonStyleKind) -> ButtonStyle {
    match style {
        ButtonStyleKind::Primary => ButtonStyle::Primary,
        ButtonStyleKind::Secondary => ButtonStyle::Secondary,
        ButtonStyleKind::Success => ButtonStyle::Success,
        ButtonStyleKind::Danger => ButtonStyle::Danger,
    }
}

/// Buttons render as a single action row; Discord caps a row at five.
fn to_action_rows(buttons: &[MessageButton]) -> Vec<CreateActionRow> {
    if buttons.is_empty() {
        return vec![];
    }
    vec![CreateActionRow::Buttons(
        buttons
            .iter()
            .map(|b| {
                CreateButton::new(b.custom_id.clone())
                    .label(b.label.clone())
                    .style(to_button_style(b.style))
            })
            .collect(),
    )]
}

fn from_fetched(message: Message) -> FetchedMessage {
    FetchedMessage {
        message_id: message.id.to_string(),
        embed: message.embeds.first().map(from_discord_embed),
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn send_message(
        &self,
        channel_id: &str,
        content: MessageContent,
    ) -> Result<String, BotError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let mut builder = CreateMessage::new();
        if let Some(text) = &content.text {
            builder = builder.content(text.clone());
        }
        if let Some(embed) = &content.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        if let Some(components) = &content.components {
            builder = builder.components(to_action_rows(components));
        }
        let message = self
            .bounded("send message", channel.send_message(&self.http, builder))
            .await?;
        Ok(message.id.to_string())
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<FetchedMessage, BotError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        let fetched = self
            .bounded("fetch message", channel.message(&self.http, message))
            .await?;
        Ok(from_fetched(fetched))
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        let mut builder = EditMessage::new();
        if let Some(text) = &content.text {
            builder = builder.content(text.clone());
        }
        if let Some(embed) = &content.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        if let Some(components) = &content.components {
            builder = builder.components(to_action_rows(components));
        }
        self.bounded(
            "edit message",
            channel.edit_message(&self.http, message, builder),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let message = MessageId::new(parse_id("message", message_id)?);
        self.bounded(
            "delete message",
            channel.delete_message(&self.http, message),
        )
        .await
    }

    async fn edit_interaction_response(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        let mut builder = EditInteractionResponse::new();
        if let Some(text) = &content.text {
            builder = builder.content(text.clone());
        }
        if let Some(embed) = &content.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        if let Some(components) = &content.components {
            builder = builder.components(to_action_rows(components));
        }
        self.bounded(
            "edit interaction response",
            self.http
                .edit_original_interaction_response(interaction_token, &builder, vec![]),
        )
        .await?;
        Ok(())
    }

    async fn send_followup(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        let mut builder = CreateInteractionResponseFollowup::new().ephemeral(true);
        if let Some(text) = &content.text {
            builder = builder.content(text.clone());
        }
        if let Some(embed) = &content.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        if let Some(components) = &content.components {
            builder = builder.components(to_action_rows(components));
        }
        self.bounded(
            "send followup",
            self.http
                .create_followup_message(interaction_token, &builder, vec![]),
        )
        .await?;
        Ok(())
    }

    async fn dm_user(&self, user_id: &str, content: MessageContent) -> Result<(), BotError> {
        let user = UserId::new(parse_id("user", user_id)?);
        let dm = self
            .bounded("open dm channel", user.create_dm_channel(&self.http))
            .await?;
        let mut builder = CreateMessage::new();
        if let Some(text) = &content.text {
            builder = builder.content(text.clone());
        }
        if let Some(embed) = &content.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        self.bounded("send dm", dm.id.send_message(&self.http, builder))
            .await?;
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), BotError> {
        let guild = GuildId::new(parse_id("guild", guild_id)?);
        let user = UserId::new(parse_id("user", user_id)?);
        let role = RoleId::new(parse_id("role", role_id)?);
        self.bounded(
            "add role",
            self.http.add_member_role(guild, user, role, None),
        )
        .await
    }

    async fn display_name(&self, guild_id: &str, user_id: &str) -> Result<String, BotError> {
        let guild = GuildId::new(parse_id("guild", guild_id)?);
        let user = UserId::new(parse_id("user", user_id)?);
        let member = self
            .bounded("resolve member", self.http.get_member(guild, user))
            .await?;
        Ok(member
            .nick
            .clone()
            .or_else(|| member.user.global_name.clone())
            .unwrap_or_else(|| member.user.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_conversion_keeps_every_field() {
        let embed = MessageEmbed {
            title: "Friday Skins".into(),
            description: Some("desc".into()),
            colour: 0x3498DB,
            footer: Some("RSVP with the buttons below".into()),
            fields: vec![EmbedField::new("Accepted", "<@U1>", false)],
        };
        // CreateEmbed serializes to the wire shape Discord accepts.
        let value = serde_json::to_value(to_create_embed(&embed)).unwrap();
        assert_eq!(value["title"], "Friday Skins");
        assert_eq!(value["color"], 0x3498DB);
        assert_eq!(value["footer"]["text"], "RSVP with the buttons below");
        assert_eq!(value["fields"][0]["name"], "Accepted");
    }

    #[test]
    fn buttons_collapse_into_one_action_row() {
        let rows = to_action_rows(&[
            MessageButton::new("round_accept|R1", "Accept", ButtonStyleKind::Success),
            MessageButton::new("round_decline|R1", "Decline", ButtonStyleKind::Danger),
        ]);
        assert_eq!(rows.len(), 1);
        assert!(to_action_rows(&[]).is_empty());
    }

    #[test]
    fn snowflake_parsing_rejects_garbage() {
        assert!(parse_id("channel", "123").is_ok());
        assert!(parse_id("channel", "not-a-number").is_err());
    }
}
