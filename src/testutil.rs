//! In-memory doubles shared by the unit and scenario tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{GuildConfig, GuildConfigResolver, StaticGuildConfigs};
use crate::embed::MessageEmbed;
use crate::errors::CoreError;
use crate::gateway::{ChatGateway, FetchedMessage, MessageContent};
use crate::BotError;

/// A message pre-seeded into the fake channel store.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub channel_id: String,
    pub message_id: String,
    pub embed: MessageEmbed,
}

impl StoredMessage {
    pub fn new(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        embed: MessageEmbed,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            embed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentRecord {
    pub channel_id: String,
    pub message_id: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone)]
pub struct EditRecord {
    pub channel_id: String,
    pub message_id: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone)]
pub struct InteractionEditRecord {
    pub token: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone)]
pub struct FollowupRecord {
    pub token: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone)]
pub struct DmRecord {
    pub user_id: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrantRecord {
    pub guild_id: String,
    pub user_id: String,
    pub role_id: String,
}

#[derive(Default)]
struct Inner {
    messages: HashMap<(String, String), MessageEmbed>,
    sends: Vec<SentRecord>,
    edits: Vec<EditRecord>,
    deletes: Vec<(String, String)>,
    interaction_edits: Vec<InteractionEditRecord>,
    followups: Vec<FollowupRecord>,
    dms: Vec<DmRecord>,
    role_grants: Vec<RoleGrantRecord>,
    next_id: u64,
    fail_edits: usize,
    fail_sends: usize,
}

/// A [`ChatGateway`] that records every call and serves fetches from an
/// in-memory channel store. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<StoredMessage>) -> Self {
        let gateway = Self::new();
        {
            let mut inner = gateway.inner.lock().unwrap();
            for m in messages {
                inner.messages.insert((m.channel_id, m.message_id), m.embed);
            }
        }
        gateway
    }

    /// Makes the next `times` edit calls fail with a transient error.
    pub fn fail_next_edits(&self, times: usize) {
        self.inner.lock().unwrap().fail_edits = times;
    }

    /// Makes the next `times` send calls fail with a transient error.
    pub fn fail_next_sends(&self, times: usize) {
        self.inner.lock().unwrap().fail_sends = times;
    }

    pub fn sends(&self) -> Vec<SentRecord> {
        self.inner.lock().unwrap().sends.clone()
    }

    pub fn edits(&self) -> Vec<EditRecord> {
        self.inner.lock().unwrap().edits.clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().deletes.clone()
    }

    pub fn interaction_edits(&self) -> Vec<InteractionEditRecord> {
        self.inner.lock().unwrap().interaction_edits.clone()
    }

    pub fn followups(&self) -> Vec<FollowupRecord> {
        self.inner.lock().unwrap().followups.clone()
    }

    pub fn dms(&self) -> Vec<DmRecord> {
        self.inner.lock().unwrap().dms.clone()
    }

    pub fn role_grants(&self) -> Vec<RoleGrantRecord> {
        self.inner.lock().unwrap().role_grants.clone()
    }

    /// Embed currently stored for a message, if any.
    pub fn stored_embed(&self, channel_id: &str, message_id: &str) -> Option<MessageEmbed> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(&(channel_id.to_string(), message_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(
        &self,
        channel_id: &str,
        content: MessageContent,
    ) -> Result<String, BotError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends > 0 {
            inner.fail_sends -= 1;
            return Err(CoreError::Transient("send message failed".into()).into());
        }
        inner.next_id += 1;
        let message_id = format!("T{}", inner.next_id);
        if let Some(embed) = &content.embed {
            inner
                .messages
                .insert((channel_id.to_string(), message_id.clone()), embed.clone());
        }
        inner.sends.push(SentRecord {
            channel_id: channel_id.to_string(),
            message_id: message_id.clone(),
            content,
        });
        Ok(message_id)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<FetchedMessage, BotError> {
        let inner = self.inner.lock().unwrap();
        match inner
            .messages
            .get(&(channel_id.to_string(), message_id.to_string()))
        {
            Some(embed) => Ok(FetchedMessage {
                message_id: message_id.to_string(),
                embed: Some(embed.clone()),
            }),
            None => Err(CoreError::NotFound(format!(
                "message {} in channel {}",
                message_id, channel_id
            ))
            .into()),
        }
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_edits > 0 {
            inner.fail_edits -= 1;
            return Err(CoreError::Transient("edit message failed".into()).into());
        }
        let key = (channel_id.to_string(), message_id.to_string());
        if !inner.messages.contains_key(&key) {
            return Err(CoreError::NotFound(format!(
                "message {} in channel {}",
                message_id, channel_id
            ))
            .into());
        }
        if let Some(embed) = &content.embed {
            inner.messages.insert(key, embed.clone());
        }
        inner.edits.push(EditRecord {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            content,
        });
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), BotError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (channel_id.to_string(), message_id.to_string());
        if inner.messages.remove(&key).is_none() {
            return Err(CoreError::NotFound(format!(
                "message {} in channel {}",
                message_id, channel_id
            ))
            .into());
        }
        inner
            .deletes
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn edit_interaction_response(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        self.inner
            .lock()
            .unwrap()
            .interaction_edits
            .push(InteractionEditRecord {
                token: interaction_token.to_string(),
                content,
            });
        Ok(())
    }

    async fn send_followup(
        &self,
        interaction_token: &str,
        content: MessageContent,
    ) -> Result<(), BotError> {
        self.inner.lock().unwrap().followups.push(FollowupRecord {
            token: interaction_token.to_string(),
            content,
        });
        Ok(())
    }

    async fn dm_user(&self, user_id: &str, content: MessageContent) -> Result<(), BotError> {
        self.inner.lock().unwrap().dms.push(DmRecord {
            user_id: user_id.to_string(),
            content,
        });
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), BotError> {
        self.inner.lock().unwrap().role_grants.push(RoleGrantRecord {
            guild_id: guild_id.to_string(),
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn display_name(&self, _guild_id: &str, user_id: &str) -> Result<String, BotError> {
        Ok(format!("player-{}", user_id))
    }
}

/// Resolver with one guild, `G1`, posting rounds to `C-events`.
pub fn test_configs() -> Arc<dyn GuildConfigResolver> {
    let config = GuildConfig {
        guild_id: "G1".to_string(),
        event_channel_id: "C-events".to_string(),
        signup_channel_id: "C-signup".to_string(),
        signup_message_id: "M-signup".to_string(),
        registered_role_id: "R-registered".to_string(),
        role_mappings: HashMap::from([
            ("Editor".to_string(), "R-editor".to_string()),
            ("Admin".to_string(), "R-admin".to_string()),
        ]),
    };
    Arc::new(StaticGuildConfigs::new(HashMap::from([(
        "G1".to_string(),
        config,
    )])))
}
