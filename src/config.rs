use std::collections::HashMap;
use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{errors::CoreError, BotError};

/// The configuration for a guild the bot serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: String,
    /// Channel where round embeds are posted.
    pub event_channel_id: String,
    /// Channel holding the pinned signup message.
    pub signup_channel_id: String,
    /// Message whose reactions trigger the signup flow.
    pub signup_message_id: String,
    /// Role granted to registered players.
    pub registered_role_id: String,
    /// Application-role name -> Discord role id.
    #[serde(default)]
    pub role_mappings: HashMap<String, String>,
}

impl GuildConfig {
    /// Discord role id for an application role name, if one is mapped.
    pub fn role_id(&self, role_name: &str) -> Option<&str> {
        self.role_mappings.get(role_name).map(String::as_str)
    }
}

/// Resolves the per-guild configuration. The source behind the seam is a
/// deployment concern; the core only ever asks by guild id.
#[async_trait]
pub trait GuildConfigResolver: Send + Sync {
    async fn resolve(&self, guild_id: &str) -> Result<GuildConfig, BotError>;
}

/// Guild configs loaded once from a JSON document keyed by guild id.
#[derive(Debug, Default)]
pub struct StaticGuildConfigs {
    configs: HashMap<String, GuildConfig>,
}

impl StaticGuildConfigs {
    pub fn new(configs: HashMap<String, GuildConfig>) -> Self {
        Self { configs }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("reading guild config {}: {}", path.as_ref().display(), e))?;
        let configs: HashMap<String, GuildConfig> = serde_json::from_str(&raw)?;
        info!("Loaded configuration for {} guild(s)", configs.len());
        Ok(Self { configs })
    }
}

#[async_trait]
impl GuildConfigResolver for StaticGuildConfigs {
    async fn resolve(&self, guild_id: &str) -> Result<GuildConfig, BotError> {
        self.configs
            .get(guild_id)
            .cloned()
            .ok_or_else(|| CoreError::Configuration(format!("no config for guild {}", guild_id)).into())
    }
}
