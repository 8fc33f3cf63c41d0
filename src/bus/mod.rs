use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::BotError;

pub mod router;

/// Typed carrier for the metadata threaded through every causally related
/// chain of events. Serialized to the bus's string-keyed map only at the
/// transport boundary; business logic never reads string keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub correlation_id: String,
    pub interaction_id: Option<String>,
    pub interaction_token: Option<String>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub topic: Option<String>,
}

impl EventMetadata {
    /// Fresh metadata with a newly minted correlation id.
    pub fn correlated() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_interaction(
        mut self,
        interaction_id: impl Into<String>,
        interaction_token: impl Into<String>,
    ) -> Self {
        self.interaction_id = Some(interaction_id.into());
        self.interaction_token = Some(interaction_token.into());
        self
    }

    /// Flattens into the transport's string-keyed map.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("correlation_id".to_string(), self.correlation_id.clone());
        let optional = [
            ("interaction_id", &self.interaction_id),
            ("interaction_token", &self.interaction_token),
            ("guild_id", &self.guild_id),
            ("channel_id", &self.channel_id),
            ("message_id", &self.message_id),
            ("topic", &self.topic),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }
        map
    }

    /// Rehydrates from the transport's map. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            correlation_id: map.get("correlation_id").cloned().unwrap_or_default(),
            interaction_id: map.get("interaction_id").cloned(),
            interaction_token: map.get("interaction_token").cloned(),
            guild_id: map.get("guild_id").cloned(),
            channel_id: map.get("channel_id").cloned(),
            message_id: map.get("message_id").cloned(),
            topic: map.get("topic").cloned(),
        }
    }
}

/// One message on the bus: a topic, a JSON body and the metadata carrier.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: serde_json::Value,
    pub metadata: EventMetadata,
}

impl BusMessage {
    pub fn new(
        topic: impl Into<String>,
        payload: &impl Serialize,
        metadata: EventMetadata,
    ) -> Result<Self, BotError> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_value(payload)?,
            metadata,
        })
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, BotError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Topic-addressed publish side of the message bus. The transport behind
/// it (delivery, queue groups, redelivery) is a deployment concern.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, message: BusMessage) -> Result<(), BotError>;
}

/// Publish-recording bus. Serves tests and the in-process default wiring;
/// a real deployment binds the router to its transport instead.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    published: Mutex<Vec<BusMessage>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything published so far.
    pub fn take_published(&self) -> Vec<BusMessage> {
        std::mem::take(&mut self.published.lock().expect("bus poisoned"))
    }

    pub fn published_topics(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("bus poisoned")
            .iter()
            .map(|m| m.topic.clone())
            .collect()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BotError> {
        self.published.lock().expect("bus poisoned").push(message);
        Ok(())
    }
}
