use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod parse;
pub mod render;
pub mod sync;
pub mod tags;

/// Placeholder shown when an RSVP bucket has nobody in it. Discord rejects
/// empty field values, so this must never be omitted.
pub const NO_PARTICIPANTS: &str = "*No participants*";

pub const ACCEPTED_FIELD: &str = "Accepted";
pub const DECLINED_FIELD: &str = "Declined";
pub const TENTATIVE_FIELD: &str = "Tentative";

/// Lifecycle stage of a round; decides embed colour, footer and buttons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoundPhase {
    #[default]
    Upcoming,
    InProgress,
    Finalized,
    Deleted,
}

impl RoundPhase {
    pub fn colour(self) -> u32 {
        match self {
            RoundPhase::Upcoming => 0x3498DB,
            RoundPhase::InProgress => 0x2ECC71,
            RoundPhase::Finalized => 0xF1C40F,
            RoundPhase::Deleted => 0x95A5A6,
        }
    }
}

/// A participant's answer to a round invitation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RsvpResponse {
    #[default]
    Accept,
    Decline,
    Tentative,
}

/// One entry in a round's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Participant {
    pub user_id: String,
    #[serde(default)]
    pub response: RsvpResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

/// Wire-neutral embed representation. The gateway converts this to and
/// from the platform SDK's types at the boundary; everything inside the
/// core works on this.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageEmbed {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub colour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyleKind {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// A button attached below a message, identified by its custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageButton {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyleKind,
}

impl MessageButton {
    pub fn new(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyleKind,
    ) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

/// The round attributes an embed projects, as known at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundView {
    pub round_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub location: Option<String>,
    pub phase: RoundPhase,
}
