use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embed::{Participant, RoundPhase};

pub mod topics;

/// Largest scorecard artefact accepted on the ingest path: 5 MiB.
pub const MAX_SCORECARD_BYTES: u64 = 5 * 1024 * 1024;

// ---- Outbound (this process -> backend) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCreateRequested {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw user input; the backend owns parsing and validation of times.
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundUpdateRequested {
    pub round_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub user_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDeleteRequested {
    pub round_id: String,
    pub user_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEventMessageIdUpdated {
    pub round_id: String,
    pub event_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantJoinRequested {
    pub round_id: String,
    pub user_id: String,
    pub response: crate::embed::RsvpResponse,
    #[serde(default)]
    pub joined_late: bool,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreUpdateRequested {
    pub round_id: String,
    /// Who pressed Enter Score; also the participant being scored.
    pub user_id: String,
    pub score: i32,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequested {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdateRequested {
    pub user_id: String,
    pub guild_id: String,
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileUpdated {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

// ---- Inbound (backend -> this process) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCreated {
    pub round_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub requester_id: String,
    pub channel_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCreationFailed {
    #[serde(default)]
    pub reason: String,
    pub user_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEntityUpdated {
    pub round_id: String,
    pub event_message_id: String,
    pub channel_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub phase: RoundPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantJoined {
    pub round_id: String,
    #[serde(default)]
    pub accepted: Vec<Participant>,
    #[serde(default)]
    pub declined: Vec<Participant>,
    #[serde(default)]
    pub tentative: Vec<Participant>,
    pub event_message_id: String,
    pub channel_id: String,
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_late: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantScoreUpdated {
    pub round_id: String,
    pub user_id: String,
    pub score: i32,
    pub channel_id: String,
    pub event_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScoresUpdated {
    pub round_id: String,
    pub channel_id: String,
    pub event_message_id: String,
    #[serde(default)]
    pub scores: Vec<BulkScoreEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScoreEntry {
    pub user_id: String,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreUpdateError {
    pub round_id: String,
    /// The user who submitted the rejected score.
    pub user_id: String,
    #[serde(default)]
    pub reason: String,
    pub guild_id: String,
}

/// An out-of-band correction applied by an admin; re-enters the normal
/// score-update path on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOverrideSuccess {
    pub round_id: String,
    pub user_id: String,
    pub score: i32,
    pub channel_id: String,
    pub event_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReminder {
    pub round_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub accepted_user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStarted {
    pub round_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub event_message_id: String,
    pub channel_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundFinalized {
    pub round_id: String,
    pub event_message_id: String,
    pub channel_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDeleted {
    pub round_id: String,
    pub event_message_id: String,
    pub channel_id: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsUpdatedForScheduledRounds {
    #[serde(default)]
    pub updated_rounds: Vec<UpdatedScheduledRound>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedScheduledRound {
    #[serde(default)]
    pub guild_id: String,
    pub round_id: String,
    pub event_message_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub phase: RoundPhase,
    #[serde(default)]
    pub updated_participants: Vec<TagAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAssignment {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardUploaded {
    pub guild_id: String,
    pub round_id: String,
    pub uploader_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub size_bytes: u64,
}

/// The backend could not parse or import an uploaded scorecard; carried
/// by both failure topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardProcessingFailed {
    pub guild_id: String,
    pub round_id: String,
    pub uploader_id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreationFailed {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdated {
    pub user_id: String,
    pub guild_id: String,
    pub role_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdateFailed {
    pub user_id: String,
    pub guild_id: String,
    pub role_name: String,
    #[serde(default)]
    pub reason: String,
}
