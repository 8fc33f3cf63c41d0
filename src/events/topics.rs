//! Topic catalog, `v1` implied. Outbound topics are what this process
//! publishes; inbound ones are what the backend publishes at us.

// Round lifecycle.
pub const ROUND_CREATE_REQUESTED: &str = "round.create.requested";
pub const ROUND_CREATED: &str = "round.created";
pub const ROUND_CREATION_FAILED: &str = "round.creation.failed";
pub const ROUND_VALIDATION_FAILED: &str = "round.validation.failed";
pub const ROUND_EVENT_MESSAGE_ID_UPDATED: &str = "round.event.messageid.updated";
pub const ROUND_UPDATE_REQUESTED: &str = "round.update.requested";
pub const ROUND_ENTITY_UPDATED: &str = "round.entity.updated";
pub const ROUND_DELETE_REQUESTED: &str = "round.delete.requested";
pub const ROUND_DELETED: &str = "round.deleted";
pub const ROUND_STARTED: &str = "round.started";
pub const ROUND_FINALIZED: &str = "round.finalized";
pub const ROUND_REMINDER: &str = "round.reminder";

// Participants and scores.
pub const ROUND_PARTICIPANT_JOIN_REQUESTED: &str = "round.participant.join.requested";
pub const ROUND_PARTICIPANT_JOINED: &str = "round.participant.joined";
pub const ROUND_PARTICIPANT_REMOVED: &str = "round.participant.removed";
pub const ROUND_SCORE_UPDATE_REQUESTED: &str = "round.score.update.requested";
pub const ROUND_PARTICIPANT_SCORE_UPDATED: &str = "round.participant.score.updated";
pub const ROUND_SCORES_BULK_UPDATED: &str = "round.scores.bulk.updated";
pub const ROUND_SCORE_UPDATE_ERROR: &str = "round.score.update.error";
pub const ROUND_SCORE_OVERRIDE_SUCCESS: &str = "round.score.override.success";
pub const ROUND_TAGS_UPDATED_FOR_SCHEDULED_ROUNDS: &str =
    "round.tags.updated.for.scheduled.rounds";

// Scorecard ingest.
pub const SCORECARD_UPLOADED: &str = "scorecard.uploaded";
pub const SCORECARD_PARSE_FAILED: &str = "scorecard.parse.failed";
pub const SCORECARD_IMPORT_FAILED: &str = "import.failed";
pub const SCORECARD_PROCESS_REQUESTED: &str = "scorecard.process.requested";

// Users and roles.
pub const USER_SIGNUP_REQUESTED: &str = "user.signup.requested";
pub const USER_CREATED: &str = "user.created";
pub const USER_CREATION_FAILED: &str = "user.creation.failed";
pub const USER_ROLE_UPDATE_REQUESTED: &str = "user.role.update.requested";
pub const USER_ROLE_UPDATED: &str = "user.role.updated";
pub const USER_ROLE_UPDATE_FAILED: &str = "user.role.update.failed";
pub const USER_PROFILE_UPDATED: &str = "user.profile.updated";

/// Canonical trace topic for role updates.
pub const USER_ROLE_UPDATE_TRACE: &str = "user.role.update.trace";

/// Historical duplicate of [`USER_ROLE_UPDATE_TRACE`]; the two constants
/// always shared one string value.
#[deprecated(note = "use USER_ROLE_UPDATE_TRACE")]
pub const USER_ROLE_UPDATE_RESPONSE_TRACE: &str = USER_ROLE_UPDATE_TRACE;
