//! Handlers for backend events, wired to their topics.

use std::sync::Arc;

use tracing::warn;

use crate::bus::router::{OutboundRoute, Router};
use crate::bus::EventMetadata;
use crate::cache::InteractionCache;
use crate::config::GuildConfigResolver;
use crate::events::topics;
use crate::gateway::{ChatGateway, MessageContent};
use crate::metrics::Metrics;
use crate::ratelimit::RateLimiter;
use crate::{BotError, Data};

pub mod rounds;
pub mod scorecard;
pub mod scores;
pub mod users;


/// Everything a handler is allowed to touch, passed explicitly.
#[derive(Clone)]
pub struct Capabilities {
    pub gateway: Arc<dyn ChatGateway>,
    pub guild_configs: Arc<dyn GuildConfigResolver>,
    pub interactions: Arc<InteractionCache>,
    pub metrics: Arc<Metrics>,
    pub scorecard_limiter: Arc<RateLimiter>,
}

impl Capabilities {
    pub fn from_data(data: &Data) -> Self {
        Self {
            gateway: data.gateway.clone(),
            guild_configs: data.guild_configs.clone(),
            interactions: data.interactions.clone(),
            metrics: data.metrics.clone(),
            scorecard_limiter: data.scorecard_limiter.clone(),
        }
    }
}

/// Subscribes every backend topic this process consumes. The outbound
/// route per handler is part of the wiring, not of the handler.
pub fn register_handlers(router: &mut Router, caps: Capabilities) {
    macro_rules! route {
        ($topic:expr, $name:literal, $outbound:expr, $handler:path) => {{
            let caps = caps.clone();
            router.subscribe($topic, $name, $outbound, move |ctx, msg| {
                $handler(caps.clone(), ctx, msg)
            });
        }};
    }

    route!(
        topics::ROUND_CREATED,
        "round_created",
        OutboundRoute::Static(topics::ROUND_EVENT_MESSAGE_ID_UPDATED),
        rounds::round_created
    );
    route!(
        topics::ROUND_CREATION_FAILED,
        "round_creation_failed",
        OutboundRoute::None,
        rounds::round_creation_failed
    );
    route!(
        topics::ROUND_VALIDATION_FAILED,
        "round_validation_failed",
        OutboundRoute::None,
        rounds::round_creation_failed
    );
    route!(
        topics::ROUND_PARTICIPANT_JOINED,
        "participant_joined",
        OutboundRoute::None,
        rounds::participant_joined
    );
    route!(
        topics::ROUND_PARTICIPANT_REMOVED,
        "participant_removed",
        OutboundRoute::None,
        rounds::participant_joined
    );
    route!(
        topics::ROUND_ENTITY_UPDATED,
        "round_updated",
        OutboundRoute::None,
        rounds::round_updated
    );
    route!(
        topics::ROUND_REMINDER,
        "round_reminder",
        OutboundRoute::None,
        rounds::round_reminder
    );
    route!(
        topics::ROUND_STARTED,
        "round_started",
        OutboundRoute::None,
        rounds::round_started
    );
    route!(
        topics::ROUND_FINALIZED,
        "round_finalized",
        OutboundRoute::None,
        rounds::round_finalized
    );
    route!(
        topics::ROUND_DELETED,
        "round_deleted",
        OutboundRoute::None,
        rounds::round_deleted
    );
    route!(
        topics::ROUND_TAGS_UPDATED_FOR_SCHEDULED_ROUNDS,
        "tags_updated",
        OutboundRoute::None,
        rounds::tags_updated
    );

    route!(
        topics::ROUND_PARTICIPANT_SCORE_UPDATED,
        "score_updated",
        OutboundRoute::None,
        scores::score_updated
    );
    route!(
        topics::ROUND_SCORES_BULK_UPDATED,
        "bulk_scores_updated",
        OutboundRoute::None,
        scores::bulk_scores_updated
    );
    route!(
        topics::ROUND_SCORE_UPDATE_ERROR,
        "score_update_error",
        OutboundRoute::None,
        scores::score_update_error
    );
    route!(
        topics::ROUND_SCORE_OVERRIDE_SUCCESS,
        "score_override",
        OutboundRoute::None,
        scores::score_override
    );

    route!(
        topics::SCORECARD_UPLOADED,
        "scorecard_uploaded",
        OutboundRoute::Static(topics::SCORECARD_PROCESS_REQUESTED),
        scorecard::scorecard_uploaded
    );
    route!(
        topics::SCORECARD_PARSE_FAILED,
        "scorecard_parse_failed",
        OutboundRoute::None,
        scorecard::scorecard_failed
    );
    route!(
        topics::SCORECARD_IMPORT_FAILED,
        "scorecard_import_failed",
        OutboundRoute::None,
        scorecard::scorecard_failed
    );

    route!(
        topics::USER_CREATED,
        "user_created",
        OutboundRoute::None,
        users::user_created
    );
    route!(
        topics::USER_CREATION_FAILED,
        "user_creation_failed",
        OutboundRoute::None,
        users::user_creation_failed
    );
    route!(
        topics::USER_ROLE_UPDATED,
        "role_updated",
        OutboundRoute::Static(topics::USER_ROLE_UPDATE_TRACE),
        users::role_updated
    );
    route!(
        topics::USER_ROLE_UPDATE_FAILED,
        "role_update_failed",
        OutboundRoute::None,
        users::role_update_failed
    );
}

/// Answers the user who caused this chain of events: through their cached
/// interaction when one is still live, through the metadata token next,
/// and by DM as the last resort.
pub(crate) async fn respond_to_requester(
    caps: &Capabilities,
    metadata: &EventMetadata,
    user_id: &str,
    content: MessageContent,
) -> Result<(), BotError> {
    let token = caps
        .interactions
        .get(&metadata.correlation_id)
        .map(|ctx| ctx.interaction_token)
        .or_else(|| metadata.interaction_token.clone());
    match token {
        Some(token) => caps.gateway.edit_interaction_response(&token, content).await,
        None if !user_id.is_empty() => caps.gateway.dm_user(user_id, content).await,
        None => {
            warn!(
                correlation_id = %metadata.correlation_id,
                "no way to reach the requester; reply dropped"
            );
            Ok(())
        }
    }
}
