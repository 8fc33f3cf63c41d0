//! Score projections: single updates, bulk imports, rejections and
//! out-of-band corrections.

use anyhow::anyhow;
use tracing::info;

use crate::bus::router::{EventContext, Routed};
use crate::bus::BusMessage;
use crate::embed::sync::{apply_delta, sync_embed, EmbedDelta};
use crate::errors::CoreError;
use crate::events::{
    BulkScoresUpdated, ParticipantScoreUpdated, ScoreOverrideSuccess, ScoreUpdateError,
};
use crate::gateway::MessageContent;
use crate::operation::{run_operation, OperationResult};
use crate::BotError;

use super::{respond_to_requester, Capabilities};

async fn apply_score_update(
    caps: &Capabilities,
    payload: ParticipantScoreUpdated,
) -> Result<Vec<Routed>, BotError> {
    let gateway = caps.gateway.clone();
    let outcome = run_operation("update_score_line", &caps.metrics, Some(|| async move {
        let delta = EmbedDelta::Score {
            user_id: payload.user_id.clone(),
            score: payload.score,
        };
        match sync_embed(&gateway, &payload.channel_id, &payload.event_message_id, &delta).await {
            Ok(result) => Ok(result),
            Err(e) if CoreError::is_not_found(&e) => {
                Ok(OperationResult::Failure("round message not found".to_string()))
            }
            Err(e) => Err(e),
        }
    }))
    .await;

    match outcome {
        None => Err(anyhow!("update_score_line panicked")),
        Some(OperationResult::Error(e)) => Err(e),
        Some(OperationResult::Failure(note)) => {
            info!(note, "score update settled without effect");
            Ok(vec![])
        }
        Some(OperationResult::Success(note)) => {
            info!(note, "score line updated");
            Ok(vec![])
        }
    }
}

/// One participant's score changed; rewrite exactly their roster line.
pub async fn score_updated(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ParticipantScoreUpdated = message.decode()?;
    apply_score_update(&caps, payload).await
}

/// An admin correction re-enters the ordinary score-update path.
pub async fn score_override(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ScoreOverrideSuccess = message.decode()?;
    apply_score_update(
        &caps,
        ParticipantScoreUpdated {
            round_id: payload.round_id,
            user_id: payload.user_id,
            score: payload.score,
            channel_id: payload.channel_id,
            event_message_id: payload.event_message_id,
        },
    )
    .await
}

/// A scorecard import lands as one batch; the embed is fetched once,
/// every delta applied in memory, and edited once.
pub async fn bulk_scores_updated(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: BulkScoresUpdated = message.decode()?;

    let gateway = caps.gateway.clone();
    let outcome = run_operation("bulk_update_scores", &caps.metrics, Some(|| async move {
        let fetched = match gateway
            .fetch_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) if CoreError::is_not_found(&e) => {
                return Ok(OperationResult::Failure(
                    "round message not found".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };
        let Some(mut embed) = fetched.embed else {
            return Err(anyhow!(
                "round message {} has no embed",
                payload.event_message_id
            ));
        };

        let mut touched = 0;
        for entry in &payload.scores {
            let delta = EmbedDelta::Score {
                user_id: entry.user_id.clone(),
                score: entry.score,
            };
            let (updated, changed) = apply_delta(&embed, &delta);
            embed = updated;
            touched += changed;
        }
        if touched == 0 {
            return Ok(OperationResult::Success("no target users found".to_string()));
        }
        gateway
            .edit_message(
                &payload.channel_id,
                &payload.event_message_id,
                MessageContent::embed_only(embed),
            )
            .await?;
        Ok(OperationResult::Success(format!("updated {} line(s)", touched)))
    }))
    .await;

    match outcome {
        None => Err(anyhow!("bulk_update_scores panicked")),
        Some(OperationResult::Error(e)) => Err(e),
        Some(other) => {
            if let Some(note) = other.failure() {
                info!(note, "bulk score update settled without effect");
            }
            Ok(vec![])
        }
    }
}

/// The backend rejected a submitted score; tell whoever submitted it.
pub async fn score_update_error(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ScoreUpdateError = message.decode()?;
    let reason = if payload.reason.is_empty() {
        "the backend rejected it".to_string()
    } else {
        payload.reason.clone()
    };
    respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.user_id,
        MessageContent::text(format!(
            "Your score for round {} was not accepted: {}",
            payload.round_id, reason
        )),
    )
    .await?;
    Ok(vec![])
}
