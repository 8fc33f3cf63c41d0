//! Round lifecycle: the chat-surface projection of a round follows the
//! backend's events from creation to deletion.

use std::collections::HashMap;

use anyhow::anyhow;
use tracing::{info, warn};

use crate::bus::router::{EventContext, Routed};
use crate::bus::BusMessage;
use crate::embed::render::{bucket_fields, render_round_embed, round_buttons};
use crate::embed::tags::{propagate_tags, ScheduledRoundRef};
use crate::embed::{
    MessageEmbed, Participant, RoundPhase, RoundView, RsvpResponse, ACCEPTED_FIELD,
    DECLINED_FIELD, TENTATIVE_FIELD,
};
use crate::errors::CoreError;
use crate::events::{
    ParticipantJoined, RoundCreated, RoundCreationFailed, RoundDeleted, RoundEntityUpdated,
    RoundEventMessageIdUpdated, RoundFinalized, RoundReminder, RoundStarted,
    TagsUpdatedForScheduledRounds,
};
use crate::gateway::MessageContent;
use crate::operation::{run_operation, OperationResult};
use crate::BotError;

use super::{respond_to_requester, Capabilities};

/// Maps "the message is gone" onto a terminal no-op; the round was
/// removed out from under us and a retry cannot bring it back.
fn terminal_if_missing(e: BotError, what: &str) -> Result<OperationResult<String>, BotError> {
    if CoreError::is_not_found(&e) {
        warn!(what, error = %e, "target message no longer exists");
        return Ok(OperationResult::Failure(format!("{} not found", what)));
    }
    Err(e)
}

/// Unwraps an operation envelope into the handler's contract: panics and
/// errors surface as `Err` so the router retries, failures acknowledge.
fn settle<T>(
    name: &str,
    outcome: Option<OperationResult<T>>,
) -> Result<Option<T>, BotError> {
    match outcome {
        None => Err(anyhow!("{} panicked", name)),
        Some(OperationResult::Error(e)) => Err(e),
        Some(OperationResult::Failure(note)) => {
            info!(operation = name, note, "operation settled without effect");
            Ok(None)
        }
        Some(OperationResult::Success(value)) => Ok(Some(value)),
    }
}

/// Renders and posts the initial round embed, binds the round to the new
/// message id for the backend, and confirms to whoever asked.
pub async fn round_created(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundCreated = message.decode()?;

    // The configured event channel wins; the originating channel is the
    // fallback for guilds without one.
    let channel_id = match caps.guild_configs.resolve(&payload.guild_id).await {
        Ok(config) => config.event_channel_id,
        Err(e) => {
            warn!(guild_id = %payload.guild_id, error = %e, "no event channel configured");
            payload.channel_id.clone()
        }
    };

    let view = RoundView {
        round_id: payload.round_id.clone(),
        title: payload.title.clone(),
        description: payload.description.clone(),
        start_time: payload.start_time,
        location: payload.location.clone(),
        phase: RoundPhase::Upcoming,
    };
    let content = MessageContent::embed_only(render_round_embed(&view, &[]))
        .with_components(round_buttons(RoundPhase::Upcoming, &payload.round_id));

    let gateway = caps.gateway.clone();
    let target = channel_id.clone();
    let outcome = run_operation("post_round_embed", &caps.metrics, Some(|| async move {
        let message_id = gateway.send_message(&target, content).await?;
        Ok(OperationResult::Success(message_id))
    }))
    .await;
    let Some(message_id) = settle("post_round_embed", outcome)? else {
        return Ok(vec![]);
    };

    info!(
        round_id = %payload.round_id,
        message_id = %message_id,
        channel_id = %channel_id,
        "round embed posted"
    );

    // The confirmation is best-effort: the embed exists either way, and a
    // retry of the whole handler would double-post it.
    if let Err(e) = respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.requester_id,
        MessageContent::text(format!(
            "Round created successfully! Round ID: {}",
            payload.round_id
        )),
    )
    .await
    {
        warn!(round_id = %payload.round_id, error = %e, "could not confirm round creation");
    }

    Ok(vec![Routed::unrouted(
        &RoundEventMessageIdUpdated {
            round_id: payload.round_id,
            event_message_id: message_id,
        },
        ctx.metadata.clone(),
    )?])
}

/// Creation and validation rejections both land back on the requester's
/// ephemeral response, with a retry button.
pub async fn round_creation_failed(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundCreationFailed = message.decode()?;
    let reason = if payload.reason.is_empty() {
        "the backend rejected the request".to_string()
    } else {
        payload.reason.clone()
    };
    // The retry button replays whatever the user typed into the modal; a
    // fresh blank payload only if the cached interaction is already gone.
    let retry_custom_id = match caps
        .interactions
        .get(&ctx.metadata.correlation_id)
        .and_then(|cached| cached.retry_payload)
    {
        Some(custom_id) => custom_id,
        None => crate::commands::round::encode_retry_payload(
            &crate::commands::round::CreateRoundInput::default(),
        )?,
    };
    let content = crate::commands::round::retry_reply(&reason, retry_custom_id);
    respond_to_requester(&caps, &ctx.metadata, &payload.user_id, content).await?;
    Ok(vec![])
}

fn merged_roster(payload: &ParticipantJoined) -> Vec<Participant> {
    let mut roster = Vec::new();
    for (bucket, response) in [
        (&payload.accepted, RsvpResponse::Accept),
        (&payload.declined, RsvpResponse::Decline),
        (&payload.tentative, RsvpResponse::Tentative),
    ] {
        roster.extend(bucket.iter().cloned().map(|mut p| {
            p.response = response;
            p
        }));
    }
    roster
}

/// Replaces the three RSVP bucket fields with the authoritative roster
/// snapshot from the backend; every other field survives untouched.
fn with_roster(embed: &MessageEmbed, roster: &[Participant]) -> MessageEmbed {
    let buckets = bucket_fields(roster);
    let mut updated = embed.clone();
    for field in updated.fields.iter_mut() {
        for bucket in &buckets {
            if field.name == bucket.name {
                field.value = bucket.value.clone();
            }
        }
    }
    // A message that somehow lost its buckets gets them back.
    for bucket in buckets {
        if !updated.fields.iter().any(|f| f.name == bucket.name) {
            updated.fields.push(bucket);
        }
    }
    updated
}

/// Handles joins and removals alike; both carry the full roster snapshot.
pub async fn participant_joined(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: ParticipantJoined = message.decode()?;
    let roster = merged_roster(&payload);

    let gateway = caps.gateway.clone();
    let outcome = run_operation("update_rsvp", &caps.metrics, Some(|| async move {
        let fetched = match gateway
            .fetch_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return terminal_if_missing(e, "round message"),
        };
        let Some(embed) = fetched.embed else {
            return Err(anyhow!(
                "round message {} has no embed",
                payload.event_message_id
            ));
        };
        gateway
            .edit_message(
                &payload.channel_id,
                &payload.event_message_id,
                MessageContent::embed_only(with_roster(&embed, &roster)),
            )
            .await?;
        Ok(OperationResult::Success("roster updated".to_string()))
    }))
    .await;
    settle("update_rsvp", outcome)?;
    Ok(vec![])
}

/// Re-renders the descriptive fields after a round edit, keeping the
/// rosters currently on the message.
pub async fn round_updated(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundEntityUpdated = message.decode()?;
    let view = RoundView {
        round_id: payload.round_id.clone(),
        title: payload.title.clone(),
        description: None,
        start_time: payload.start_time,
        location: payload.location.clone(),
        phase: payload.phase,
    };

    let gateway = caps.gateway.clone();
    let outcome = run_operation("update_round_embed", &caps.metrics, Some(|| async move {
        let fetched = match gateway
            .fetch_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return terminal_if_missing(e, "round message"),
        };
        let Some(current) = fetched.embed else {
            return Err(anyhow!(
                "round message {} has no embed",
                payload.event_message_id
            ));
        };

        let mut updated = render_round_embed(&view, &[]);
        for field in updated.fields.iter_mut() {
            if let Some(existing) = current.fields.iter().find(|f| f.name == field.name) {
                if matches!(
                    field.name.as_str(),
                    ACCEPTED_FIELD | DECLINED_FIELD | TENTATIVE_FIELD
                ) {
                    field.value = existing.value.clone();
                }
            }
        }
        if current.description.is_some() && view.phase == RoundPhase::Upcoming {
            updated.description = current.description.clone();
        }
        gateway
            .edit_message(
                &payload.channel_id,
                &payload.event_message_id,
                MessageContent::embed_only(updated),
            )
            .await?;
        Ok(OperationResult::Success("round embed updated".to_string()))
    }))
    .await;
    settle("update_round_embed", outcome)?;
    Ok(vec![])
}

/// Posts the reminder, mentioning everyone still accepted. A round nobody
/// accepted gets no reminder.
pub async fn round_reminder(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundReminder = message.decode()?;

    let channel_id = match &payload.channel_id {
        Some(channel_id) => channel_id.clone(),
        None => {
            caps.guild_configs
                .resolve(&payload.guild_id)
                .await?
                .event_channel_id
        }
    };

    let gateway = caps.gateway.clone();
    let outcome = run_operation("post_reminder", &caps.metrics, Some(|| async move {
        if payload.accepted_user_ids.is_empty() {
            return Ok(OperationResult::Failure("nobody accepted yet".to_string()));
        }
        let mentions: Vec<String> = payload
            .accepted_user_ids
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect();
        let text = format!(
            "Reminder: **{}** starts <t:{}:R>! {}",
            payload.title,
            payload.start_time.timestamp(),
            mentions.join(" ")
        );
        let message_id = gateway
            .send_message(&channel_id, MessageContent::text(text))
            .await?;
        Ok(OperationResult::Success(message_id))
    }))
    .await;
    settle("post_reminder", outcome)?;
    Ok(vec![])
}

/// Moves the embed into its scorecard form: in-progress colours, the
/// score-entry buttons, rosters preserved.
pub async fn round_started(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundStarted = message.decode()?;
    let view = RoundView {
        round_id: payload.round_id.clone(),
        title: payload.title.clone(),
        description: None,
        start_time: payload.start_time,
        location: payload.location.clone(),
        phase: RoundPhase::InProgress,
    };

    let gateway = caps.gateway.clone();
    let outcome = run_operation("start_round_embed", &caps.metrics, Some(|| async move {
        let fetched = match gateway
            .fetch_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return terminal_if_missing(e, "round message"),
        };
        let Some(current) = fetched.embed else {
            return Err(anyhow!(
                "round message {} has no embed",
                payload.event_message_id
            ));
        };

        let mut updated = render_round_embed(&view, &[]);
        for field in updated.fields.iter_mut() {
            if matches!(
                field.name.as_str(),
                ACCEPTED_FIELD | DECLINED_FIELD | TENTATIVE_FIELD
            ) {
                if let Some(existing) = current.fields.iter().find(|f| f.name == field.name) {
                    field.value = existing.value.clone();
                }
            }
        }
        gateway
            .edit_message(
                &payload.channel_id,
                &payload.event_message_id,
                MessageContent::embed_only(updated).with_components(round_buttons(
                    RoundPhase::InProgress,
                    &payload.round_id,
                )),
            )
            .await?;
        Ok(OperationResult::Success("round started".to_string()))
    }))
    .await;
    settle("start_round_embed", outcome)?;
    Ok(vec![])
}

/// Freezes the embed: gold, `(Final)` markers, no buttons.
pub async fn round_finalized(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundFinalized = message.decode()?;

    let gateway = caps.gateway.clone();
    let outcome = run_operation("finalize_round_embed", &caps.metrics, Some(|| async move {
        let fetched = match gateway
            .fetch_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return terminal_if_missing(e, "round message"),
        };
        let Some(mut embed) = fetched.embed else {
            return Err(anyhow!(
                "round message {} has no embed",
                payload.event_message_id
            ));
        };

        if !embed.title.ends_with(" (Final)") {
            embed.title.push_str(" (Final)");
        }
        embed.colour = RoundPhase::Finalized.colour();
        embed.footer = Some("(Final)".to_string());
        embed.description = Some("Final scores are in.".to_string());
        gateway
            .edit_message(
                &payload.channel_id,
                &payload.event_message_id,
                MessageContent::embed_only(embed).with_components(vec![]),
            )
            .await?;
        Ok(OperationResult::Success("round finalized".to_string()))
    }))
    .await;
    settle("finalize_round_embed", outcome)?;
    Ok(vec![])
}

/// Removes the round message. An already-missing message is the desired
/// end state, not an error.
pub async fn round_deleted(
    caps: Capabilities,
    _ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoundDeleted = message.decode()?;

    let gateway = caps.gateway.clone();
    let outcome = run_operation("delete_round_embed", &caps.metrics, Some(|| async move {
        match gateway
            .delete_message(&payload.channel_id, &payload.event_message_id)
            .await
        {
            Ok(()) => Ok(OperationResult::Success("round message deleted".to_string())),
            Err(e) => terminal_if_missing(e, "round message"),
        }
    }))
    .await;
    settle("delete_round_embed", outcome)?;
    Ok(vec![])
}

/// Fans a tag reassignment out over every scheduled-round message it
/// touches.
pub async fn tags_updated(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: TagsUpdatedForScheduledRounds = message.decode()?;

    let mut tag_updates: HashMap<String, Option<u32>> = HashMap::new();
    let mut rounds = Vec::with_capacity(payload.updated_rounds.len());
    for round in &payload.updated_rounds {
        for assignment in &round.updated_participants {
            tag_updates.insert(assignment.user_id.clone(), assignment.tag);
        }
        rounds.push(ScheduledRoundRef {
            guild_id: round.guild_id.clone(),
            round_id: round.round_id.clone(),
            event_message_id: round.event_message_id.clone(),
            title: round.title.clone(),
            phase: round.phase,
        });
    }
    if rounds.is_empty() || tag_updates.is_empty() {
        info!("tag update touches no scheduled rounds");
        return Ok(vec![]);
    }

    let summary = propagate_tags(
        &caps.gateway,
        &caps.guild_configs,
        &rounds,
        &tag_updates,
        ctx.metadata.guild_id.as_deref(),
    )
    .await;

    // Partial failure is the propagator's contract; only a batch with no
    // effect at all comes back for redelivery.
    if summary.failed > 0 && summary.updated == 0 && summary.skipped == 0 {
        return Err(anyhow!(
            "tag propagation failed for all {} round message(s)",
            summary.failed
        ));
    }
    Ok(vec![])
}
