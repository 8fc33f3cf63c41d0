use std::time::Instant;

use anyhow::anyhow;
use base64::Engine;
use poise::serenity_prelude::{
    CreateInputText, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateQuickModal, InputTextStyle,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::bus::{BusMessage, EventMetadata};
use crate::cache::InteractionContext;
use crate::embed::{ButtonStyleKind, MessageButton};
use crate::events::{topics, RoundCreateRequested, RoundDeleteRequested, RoundUpdateRequested};
use crate::gateway::MessageContent;
use crate::{AppContext, BotData, BotError};

/// Custom-id prefix of the button that re-opens the create modal with the
/// user's prior inputs.
pub const RETRY_CREATE_ROUND: &str = "retry_create_round";

/// Like [`RETRY_CREATE_ROUND`], for the update modal; the payload also
/// carries the round being edited.
pub const RETRY_UPDATE_ROUND: &str = "retry_update_round";

/// What the user typed into the create or update dialog.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateRoundInput {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub timezone: Option<String>,
    pub location: Option<String>,
}

impl CreateRoundInput {
    /// Builds the input record from quick-modal answers, in field order.
    pub fn from_inputs(inputs: &[String]) -> Self {
        let get = |i: usize| inputs.get(i).cloned().unwrap_or_default();
        let optional = |i: usize| Some(get(i)).filter(|s| !s.trim().is_empty());
        Self {
            title: get(0),
            description: optional(1),
            start_time: get(2),
            timezone: optional(3),
            location: optional(4),
        }
    }
}

/// Prior update-dialog inputs plus the round they target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoundRetry {
    pub round_id: String,
    #[serde(flatten)]
    pub input: CreateRoundInput,
}

fn round_modal(title: &str, defaults: Option<&CreateRoundInput>) -> CreateQuickModal {
    let text = |style: InputTextStyle, label: &str, id: &str, required: bool, value: Option<String>| {
        let mut input = CreateInputText::new(style, label, id).required(required);
        if let Some(value) = value {
            input = input.value(value);
        }
        input
    };
    CreateQuickModal::new(title)
        .field(text(
            InputTextStyle::Short,
            "Title",
            "title",
            true,
            defaults.map(|d| d.title.clone()),
        ))
        .field(text(
            InputTextStyle::Paragraph,
            "Description",
            "description",
            false,
            defaults.and_then(|d| d.description.clone()),
        ))
        .field(text(
            InputTextStyle::Short,
            "Start Time",
            "start_time",
            true,
            defaults.map(|d| d.start_time.clone()),
        ))
        .field(text(
            InputTextStyle::Short,
            "Timezone",
            "timezone",
            false,
            defaults.and_then(|d| d.timezone.clone()),
        ))
        .field(text(
            InputTextStyle::Short,
            "Location",
            "location",
            false,
            defaults.and_then(|d| d.location.clone()),
        ))
}

/// The create-round dialog, optionally pre-filled with prior inputs for
/// the retry path.
pub fn create_round_modal(defaults: Option<&CreateRoundInput>) -> CreateQuickModal {
    round_modal("Create a Round", defaults)
}

/// The update-round dialog; same fields, same validation.
pub fn update_round_modal(defaults: Option<&CreateRoundInput>) -> CreateQuickModal {
    round_modal("Update a Round", defaults)
}

/// Title and start time are the only fields the backend refuses to default.
pub fn validate_create_round(input: &CreateRoundInput) -> Result<(), String> {
    if input.title.trim().is_empty() {
        return Err("Title must not be empty.".to_string());
    }
    if input.start_time.trim().is_empty() {
        return Err("Start time must not be empty.".to_string());
    }
    Ok(())
}

fn encode_custom_id(prefix: &str, payload: &impl Serialize) -> Result<String, BotError> {
    let json = serde_json::to_vec(payload)?;
    Ok(format!(
        "{}|{}",
        prefix,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    ))
}

fn decode_custom_id<T: serde::de::DeserializeOwned>(encoded: &str) -> Result<T, BotError> {
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| anyhow!("retry payload is not valid base64: {}", e))?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Packs prior modal inputs into a retry button's custom id.
pub fn encode_retry_payload(input: &CreateRoundInput) -> Result<String, BotError> {
    encode_custom_id(RETRY_CREATE_ROUND, input)
}

/// Inverse of [`encode_retry_payload`], given the part after the `|`.
pub fn decode_retry_payload(encoded: &str) -> Result<CreateRoundInput, BotError> {
    decode_custom_id(encoded)
}

/// Packs prior update inputs and the target round into a retry custom id.
pub fn encode_update_retry_payload(
    round_id: &str,
    input: &CreateRoundInput,
) -> Result<String, BotError> {
    encode_custom_id(
        RETRY_UPDATE_ROUND,
        &UpdateRoundRetry {
            round_id: round_id.to_string(),
            input: input.clone(),
        },
    )
}

/// Inverse of [`encode_update_retry_payload`], given the part after the `|`.
pub fn decode_update_retry_payload(encoded: &str) -> Result<UpdateRoundRetry, BotError> {
    decode_custom_id(encoded)
}

/// The ephemeral failure reply with its retry affordance. The custom id
/// carries whatever the user previously typed, so pressing Retry re-opens
/// a pre-filled modal.
pub fn retry_reply(reason: &str, retry_custom_id: String) -> MessageContent {
    MessageContent::text(format!("Could not create the round: {}", reason)).with_components(vec![
        MessageButton::new(retry_custom_id, "Retry", ButtonStyleKind::Primary),
    ])
}

fn cache_interaction(
    data: &BotData,
    metadata: &EventMetadata,
    user_id: &str,
    guild_id: &str,
    channel_id: &str,
    interaction_id: &str,
    interaction_token: &str,
    retry_payload: Option<String>,
) {
    data.interactions.put(InteractionContext {
        correlation_id: metadata.correlation_id.clone(),
        interaction_id: interaction_id.to_string(),
        interaction_token: interaction_token.to_string(),
        user_id: user_id.to_string(),
        guild_id: guild_id.to_string(),
        channel_id: channel_id.to_string(),
        retry_payload,
        created_at: Instant::now(),
    });
}

/// Validates a submitted create dialog, publishes the request and caches
/// the interaction so the backend's answer can edit this exact ephemeral
/// response. On validation failure the response gets the retry affordance
/// instead and nothing is published.
pub async fn submit_create_round(
    data: &BotData,
    input: CreateRoundInput,
    user_id: &str,
    guild_id: &str,
    channel_id: &str,
    interaction_id: &str,
    interaction_token: &str,
) -> Result<(), BotError> {
    if let Err(reason) = validate_create_round(&input) {
        data.gateway
            .edit_interaction_response(
                interaction_token,
                retry_reply(&reason, encode_retry_payload(&input)?),
            )
            .await?;
        return Ok(());
    }

    let metadata = EventMetadata::correlated()
        .with_guild(guild_id)
        .with_channel(channel_id)
        .with_interaction(interaction_id, interaction_token);
    cache_interaction(
        data,
        &metadata,
        user_id,
        guild_id,
        channel_id,
        interaction_id,
        interaction_token,
        Some(encode_retry_payload(&input)?),
    );

    let payload = RoundCreateRequested {
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        start_time: input.start_time.trim().to_string(),
        timezone: input.timezone.clone(),
        location: input.location.clone(),
        user_id: user_id.to_string(),
        channel_id: channel_id.to_string(),
        guild_id: guild_id.to_string(),
    };
    info!(
        guild_id,
        user_id,
        correlation_id = %metadata.correlation_id,
        "publishing round create request"
    );
    data.bus
        .publish(BusMessage::new(
            topics::ROUND_CREATE_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;

    data.gateway
        .edit_interaction_response(interaction_token, MessageContent::text("Creating your round..."))
        .await?;
    Ok(())
}

/// Update counterpart of [`submit_create_round`]; publishes
/// `round.update.requested` for an existing round.
pub async fn submit_update_round(
    data: &BotData,
    round_id: &str,
    input: CreateRoundInput,
    user_id: &str,
    guild_id: &str,
    channel_id: &str,
    interaction_id: &str,
    interaction_token: &str,
) -> Result<(), BotError> {
    if let Err(reason) = validate_create_round(&input) {
        data.gateway
            .edit_interaction_response(
                interaction_token,
                MessageContent::text(format!("Could not update the round: {}", reason))
                    .with_components(vec![MessageButton::new(
                        encode_update_retry_payload(round_id, &input)?,
                        "Retry",
                        ButtonStyleKind::Primary,
                    )]),
            )
            .await?;
        return Ok(());
    }

    let metadata = EventMetadata::correlated()
        .with_guild(guild_id)
        .with_channel(channel_id)
        .with_interaction(interaction_id, interaction_token);
    cache_interaction(
        data,
        &metadata,
        user_id,
        guild_id,
        channel_id,
        interaction_id,
        interaction_token,
        Some(encode_update_retry_payload(round_id, &input)?),
    );

    let payload = RoundUpdateRequested {
        round_id: round_id.to_string(),
        title: Some(input.title.trim().to_string()),
        description: input.description.clone(),
        start_time: Some(input.start_time.trim().to_string()),
        timezone: input.timezone.clone(),
        location: input.location.clone(),
        user_id: user_id.to_string(),
        guild_id: guild_id.to_string(),
    };
    info!(
        guild_id,
        user_id,
        round_id,
        correlation_id = %metadata.correlation_id,
        "publishing round update request"
    );
    data.bus
        .publish(BusMessage::new(
            topics::ROUND_UPDATE_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;

    data.gateway
        .edit_interaction_response(interaction_token, MessageContent::text("Updating your round..."))
        .await?;
    Ok(())
}

/// Publishes `round.delete.requested` and acknowledges. The embed comes
/// down only once the backend confirms with `round.deleted`.
pub async fn submit_delete_round(
    data: &BotData,
    round_id: &str,
    user_id: &str,
    guild_id: &str,
    channel_id: &str,
    interaction_id: &str,
    interaction_token: &str,
) -> Result<(), BotError> {
    let metadata = EventMetadata::correlated()
        .with_guild(guild_id)
        .with_channel(channel_id)
        .with_interaction(interaction_id, interaction_token);
    cache_interaction(
        data,
        &metadata,
        user_id,
        guild_id,
        channel_id,
        interaction_id,
        interaction_token,
        None,
    );

    let payload = RoundDeleteRequested {
        round_id: round_id.to_string(),
        user_id: user_id.to_string(),
        guild_id: guild_id.to_string(),
    };
    info!(
        guild_id,
        user_id,
        round_id,
        correlation_id = %metadata.correlation_id,
        "publishing round delete request"
    );
    data.bus
        .publish(BusMessage::new(
            topics::ROUND_DELETE_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;

    data.gateway
        .edit_interaction_response(interaction_token, MessageContent::text("Deleting the round..."))
        .await?;
    Ok(())
}

/// Schedule a new frolf round.
#[poise::command(slash_command, guild_only, rename = "createround")]
#[instrument(skip(ctx))]
pub async fn createround(ctx: AppContext<'_>) -> Result<(), BotError> {
    let Some(response) = ctx
        .interaction
        .quick_modal(ctx.serenity_context(), create_round_modal(None))
        .await?
    else {
        return Ok(());
    };

    // Acknowledge the modal submit within the 3s window; the business
    // work happens against the deferred ephemeral response.
    response
        .interaction
        .create_response(
            ctx.serenity_context(),
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| anyhow!("createround outside of a guild"))?
        .to_string();
    let input = CreateRoundInput::from_inputs(&response.inputs);
    submit_create_round(
        ctx.data(),
        input,
        &ctx.author().id.to_string(),
        &guild_id,
        &ctx.channel_id().to_string(),
        &response.interaction.id.to_string(),
        &response.interaction.token,
    )
    .await
}

/// Edit an existing frolf round.
#[poise::command(slash_command, guild_only, rename = "updateround")]
#[instrument(skip(ctx))]
pub async fn updateround(
    ctx: AppContext<'_>,
    #[description = "Id of the round to update"] round_id: String,
) -> Result<(), BotError> {
    let Some(response) = ctx
        .interaction
        .quick_modal(ctx.serenity_context(), update_round_modal(None))
        .await?
    else {
        return Ok(());
    };

    response
        .interaction
        .create_response(
            ctx.serenity_context(),
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| anyhow!("updateround outside of a guild"))?
        .to_string();
    let input = CreateRoundInput::from_inputs(&response.inputs);
    submit_update_round(
        ctx.data(),
        &round_id,
        input,
        &ctx.author().id.to_string(),
        &guild_id,
        &ctx.channel_id().to_string(),
        &response.interaction.id.to_string(),
        &response.interaction.token,
    )
    .await
}

/// Remove a scheduled frolf round.
#[poise::command(slash_command, guild_only, rename = "deleteround")]
#[instrument(skip(ctx))]
pub async fn deleteround(
    ctx: AppContext<'_>,
    #[description = "Id of the round to delete"] round_id: String,
) -> Result<(), BotError> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| anyhow!("deleteround outside of a guild"))?
        .to_string();
    submit_delete_round(
        ctx.data(),
        &round_id,
        &ctx.author().id.to_string(),
        &guild_id,
        &ctx.channel_id().to_string(),
        &ctx.interaction.id.to_string(),
        &ctx.interaction.token,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bus::{EventBus, InMemoryBus};
    use crate::testutil::{test_configs, RecordingGateway};
    use crate::Data;

    fn input() -> CreateRoundInput {
        CreateRoundInput {
            title: "Friday Skins".into(),
            description: None,
            start_time: "2025-03-15T18:00:00Z".into(),
            timezone: Some("America/Chicago".into()),
            location: Some("Winfield".into()),
        }
    }

    fn data_with(bus: &Arc<InMemoryBus>, gateway: &RecordingGateway) -> Data {
        Data::new(
            bus.clone() as Arc<dyn EventBus>,
            Arc::new(gateway.clone()),
            test_configs(),
        )
    }

    #[test]
    fn validation_requires_title_and_start_time() {
        assert!(validate_create_round(&input()).is_ok());

        let mut missing_title = input();
        missing_title.title = "  ".into();
        assert!(validate_create_round(&missing_title).is_err());

        let mut missing_time = input();
        missing_time.start_time = String::new();
        assert!(validate_create_round(&missing_time).is_err());
    }

    #[test]
    fn inputs_map_by_field_order_with_blanks_as_none() {
        let submitted = CreateRoundInput::from_inputs(&[
            "Friday Skins".to_string(),
            "".to_string(),
            "2025-03-15 18:00".to_string(),
            " ".to_string(),
            "Winfield".to_string(),
        ]);
        assert_eq!(submitted.title, "Friday Skins");
        assert_eq!(submitted.description, None);
        assert_eq!(submitted.timezone, None);
        assert_eq!(submitted.location.as_deref(), Some("Winfield"));
    }

    #[test]
    fn retry_payload_round_trips_prior_inputs() {
        let encoded = encode_retry_payload(&input()).unwrap();
        let (prefix, payload) = encoded.split_once('|').unwrap();
        assert_eq!(prefix, RETRY_CREATE_ROUND);

        let decoded = decode_retry_payload(payload).unwrap();
        assert_eq!(decoded.title, "Friday Skins");
        assert_eq!(decoded.location.as_deref(), Some("Winfield"));
    }

    #[test]
    fn update_retry_payload_carries_the_round_id() {
        let encoded = encode_update_retry_payload("R7", &input()).unwrap();
        let (prefix, payload) = encoded.split_once('|').unwrap();
        assert_eq!(prefix, RETRY_UPDATE_ROUND);

        let decoded = decode_update_retry_payload(payload).unwrap();
        assert_eq!(decoded.round_id, "R7");
        assert_eq!(decoded.input.title, "Friday Skins");
        assert_eq!(decoded.input.timezone.as_deref(), Some("America/Chicago"));
    }

    #[test]
    fn retry_reply_carries_a_retry_button() {
        let content = retry_reply(
            "Title must not be empty.",
            encode_retry_payload(&input()).unwrap(),
        );
        let buttons = content.components.unwrap();
        assert_eq!(buttons.len(), 1);
        assert!(buttons[0].custom_id.starts_with("retry_create_round|"));
        assert_eq!(buttons[0].label, "Retry");
    }

    #[test]
    fn garbage_retry_payload_is_rejected() {
        assert!(decode_retry_payload("!!!not-base64!!!").is_err());
        assert!(decode_update_retry_payload("!!!not-base64!!!").is_err());
    }

    #[tokio::test]
    async fn update_submission_publishes_with_the_round_id() {
        let bus = Arc::new(InMemoryBus::new());
        let gateway = RecordingGateway::new();
        let data = data_with(&bus, &gateway);

        submit_update_round(&data, "R1", input(), "U1", "G1", "C1", "I1", "tok-1")
            .await
            .unwrap();

        let published = bus.take_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, topics::ROUND_UPDATE_REQUESTED);
        let payload: RoundUpdateRequested = published[0].decode().unwrap();
        assert_eq!(payload.round_id, "R1");
        assert_eq!(payload.title.as_deref(), Some("Friday Skins"));
        assert_eq!(payload.start_time.as_deref(), Some("2025-03-15T18:00:00Z"));

        let edits = gateway.interaction_edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].content.text.as_deref(), Some("Updating your round..."));
    }

    #[tokio::test]
    async fn invalid_update_gets_a_prefilled_retry_and_publishes_nothing() {
        let bus = Arc::new(InMemoryBus::new());
        let gateway = RecordingGateway::new();
        let data = data_with(&bus, &gateway);

        let mut bad = input();
        bad.title = String::new();
        submit_update_round(&data, "R1", bad, "U1", "G1", "C1", "I1", "tok-1")
            .await
            .unwrap();

        assert!(bus.take_published().is_empty());
        let edits = gateway.interaction_edits();
        let buttons = edits[0].content.components.as_ref().unwrap();
        let (prefix, payload) = buttons[0].custom_id.split_once('|').unwrap();
        assert_eq!(prefix, RETRY_UPDATE_ROUND);
        let decoded = decode_update_retry_payload(payload).unwrap();
        assert_eq!(decoded.round_id, "R1");
        assert_eq!(decoded.input.location.as_deref(), Some("Winfield"));
    }

    #[tokio::test]
    async fn delete_submission_publishes_and_acknowledges() {
        let bus = Arc::new(InMemoryBus::new());
        let gateway = RecordingGateway::new();
        let data = data_with(&bus, &gateway);

        submit_delete_round(&data, "R1", "U1", "G1", "C1", "I1", "tok-1")
            .await
            .unwrap();

        let published = bus.take_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, topics::ROUND_DELETE_REQUESTED);
        let payload: RoundDeleteRequested = published[0].decode().unwrap();
        assert_eq!(payload.round_id, "R1");
        assert_eq!(payload.user_id, "U1");

        let edits = gateway.interaction_edits();
        assert_eq!(edits[0].content.text.as_deref(), Some("Deleting the round..."));
    }
}
