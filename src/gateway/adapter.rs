//! Serenity gateway events translated into bus publications.

use std::time::Instant;

use anyhow::anyhow;
use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateQuickModal, GuildMemberUpdateEvent, InputTextStyle,
    Reaction,
};
use tracing::{info, warn};

use crate::bus::{BusMessage, EventMetadata};
use crate::cache::InteractionContext;
use crate::commands::roles::{role_from_custom_id, ROLE_BUTTON_CANCEL, ROLE_BUTTON_PREFIX};
use crate::commands::round::{
    create_round_modal, decode_retry_payload, decode_update_retry_payload, submit_create_round,
    submit_update_round, update_round_modal, CreateRoundInput, RETRY_CREATE_ROUND,
    RETRY_UPDATE_ROUND,
};
use crate::embed::render::{
    split_button_id, BTN_ACCEPT, BTN_DECLINE, BTN_ENTER_SCORE, BTN_JOIN_LATE, BTN_TENTATIVE,
};
use crate::embed::{ButtonStyleKind, MessageButton, RsvpResponse};
use crate::events::{
    topics, ParticipantJoinRequested, RoleUpdateRequested, ScoreUpdateRequested, SignupRequested,
    UserProfileUpdated,
};
use crate::gateway::MessageContent;
use crate::{BotData, BotError};

/// Custom-id prefix of the short-lived signup button; the rest is the id
/// of the user whose reaction asked for it.
pub const SIGNUP_START: &str = "signup_start";

/// Routes the gateway events this process cares about. Everything else
/// falls through untouched.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, BotError>,
    data: &BotData,
) -> Result<(), BotError> {
    match event {
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => handle_component(ctx, component, data).await,
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            handle_reaction(ctx, add_reaction, data).await
        }
        serenity::FullEvent::GuildMemberUpdate { event, .. } => {
            handle_member_update(ctx, event, data).await
        }
        _ => Ok(()),
    }
}

/// A score is a signed stroke count relative to par.
pub fn parse_score(raw: &str) -> Result<i32, String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    digits
        .parse::<i32>()
        .map_err(|_| format!("{:?} is not a valid score; enter e.g. -3, 0 or +2", trimmed))
}

/// Tag numbers are optional on signup; blank means none.
pub fn parse_optional_tag(raw: &str) -> Result<Option<u32>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| format!("{:?} is not a valid tag number", trimmed))
}

/// Caches the interaction under a fresh correlation id and returns the
/// metadata to stamp on the matching publication.
fn remember_interaction(
    data: &BotData,
    interaction_id: &str,
    interaction_token: &str,
    user_id: &str,
    guild_id: &str,
    channel_id: &str,
) -> EventMetadata {
    let metadata = EventMetadata::correlated()
        .with_guild(guild_id)
        .with_channel(channel_id)
        .with_interaction(interaction_id, interaction_token);
    data.interactions.put(InteractionContext {
        correlation_id: metadata.correlation_id.clone(),
        interaction_id: interaction_id.to_string(),
        interaction_token: interaction_token.to_string(),
        user_id: user_id.to_string(),
        guild_id: guild_id.to_string(),
        channel_id: channel_id.to_string(),
        retry_payload: None,
        created_at: Instant::now(),
    });
    metadata
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
) -> Result<(), BotError> {
    let custom_id = component.data.custom_id.clone();
    let guild_id = component
        .guild_id
        .map(|g| g.to_string())
        .unwrap_or_default();
    let channel_id = component.channel_id.to_string();
    let user_id = component.user.id.to_string();

    if custom_id == ROLE_BUTTON_CANCEL {
        component
            .create_response(
                ctx,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .content("Cancelled.")
                        .components(vec![]),
                ),
            )
            .await?;
        return Ok(());
    }

    if custom_id.starts_with(ROLE_BUTTON_PREFIX) {
        let Some(role_name) = role_from_custom_id(&custom_id) else {
            return Ok(());
        };
        component
            .create_response(
                ctx,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .content(format!("Requesting the {} role...", role_name))
                        .components(vec![]),
                ),
            )
            .await?;
        let metadata = remember_interaction(
            data,
            &component.id.to_string(),
            &component.token,
            &user_id,
            &guild_id,
            &channel_id,
        );
        let payload = RoleUpdateRequested {
            user_id,
            guild_id,
            role_name: role_name.to_string(),
        };
        data.bus
            .publish(BusMessage::new(
                topics::USER_ROLE_UPDATE_REQUESTED,
                &payload,
                metadata,
            )?)
            .await?;
        return Ok(());
    }

    let Some((action, argument)) = split_button_id(&custom_id) else {
        return Ok(());
    };

    match action {
        BTN_ACCEPT | BTN_DECLINE | BTN_TENTATIVE => {
            rsvp(ctx, component, data, argument, rsvp_response(action), false).await
        }
        BTN_JOIN_LATE => rsvp(ctx, component, data, argument, RsvpResponse::Accept, true).await,
        BTN_ENTER_SCORE => enter_score(ctx, component, data, argument).await,
        RETRY_CREATE_ROUND => retry_create_round(ctx, component, data, argument).await,
        RETRY_UPDATE_ROUND => retry_update_round(ctx, component, data, argument).await,
        SIGNUP_START => signup(ctx, component, data, argument).await,
        _ => {
            info!(custom_id, "ignoring unrecognized component");
            Ok(())
        }
    }
}

fn rsvp_response(action: &str) -> RsvpResponse {
    match action {
        BTN_DECLINE => RsvpResponse::Decline,
        BTN_TENTATIVE => RsvpResponse::Tentative,
        _ => RsvpResponse::Accept,
    }
}

async fn rsvp(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
    round_id: &str,
    response: RsvpResponse,
    joined_late: bool,
) -> Result<(), BotError> {
    // Deferred update keeps the public embed as-is until the roster
    // snapshot arrives from the backend.
    component
        .create_response(ctx, CreateInteractionResponse::Acknowledge)
        .await?;

    let guild_id = component
        .guild_id
        .map(|g| g.to_string())
        .unwrap_or_default();
    let metadata = remember_interaction(
        data,
        &component.id.to_string(),
        &component.token,
        &component.user.id.to_string(),
        &guild_id,
        &component.channel_id.to_string(),
    );
    let payload = ParticipantJoinRequested {
        round_id: round_id.to_string(),
        user_id: component.user.id.to_string(),
        response,
        joined_late,
        guild_id,
    };
    data.bus
        .publish(BusMessage::new(
            topics::ROUND_PARTICIPANT_JOIN_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;
    Ok(())
}

async fn enter_score(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
    round_id: &str,
) -> Result<(), BotError> {
    let modal = CreateQuickModal::new("Enter Your Score").field(
        CreateInputText::new(InputTextStyle::Short, "Score (relative to par)", "score")
            .placeholder("-3, 0 or +2")
            .required(true),
    );
    let Some(submitted) = component.quick_modal(ctx, modal).await? else {
        return Ok(());
    };
    submitted
        .interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let raw = submitted.inputs.first().cloned().unwrap_or_default();
    let score = match parse_score(&raw) {
        Ok(score) => score,
        Err(reason) => {
            data.gateway
                .edit_interaction_response(
                    &submitted.interaction.token,
                    MessageContent::text(reason),
                )
                .await?;
            return Ok(());
        }
    };

    let guild_id = component
        .guild_id
        .map(|g| g.to_string())
        .unwrap_or_default();
    let metadata = remember_interaction(
        data,
        &submitted.interaction.id.to_string(),
        &submitted.interaction.token,
        &component.user.id.to_string(),
        &guild_id,
        &component.channel_id.to_string(),
    );
    let payload = ScoreUpdateRequested {
        round_id: round_id.to_string(),
        user_id: component.user.id.to_string(),
        score,
        guild_id,
    };
    data.bus
        .publish(BusMessage::new(
            topics::ROUND_SCORE_UPDATE_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;

    data.gateway
        .edit_interaction_response(
            &submitted.interaction.token,
            MessageContent::text("Score submitted!"),
        )
        .await?;
    Ok(())
}

async fn retry_create_round(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
    encoded: &str,
) -> Result<(), BotError> {
    let defaults: CreateRoundInput = decode_retry_payload(encoded)?;
    let Some(submitted) = component
        .quick_modal(ctx, create_round_modal(Some(&defaults)))
        .await?
    else {
        return Ok(());
    };
    submitted
        .interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow!("create retry outside of a guild"))?
        .to_string();
    submit_create_round(
        data,
        CreateRoundInput::from_inputs(&submitted.inputs),
        &component.user.id.to_string(),
        &guild_id,
        &component.channel_id.to_string(),
        &submitted.interaction.id.to_string(),
        &submitted.interaction.token,
    )
    .await
}

async fn retry_update_round(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
    encoded: &str,
) -> Result<(), BotError> {
    let prior = decode_update_retry_payload(encoded)?;
    let Some(submitted) = component
        .quick_modal(ctx, update_round_modal(Some(&prior.input)))
        .await?
    else {
        return Ok(());
    };
    submitted
        .interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow!("update retry outside of a guild"))?
        .to_string();
    submit_update_round(
        data,
        &prior.round_id,
        CreateRoundInput::from_inputs(&submitted.inputs),
        &component.user.id.to_string(),
        &guild_id,
        &component.channel_id.to_string(),
        &submitted.interaction.id.to_string(),
        &submitted.interaction.token,
    )
    .await
}

async fn signup(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &BotData,
    invited_user_id: &str,
) -> Result<(), BotError> {
    if component.user.id.to_string() != invited_user_id {
        component
            .create_response(
                ctx,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("This signup button belongs to someone else; react to the signup message to get your own.")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    }

    let modal = CreateQuickModal::new("League Signup")
        .field(
            CreateInputText::new(InputTextStyle::Short, "Display Name", "display_name")
                .required(false),
        )
        .field(
            CreateInputText::new(InputTextStyle::Short, "Tag Number", "tag_number")
                .placeholder("leave blank for none")
                .required(false),
        );
    let Some(submitted) = component.quick_modal(ctx, modal).await? else {
        return Ok(());
    };
    submitted
        .interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let display_name = submitted
        .inputs
        .first()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let tag_number = match parse_optional_tag(submitted.inputs.get(1).map(String::as_str).unwrap_or(""))
    {
        Ok(tag) => tag,
        Err(reason) => {
            data.gateway
                .edit_interaction_response(
                    &submitted.interaction.token,
                    MessageContent::text(reason),
                )
                .await?;
            return Ok(());
        }
    };

    let guild_id = component
        .guild_id
        .map(|g| g.to_string())
        .unwrap_or_default();
    let metadata = remember_interaction(
        data,
        &submitted.interaction.id.to_string(),
        &submitted.interaction.token,
        invited_user_id,
        &guild_id,
        &component.channel_id.to_string(),
    );
    let payload = SignupRequested {
        user_id: invited_user_id.to_string(),
        guild_id,
        display_name,
        tag_number,
    };
    data.bus
        .publish(BusMessage::new(
            topics::USER_SIGNUP_REQUESTED,
            &payload,
            metadata,
        )?)
        .await?;

    data.gateway
        .edit_interaction_response(
            &submitted.interaction.token,
            MessageContent::text("Signup request sent!"),
        )
        .await?;

    // The invitation message has served its purpose.
    if let Err(e) = data
        .gateway
        .delete_message(
            &component.channel_id.to_string(),
            &component.message.id.to_string(),
        )
        .await
    {
        warn!(error = %e, "could not remove signup invitation message");
    }
    Ok(())
}

/// A reaction on the configured signup message opens the signup path. A
/// raw reaction carries no interaction token, so no modal can open here;
/// instead the bot posts a short-lived button addressed to the reactor,
/// and the button press carries the token.
async fn handle_reaction(
    ctx: &serenity::Context,
    reaction: &Reaction,
    data: &BotData,
) -> Result<(), BotError> {
    let Some(guild_id) = reaction.guild_id else {
        return Ok(());
    };
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    if user_id == ctx.cache.current_user().id {
        return Ok(());
    }

    let config = match data.guild_configs.resolve(&guild_id.to_string()).await {
        Ok(config) => config,
        // Guilds the bot is in but does not serve are routine.
        Err(_) => return Ok(()),
    };
    if reaction.message_id.to_string() != config.signup_message_id {
        return Ok(());
    }

    info!(guild_id = %guild_id, user_id = %user_id, "signup reaction received");
    data.gateway
        .send_message(
            &config.signup_channel_id,
            MessageContent::text(format!("<@{}>, press the button below to sign up!", user_id))
                .with_components(vec![MessageButton::new(
                    format!("{}|{}", SIGNUP_START, user_id),
                    "Sign Up",
                    ButtonStyleKind::Primary,
                )]),
        )
        .await?;
    Ok(())
}

/// Guild nickname when set, global display name otherwise.
pub fn preferred_display_name(
    nick: Option<&str>,
    global_name: Option<&str>,
) -> Option<String> {
    let clean = |s: Option<&str>| {
        s.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    clean(nick).or_else(|| clean(global_name))
}

/// A member changing their nickname or avatar feeds the backend's profile
/// projection. Bots and unserved guilds are skipped.
async fn handle_member_update(
    _ctx: &serenity::Context,
    event: &GuildMemberUpdateEvent,
    data: &BotData,
) -> Result<(), BotError> {
    if event.user.bot {
        return Ok(());
    }
    let guild_id = event.guild_id.to_string();
    if data.guild_configs.resolve(&guild_id).await.is_err() {
        return Ok(());
    }

    let user_id = event.user.id.to_string();
    let payload = UserProfileUpdated {
        user_id: user_id.clone(),
        guild_id: guild_id.clone(),
        display_name: preferred_display_name(
            event.nick.as_deref(),
            event.user.global_name.as_deref(),
        ),
        avatar_url: Some(event.user.face()),
    };
    info!(guild_id, user_id, "publishing member profile update");
    data.bus
        .publish(BusMessage::new(
            topics::USER_PROFILE_UPDATED,
            &payload,
            EventMetadata::correlated().with_guild(guild_id),
        )?)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_accept_signed_and_bare_integers() {
        assert_eq!(parse_score("-3"), Ok(-3));
        assert_eq!(parse_score("+2"), Ok(2));
        assert_eq!(parse_score(" 0 "), Ok(0));
        assert!(parse_score("birdie").is_err());
        assert!(parse_score("").is_err());
    }

    #[test]
    fn tags_are_optional_but_must_be_numeric() {
        assert_eq!(parse_optional_tag(""), Ok(None));
        assert_eq!(parse_optional_tag("  "), Ok(None));
        assert_eq!(parse_optional_tag("42"), Ok(Some(42)));
        assert!(parse_optional_tag("-1").is_err());
        assert!(parse_optional_tag("first").is_err());
    }

    #[test]
    fn nickname_wins_over_global_name() {
        assert_eq!(
            preferred_display_name(Some("Chains McGee"), Some("chains")),
            Some("Chains McGee".to_string())
        );
        assert_eq!(
            preferred_display_name(None, Some("chains")),
            Some("chains".to_string())
        );
        assert_eq!(
            preferred_display_name(Some("  "), Some("chains")),
            Some("chains".to_string())
        );
        assert_eq!(preferred_display_name(None, None), None);
    }

    #[test]
    fn rsvp_actions_map_to_their_responses() {
        assert_eq!(rsvp_response(BTN_ACCEPT), RsvpResponse::Accept);
        assert_eq!(rsvp_response(BTN_DECLINE), RsvpResponse::Decline);
        assert_eq!(rsvp_response(BTN_TENTATIVE), RsvpResponse::Tentative);
    }
}
