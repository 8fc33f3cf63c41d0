//! Signup and role outcomes flowing back from the backend.

use anyhow::anyhow;
use tracing::info;

use crate::bus::router::{EventContext, Routed};
use crate::bus::BusMessage;
use crate::errors::CoreError;
use crate::events::{RoleUpdateFailed, RoleUpdated, UserCreated, UserCreationFailed};
use crate::gateway::MessageContent;
use crate::operation::{run_operation, OperationResult};
use crate::BotError;

use super::{respond_to_requester, Capabilities};

/// A signup went through: grant the registered role and confirm.
pub async fn user_created(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: UserCreated = message.decode()?;
    let config = caps.guild_configs.resolve(&payload.guild_id).await?;

    let gateway = caps.gateway.clone();
    let guild_id = payload.guild_id.clone();
    let user_id = payload.user_id.clone();
    let role_id = config.registered_role_id.clone();
    let outcome = run_operation("grant_registered_role", &caps.metrics, Some(|| async move {
        gateway.add_role(&guild_id, &user_id, &role_id).await?;
        Ok(OperationResult::Success(()))
    }))
    .await;
    match outcome {
        None => return Err(anyhow!("grant_registered_role panicked")),
        Some(OperationResult::Error(e)) => return Err(e),
        Some(_) => {}
    }

    let confirmation = match payload.tag_number {
        Some(tag) => format!("Welcome to the league! You hold tag #{}.", tag),
        None => "Welcome to the league!".to_string(),
    };
    respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.user_id,
        MessageContent::text(confirmation),
    )
    .await?;
    Ok(vec![])
}

pub async fn user_creation_failed(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: UserCreationFailed = message.decode()?;
    let reason = if payload.reason.is_empty() {
        "the backend rejected the signup".to_string()
    } else {
        payload.reason.clone()
    };
    respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.user_id,
        MessageContent::text(format!("Signup failed: {}", reason)),
    )
    .await?;
    Ok(vec![])
}

/// The backend approved a role change: grant the mapped Discord role,
/// confirm, and emit the trace record.
pub async fn role_updated(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoleUpdated = message.decode()?;
    let config = caps.guild_configs.resolve(&payload.guild_id).await?;
    let Some(role_id) = config.role_id(&payload.role_name) else {
        return Err(CoreError::Configuration(format!(
            "role {} is not mapped for guild {}",
            payload.role_name, payload.guild_id
        ))
        .into());
    };

    let gateway = caps.gateway.clone();
    let guild_id = payload.guild_id.clone();
    let user_id = payload.user_id.clone();
    let role_id = role_id.to_string();
    let outcome = run_operation("grant_role", &caps.metrics, Some(|| async move {
        gateway.add_role(&guild_id, &user_id, &role_id).await?;
        Ok(OperationResult::Success(()))
    }))
    .await;
    match outcome {
        None => return Err(anyhow!("grant_role panicked")),
        Some(OperationResult::Error(e)) => return Err(e),
        Some(_) => {}
    }
    info!(
        user_id = %payload.user_id,
        role_name = %payload.role_name,
        "role granted"
    );

    if let Err(e) = respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.user_id,
        MessageContent::text(format!("You now have the {} role!", payload.role_name)),
    )
    .await
    {
        // Role is granted either way; a dead token must not trigger a
        // redelivery that grants it twice.
        tracing::warn!(error = %e, "could not confirm role update");
    }

    Ok(vec![Routed::unrouted(&payload, ctx.metadata.clone())?])
}

pub async fn role_update_failed(
    caps: Capabilities,
    ctx: EventContext,
    message: BusMessage,
) -> Result<Vec<Routed>, BotError> {
    let payload: RoleUpdateFailed = message.decode()?;
    let reason = if payload.reason.is_empty() {
        "the backend rejected the request".to_string()
    } else {
        payload.reason.clone()
    };
    respond_to_requester(
        &caps,
        &ctx.metadata,
        &payload.user_id,
        MessageContent::text(format!(
            "Could not give you the {} role: {}",
            payload.role_name, reason
        )),
    )
    .await?;
    Ok(vec![])
}
