use anyhow::anyhow;
use tracing::instrument;

use crate::embed::{ButtonStyleKind, MessageButton};
use crate::gateway::MessageContent;
use crate::{AppContext, BotError};

/// Custom-id prefix for the role picker buttons; the rest is the
/// application role name.
pub const ROLE_BUTTON_PREFIX: &str = "role_button_";

/// Custom id of the picker's cancel button.
pub const ROLE_BUTTON_CANCEL: &str = "role_button_cancel";

/// One button per mapped role, plus a cancel button at the end.
pub fn role_picker_buttons(mut role_names: Vec<String>) -> Vec<MessageButton> {
    role_names.sort();
    let mut buttons: Vec<MessageButton> = role_names
        .into_iter()
        .map(|name| {
            MessageButton::new(
                format!("{}{}", ROLE_BUTTON_PREFIX, name),
                name,
                ButtonStyleKind::Primary,
            )
        })
        .collect();
    buttons.push(MessageButton::new(
        ROLE_BUTTON_CANCEL,
        "Cancel",
        ButtonStyleKind::Secondary,
    ));
    buttons
}

/// Role name carried by a picker button's custom id, if it is one.
pub fn role_from_custom_id(custom_id: &str) -> Option<&str> {
    if custom_id == ROLE_BUTTON_CANCEL {
        return None;
    }
    custom_id.strip_prefix(ROLE_BUTTON_PREFIX)
}

/// Pick one of the league roles for yourself.
#[poise::command(slash_command, guild_only, rename = "updaterole")]
#[instrument(skip(ctx))]
pub async fn updaterole(ctx: AppContext<'_>) -> Result<(), BotError> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| anyhow!("updaterole outside of a guild"))?
        .to_string();
    let config = ctx.data().guild_configs.resolve(&guild_id).await?;

    let role_names: Vec<String> = config.role_mappings.keys().cloned().collect();
    if role_names.is_empty() {
        ctx.data()
            .gateway
            .edit_interaction_response(
                &ctx.interaction.token,
                MessageContent::text("No roles are configured for this server."),
            )
            .await?;
        return Ok(());
    }

    ctx.data()
        .gateway
        .edit_interaction_response(
            &ctx.interaction.token,
            MessageContent::text("Pick the role you want:")
                .with_components(role_picker_buttons(role_names)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picker_lists_roles_sorted_with_cancel_last() {
        let buttons = role_picker_buttons(vec!["Editor".into(), "Admin".into()]);
        let ids: Vec<&str> = buttons.iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["role_button_Admin", "role_button_Editor", "role_button_cancel"]);
        assert_eq!(buttons.last().unwrap().label, "Cancel");
    }

    #[test]
    fn custom_id_parsing_distinguishes_cancel() {
        assert_eq!(role_from_custom_id("role_button_Editor"), Some("Editor"));
        assert_eq!(role_from_custom_id("role_button_cancel"), None);
        assert_eq!(role_from_custom_id("round_accept|R1"), None);
    }
}
