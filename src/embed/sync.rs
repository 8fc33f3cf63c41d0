use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use crate::gateway::{ChatGateway, MessageContent};
use crate::operation::OperationResult;
use crate::BotError;

use super::parse::{format_line, is_roster_field, parse_line};
use super::{MessageEmbed, NO_PARTICIPANTS};

/// A targeted change to the participant lines of a posted embed.
#[derive(Debug, Clone)]
pub enum EmbedDelta {
    /// New tag numbers per user; `None` clears the tag.
    Tags(HashMap<String, Option<u32>>),
    /// One participant's score changed.
    Score { user_id: String, score: i32 },
}

impl EmbedDelta {
    fn applies_to(&self, user_id: &str) -> bool {
        match self {
            EmbedDelta::Tags(updates) => updates.contains_key(user_id),
            EmbedDelta::Score { user_id: target, .. } => target == user_id,
        }
    }
}

/// Applies `delta` to every roster field of `embed`, returning the new
/// embed and how many lines changed.
///
/// Lines that do not parse, or whose user the delta does not target, are
/// preserved byte-for-byte; so are all non-roster fields. Applying the
/// same delta twice yields an identical embed.
pub fn apply_delta(embed: &MessageEmbed, delta: &EmbedDelta) -> (MessageEmbed, usize) {
    let mut updated = embed.clone();
    let mut touched = 0;

    for field in updated.fields.iter_mut() {
        if !is_roster_field(&field.name) {
            continue;
        }
        let mut lines: Vec<String> = Vec::new();
        for line in field.value.lines() {
            if line.trim() == NO_PARTICIPANTS {
                continue;
            }
            let Some(parsed) = parse_line(line) else {
                // Third-party content; tolerate it.
                lines.push(line.to_string());
                continue;
            };
            if !delta.applies_to(&parsed.user_id) {
                lines.push(line.to_string());
                continue;
            }
            let (tag, score) = match delta {
                EmbedDelta::Tags(updates) => (
                    updates.get(&parsed.user_id).copied().flatten(),
                    parsed.score,
                ),
                EmbedDelta::Score { score, .. } => (parsed.tag_number, Some(*score)),
            };
            let rendered = format_line(&parsed.user_id, tag, score);
            if rendered != line {
                touched += 1;
            }
            lines.push(rendered);
        }
        field.value = if lines.is_empty() {
            NO_PARTICIPANTS.to_string()
        } else {
            lines.join("\n")
        };
    }

    (updated, touched)
}

/// Fetches the embed behind `(channel_id, message_id)`, applies `delta`
/// and issues a single edit when anything actually changed.
///
/// A delta that targets nobody on the embed is a no-op, not an error:
/// the result is `Success("no target users found")` and no edit happens.
/// Two concurrent deltas are not serialised here; the backend orders
/// publications per round, and the last writer wins on the snapshot.
pub async fn sync_embed(
    gateway: &Arc<dyn ChatGateway>,
    channel_id: &str,
    message_id: &str,
    delta: &EmbedDelta,
) -> Result<OperationResult<String>, BotError> {
    let message = gateway.fetch_message(channel_id, message_id).await?;
    let Some(embed) = message.embed else {
        return Err(anyhow!(
            "message {} in channel {} has no embed to update",
            message_id,
            channel_id
        ));
    };

    let (updated, touched) = apply_delta(&embed, delta);
    if touched == 0 {
        return Ok(OperationResult::Success("no target users found".to_string()));
    }

    gateway
        .edit_message(
            channel_id,
            message_id,
            MessageContent::embed_only(updated),
        )
        .await?;
    Ok(OperationResult::Success(format!("updated {} line(s)", touched)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedField;

    fn embed_with(accepted: &str) -> MessageEmbed {
        MessageEmbed {
            title: "Friday Skins".into(),
            description: None,
            colour: 0x3498DB,
            footer: None,
            fields: vec![
                EmbedField::new("Start Time", "<t:1742061600:F>", true),
                EmbedField::new("Accepted", accepted, false),
                EmbedField::new("Declined", NO_PARTICIPANTS, false),
            ],
        }
    }

    fn tag_delta(user_id: &str, tag: Option<u32>) -> EmbedDelta {
        EmbedDelta::Tags(HashMap::from([(user_id.to_string(), tag)]))
    }

    #[test]
    fn applies_a_tag_update_in_place() {
        let embed = embed_with("<@U1> Tag: 5\n<@U2>");
        let (updated, touched) = apply_delta(&embed, &tag_delta("U1", Some(42)));
        assert_eq!(touched, 1);
        assert_eq!(updated.fields[1].value, "<@U1> Tag: 42\n<@U2>");
    }

    #[test]
    fn clears_a_tag_when_update_is_none() {
        let embed = embed_with("<@U1> Tag: 5 Score: +2");
        let (updated, _) = apply_delta(&embed, &tag_delta("U1", None));
        assert_eq!(updated.fields[1].value, "<@U1> Score: +2");
    }

    #[test]
    fn score_delta_keeps_the_tag() {
        let embed = embed_with("<@U1> Tag: 5");
        let delta = EmbedDelta::Score {
            user_id: "U1".into(),
            score: -3,
        };
        let (updated, touched) = apply_delta(&embed, &delta);
        assert_eq!(touched, 1);
        assert_eq!(updated.fields[1].value, "<@U1> Tag: 5 Score: -3");
    }

    #[test]
    fn idempotent_and_identity_laws_hold() {
        let embed = embed_with("<@U1> Tag: 5\n<@U2> Score: +1");
        let delta = tag_delta("U1", Some(9));
        let (once, _) = apply_delta(&embed, &delta);
        let (twice, touched_again) = apply_delta(&once, &delta);
        assert_eq!(once, twice);
        assert_eq!(touched_again, 0);

        let empty = EmbedDelta::Tags(HashMap::new());
        let (unchanged, touched) = apply_delta(&embed, &empty);
        assert_eq!(unchanged, embed);
        assert_eq!(touched, 0);
    }

    #[test]
    fn untargeted_and_unparseable_lines_survive_verbatim() {
        let embed = embed_with("<@U1> Tag: banana\nsomeone scribbled here\n<@U2>");
        let (updated, touched) = apply_delta(&embed, &tag_delta("U2", Some(7)));
        assert_eq!(touched, 1);
        assert_eq!(
            updated.fields[1].value,
            "<@U1> Tag: banana\nsomeone scribbled here\n<@U2> Tag: 7"
        );
    }

    #[test]
    fn non_roster_fields_are_untouched() {
        let embed = embed_with("<@U1>");
        let (updated, _) = apply_delta(&embed, &tag_delta("U1", Some(1)));
        assert_eq!(updated.fields[0], embed.fields[0]);
        assert_eq!(updated.title, embed.title);
        assert_eq!(updated.colour, embed.colour);
    }

    #[test]
    fn empty_bucket_keeps_its_placeholder() {
        let embed = embed_with(NO_PARTICIPANTS);
        let (updated, touched) = apply_delta(&embed, &tag_delta("U1", Some(1)));
        assert_eq!(touched, 0);
        assert_eq!(updated.fields[1].value, NO_PARTICIPANTS);
        assert_eq!(updated.fields[2].value, NO_PARTICIPANTS);
    }
}
