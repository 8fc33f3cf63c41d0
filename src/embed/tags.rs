use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::GuildConfigResolver;
use crate::gateway::ChatGateway;
use crate::operation::OperationResult;

use super::sync::{sync_embed, EmbedDelta};
use super::RoundPhase;

/// A scheduled-round message affected by a tag reassignment.
#[derive(Debug, Clone)]
pub struct ScheduledRoundRef {
    pub guild_id: String,
    pub round_id: String,
    pub event_message_id: String,
    pub title: String,
    pub phase: RoundPhase,
}

/// What happened across one tag-propagation batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagSyncSummary {
    /// Messages whose roster lines changed.
    pub updated: usize,
    /// Messages where no listed user appears; a no-op, still a success.
    pub skipped: usize,
    /// Messages that could not be edited.
    pub failed: usize,
}

/// Rewrites the rosters of every listed scheduled-round message with the
/// new tag numbers. One failing message never aborts the rest of the
/// batch.
///
/// The event channel comes from guild config; rounds that arrive without
/// a guild id fall back to `fallback_guild_id` from the event metadata.
pub async fn propagate_tags(
    gateway: &Arc<dyn ChatGateway>,
    configs: &Arc<dyn GuildConfigResolver>,
    rounds: &[ScheduledRoundRef],
    tag_updates: &HashMap<String, Option<u32>>,
    fallback_guild_id: Option<&str>,
) -> TagSyncSummary {
    let mut summary = TagSyncSummary::default();
    let delta = EmbedDelta::Tags(tag_updates.clone());

    for round in rounds {
        let guild_id = if round.guild_id.is_empty() {
            fallback_guild_id.unwrap_or_default()
        } else {
            round.guild_id.as_str()
        };
        if guild_id.is_empty() {
            error!(
                round_id = %round.round_id,
                "tag update carries no guild id and none was inherited"
            );
            summary.failed += 1;
            continue;
        }

        let channel_id = match configs.resolve(guild_id).await {
            Ok(config) => config.event_channel_id,
            Err(e) => {
                error!(guild_id, round_id = %round.round_id, error = %e, "config lookup failed");
                summary.failed += 1;
                continue;
            }
        };

        match sync_embed(gateway, &channel_id, &round.event_message_id, &delta).await {
            Ok(OperationResult::Success(note)) if note == "no target users found" => {
                summary.skipped += 1;
            }
            Ok(OperationResult::Success(_)) => summary.updated += 1,
            Ok(other) => {
                error!(round_id = %round.round_id, outcome = ?other, "tag sync did not succeed");
                summary.failed += 1;
            }
            Err(e) => {
                error!(round_id = %round.round_id, error = %e, "tag sync failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "tag propagation finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedField, MessageEmbed, NO_PARTICIPANTS};
    use crate::testutil::{RecordingGateway, StoredMessage, test_configs};

    fn round_ref(guild_id: &str, round_id: &str, message_id: &str) -> ScheduledRoundRef {
        ScheduledRoundRef {
            guild_id: guild_id.to_string(),
            round_id: round_id.to_string(),
            event_message_id: message_id.to_string(),
            title: "Friday Skins".to_string(),
            phase: RoundPhase::Upcoming,
        }
    }

    fn round_embed(accepted: &str) -> MessageEmbed {
        MessageEmbed {
            title: "Friday Skins".into(),
            description: None,
            colour: 0x3498DB,
            footer: None,
            fields: vec![
                EmbedField::new("Accepted", accepted, false),
                EmbedField::new("Declined", NO_PARTICIPANTS, false),
            ],
        }
    }

    #[tokio::test]
    async fn edits_every_message_containing_the_user() {
        let gateway = RecordingGateway::with_messages(vec![
            StoredMessage::new("C-events", "M1", round_embed("<@U1> Tag: 5")),
            StoredMessage::new("C-events", "M2", round_embed("<@U1>\n<@U2>")),
        ]);
        let gateway_dyn: Arc<dyn crate::gateway::ChatGateway> = Arc::new(gateway.clone());
        let configs = test_configs();

        let updates = HashMap::from([("U1".to_string(), Some(42))]);
        let rounds = vec![round_ref("G1", "R1", "M1"), round_ref("G1", "R2", "M2")];
        let summary = propagate_tags(&gateway_dyn, &configs, &rounds, &updates, None).await;

        assert_eq!(summary, TagSyncSummary { updated: 2, skipped: 0, failed: 0 });
        let edits = gateway.edits();
        assert_eq!(edits.len(), 2);
        let accepted_m1 = &edits[0].content.embed.as_ref().unwrap().fields[0];
        assert_eq!(accepted_m1.value, "<@U1> Tag: 42");
        let accepted_m2 = &edits[1].content.embed.as_ref().unwrap().fields[0];
        assert_eq!(accepted_m2.value, "<@U1> Tag: 42\n<@U2>");
    }

    #[tokio::test]
    async fn absent_user_counts_as_skip_not_failure() {
        let gateway = RecordingGateway::with_messages(vec![StoredMessage::new(
            "C-events",
            "M1",
            round_embed("<@U2>"),
        )]);
        let gateway_dyn: Arc<dyn crate::gateway::ChatGateway> = Arc::new(gateway.clone());
        let configs = test_configs();

        let updates = HashMap::from([("U1".to_string(), Some(42))]);
        let summary =
            propagate_tags(&gateway_dyn, &configs, &[round_ref("G1", "R1", "M1")], &updates, None)
                .await;

        assert_eq!(summary, TagSyncSummary { updated: 0, skipped: 1, failed: 0 });
        assert!(gateway.edits().is_empty());
    }

    #[tokio::test]
    async fn one_bad_message_does_not_abort_the_batch() {
        let gateway = RecordingGateway::with_messages(vec![StoredMessage::new(
            "C-events",
            "M2",
            round_embed("<@U1>"),
        )]);
        let gateway_dyn: Arc<dyn crate::gateway::ChatGateway> = Arc::new(gateway.clone());
        let configs = test_configs();

        let updates = HashMap::from([("U1".to_string(), Some(7))]);
        // M1 does not exist; M2 does.
        let rounds = vec![round_ref("G1", "R1", "M1"), round_ref("G1", "R2", "M2")];
        let summary = propagate_tags(&gateway_dyn, &configs, &rounds, &updates, None).await;

        assert_eq!(summary, TagSyncSummary { updated: 1, skipped: 0, failed: 1 });
    }

    #[tokio::test]
    async fn missing_guild_id_falls_back_to_metadata_guild() {
        let gateway = RecordingGateway::with_messages(vec![StoredMessage::new(
            "C-events",
            "M1",
            round_embed("<@U1>"),
        )]);
        let gateway_dyn: Arc<dyn crate::gateway::ChatGateway> = Arc::new(gateway.clone());
        let configs = test_configs();

        let updates = HashMap::from([("U1".to_string(), Some(3))]);
        let summary = propagate_tags(
            &gateway_dyn,
            &configs,
            &[round_ref("", "R1", "M1")],
            &updates,
            Some("G1"),
        )
        .await;
        assert_eq!(summary.updated, 1);

        // And with nothing to fall back on, the item fails but the batch returns.
        let summary = propagate_tags(
            &gateway_dyn,
            &configs,
            &[round_ref("", "R1", "M1")],
            &updates,
            None,
        )
        .await;
        assert_eq!(summary.failed, 1);
    }
}
