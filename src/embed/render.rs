use super::parse::format_line;
use super::{
    ButtonStyleKind, EmbedField, MessageButton, MessageEmbed, Participant, RoundPhase,
    RsvpResponse, RoundView, ACCEPTED_FIELD, DECLINED_FIELD, NO_PARTICIPANTS, TENTATIVE_FIELD,
};

pub const BTN_ACCEPT: &str = "round_accept";
pub const BTN_DECLINE: &str = "round_decline";
pub const BTN_TENTATIVE: &str = "round_tentative";
pub const BTN_ENTER_SCORE: &str = "round_enter_score";
pub const BTN_JOIN_LATE: &str = "round_join_late";

/// Builds the custom id of a round button: `<action>|<round_id>`.
pub fn button_id(action: &str, round_id: &str) -> String {
    format!("{}|{}", action, round_id)
}

/// Splits a round button custom id back into `(action, round_id)`.
pub fn split_button_id(custom_id: &str) -> Option<(&str, &str)> {
    custom_id.split_once('|')
}

/// Renders the full embed projection of a round from scratch.
///
/// Only used on create and on phase transitions; between those, targeted
/// deltas through the synchronizer keep the posted embed current.
pub fn render_round_embed(round: &RoundView, participants: &[Participant]) -> MessageEmbed {
    let title = match round.phase {
        RoundPhase::Finalized => format!("{} (Final)", round.title),
        _ => round.title.clone(),
    };
    let description = match round.phase {
        RoundPhase::Upcoming => Some(
            round
                .description
                .clone()
                .unwrap_or_else(|| "A new frolf round is scheduled. RSVP below!".to_string()),
        ),
        RoundPhase::InProgress => Some("Round in progress. Enter your score below!".to_string()),
        RoundPhase::Finalized => Some("Final scores are in.".to_string()),
        RoundPhase::Deleted => round.description.clone(),
    };

    let mut fields = Vec::with_capacity(5);
    let time_label = match round.phase {
        RoundPhase::Upcoming => "Start Time",
        _ => "Started",
    };
    fields.push(EmbedField::new(
        time_label,
        format!("<t:{}:F>", round.start_time.timestamp()),
        true,
    ));
    if let Some(location) = &round.location {
        fields.push(EmbedField::new("Location", location.clone(), true));
    }
    fields.push(bucket_field(ACCEPTED_FIELD, participants, RsvpResponse::Accept));
    fields.push(bucket_field(DECLINED_FIELD, participants, RsvpResponse::Decline));
    fields.push(bucket_field(
        TENTATIVE_FIELD,
        participants,
        RsvpResponse::Tentative,
    ));

    MessageEmbed {
        title,
        description,
        colour: round.phase.colour(),
        footer: Some(phase_footer(round.phase).to_string()),
        fields,
    }
}

/// The three RSVP bucket fields for a roster, in display order.
pub fn bucket_fields(participants: &[Participant]) -> [EmbedField; 3] {
    [
        bucket_field(ACCEPTED_FIELD, participants, RsvpResponse::Accept),
        bucket_field(DECLINED_FIELD, participants, RsvpResponse::Decline),
        bucket_field(TENTATIVE_FIELD, participants, RsvpResponse::Tentative),
    ]
}

fn bucket_field(name: &str, participants: &[Participant], response: RsvpResponse) -> EmbedField {
    let lines: Vec<String> = participants
        .iter()
        .filter(|p| p.response == response)
        .map(|p| format_line(&p.user_id, p.tag_number, p.score))
        .collect();
    let value = if lines.is_empty() {
        NO_PARTICIPANTS.to_string()
    } else {
        lines.join("\n")
    };
    EmbedField::new(name, value, false)
}

pub fn phase_footer(phase: RoundPhase) -> &'static str {
    match phase {
        RoundPhase::Upcoming => "RSVP with the buttons below",
        RoundPhase::InProgress => "Scores update as they come in",
        RoundPhase::Finalized => "(Final)",
        RoundPhase::Deleted => "This round was removed",
    }
}

/// The interactive controls appropriate for a phase. Finalized and deleted
/// rounds carry none.
pub fn round_buttons(phase: RoundPhase, round_id: &str) -> Vec<MessageButton> {
    match phase {
        RoundPhase::Upcoming => vec![
            MessageButton::new(
                button_id(BTN_ACCEPT, round_id),
                "Accept",
                ButtonStyleKind::Success,
            ),
            MessageButton::new(
                button_id(BTN_DECLINE, round_id),
                "Decline",
                ButtonStyleKind::Danger,
            ),
            MessageButton::new(
                button_id(BTN_TENTATIVE, round_id),
                "Tentative",
                ButtonStyleKind::Secondary,
            ),
        ],
        RoundPhase::InProgress => vec![
            MessageButton::new(
                button_id(BTN_ENTER_SCORE, round_id),
                "Enter Score",
                ButtonStyleKind::Primary,
            ),
            MessageButton::new(
                button_id(BTN_JOIN_LATE, round_id),
                "Join Round LATE",
                ButtonStyleKind::Secondary,
            ),
        ],
        RoundPhase::Finalized | RoundPhase::Deleted => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn round(phase: RoundPhase) -> RoundView {
        RoundView {
            round_id: "R1".into(),
            title: "Friday Skins".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, 15, 18, 0, 0).unwrap(),
            location: Some("Winfield".into()),
            phase,
        }
    }

    fn roster() -> Vec<Participant> {
        vec![
            Participant {
                user_id: "U1".into(),
                response: RsvpResponse::Accept,
                tag_number: Some(5),
                score: None,
            },
            Participant {
                user_id: "U2".into(),
                response: RsvpResponse::Accept,
                tag_number: None,
                score: Some(-2),
            },
            Participant {
                user_id: "U3".into(),
                response: RsvpResponse::Tentative,
                tag_number: None,
                score: None,
            },
        ]
    }

    #[test]
    fn upcoming_embed_has_buckets_and_rsvp_buttons() {
        let embed = render_round_embed(&round(RoundPhase::Upcoming), &roster());
        assert_eq!(embed.title, "Friday Skins");
        assert_eq!(embed.colour, 0x3498DB);

        let accepted = embed.fields.iter().find(|f| f.name == "Accepted").unwrap();
        assert_eq!(accepted.value, "<@U1> Tag: 5\n<@U2> Score: -2");
        let declined = embed.fields.iter().find(|f| f.name == "Declined").unwrap();
        assert_eq!(declined.value, NO_PARTICIPANTS);
        let tentative = embed.fields.iter().find(|f| f.name == "Tentative").unwrap();
        assert_eq!(tentative.value, "<@U3>");

        let buttons = round_buttons(RoundPhase::Upcoming, "R1");
        let ids: Vec<&str> = buttons.iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["round_accept|R1", "round_decline|R1", "round_tentative|R1"]
        );
    }

    #[test]
    fn start_time_renders_as_discord_timestamp_token() {
        let embed = render_round_embed(&round(RoundPhase::Upcoming), &[]);
        let time = embed.fields.iter().find(|f| f.name == "Start Time").unwrap();
        assert_eq!(time.value, "<t:1742061600:F>");
    }

    #[test]
    fn in_progress_swaps_buttons_and_time_label() {
        let embed = render_round_embed(&round(RoundPhase::InProgress), &roster());
        assert_eq!(embed.colour, 0x2ECC71);
        assert!(embed.fields.iter().any(|f| f.name == "Started"));

        let buttons = round_buttons(RoundPhase::InProgress, "R1");
        let ids: Vec<&str> = buttons.iter().map(|b| b.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["round_enter_score|R1", "round_join_late|R1"]);
    }

    #[test]
    fn finalized_is_gold_suffixed_and_buttonless() {
        let embed = render_round_embed(&round(RoundPhase::Finalized), &roster());
        assert_eq!(embed.title, "Friday Skins (Final)");
        assert_eq!(embed.colour, 0xF1C40F);
        assert_eq!(embed.footer.as_deref(), Some("(Final)"));
        assert!(round_buttons(RoundPhase::Finalized, "R1").is_empty());
    }

    #[test]
    fn empty_roster_never_renders_blank_field_values() {
        let embed = render_round_embed(&round(RoundPhase::Upcoming), &[]);
        for field in embed.fields.iter().filter(|f| super::super::parse::is_roster_field(&f.name)) {
            assert_eq!(field.value, NO_PARTICIPANTS);
        }
    }

    #[test]
    fn button_ids_split_back_into_action_and_round() {
        let id = button_id(BTN_JOIN_LATE, "R42");
        assert_eq!(split_button_id(&id), Some(("round_join_late", "R42")));
        assert_eq!(split_button_id("no_separator"), None);
    }
}
