use std::sync::OnceLock;

use regex::Regex;

/// The `(user, tag, score)` triple recovered from one roster line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub user_id: String,
    pub tag_number: Option<u32>,
    pub score: Option<i32>,
}

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Trailing content beyond the score is deliberately not anchored
        // away; future renders may append to the line and old parsers must
        // keep working.
        Regex::new(r"^\s*<@!?(\d+)>(?:\s+Tag:\s*(\d+))?(?:\s+Score:\s*([+-]\d+))?")
            .expect("participant line regex")
    })
}

/// Recovers a participant triple from a roster line. `None` when the line
/// does not start with a user mention; such lines are someone else's and
/// are preserved verbatim by the synchronizer.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let caps = line_regex().captures(line)?;
    let user_id = caps.get(1)?.as_str().to_string();
    let tag_number = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    let score = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
    Some(ParsedLine {
        user_id,
        tag_number,
        score,
    })
}

/// Canonical roster line: `<@UID>`, then ` Tag: N`, then ` Score: ±K`,
/// each only when present. Scores always carry an explicit sign, `+0`
/// included, so the format stays parseable.
pub fn format_line(user_id: &str, tag_number: Option<u32>, score: Option<i32>) -> String {
    let mut line = format!("<@{}>", user_id);
    if let Some(tag) = tag_number {
        line.push_str(&format!(" Tag: {}", tag));
    }
    if let Some(score) = score {
        line.push_str(&format!(" Score: {:+}", score));
    }
    line
}

/// Whether an embed field holds a participant roster. Matched loosely by
/// vocabulary or status emoji so renames of the display name survive.
pub fn is_roster_field(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ["accepted", "declined", "tentative", "participants"]
        .iter()
        .any(|word| lowered.contains(word))
        || ["\u{2705}", "\u{274C}", "\u{2753}"]
            .iter()
            .any(|emoji| name.contains(emoji))
}
