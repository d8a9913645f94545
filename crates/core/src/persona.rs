//! Persona heuristics.
//!
//! A persona is whatever the conversation has established about who the
//! agent is playing: a name, a role, personality traits. These are cheap
//! lexicon scans, not model calls.

/// Terms that mark a transcript line as persona-bearing.
pub const PERSONA_LEXICON: &[&str] = &[
    "tsundere",
    "personality",
    "character",
    "name",
    "role",
    "i am",
    "my name",
    "trait",
    "behavior",
];

/// Number of persona lines kept by [`extract_persona`].
pub const MAX_PERSONA_LINES: usize = 5;

/// Tone markers in agent lines and the indicator each one implies.
pub const TONE_MARKERS: &[(&[&str], &str)] = &[
    (
        &["tsundere", "baka", "idiot", "not like", "it's not like"],
        "tsundere personality",
    ),
    (
        &["embarrassed", "flustered", "annoyed"],
        "emotional responses",
    ),
];

/// Whether `line` mentions any term of the persona lexicon.
pub fn is_persona_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    PERSONA_LEXICON.iter().any(|term| lower.contains(term))
}

/// Whether an archived summary carries persona information.
///
/// Uses the same lexicon as [`extract_persona`], so any persona line that
/// made it into a summary is found again at rotation.
pub fn summary_has_persona(summary: &str) -> bool {
    is_persona_line(summary)
}

/// Keep the last [`MAX_PERSONA_LINES`] persona-bearing lines, newline-joined.
///
/// Returns an empty string when nothing matches.
pub fn extract_persona(transcript: &str) -> String {
    let lines: Vec<&str> = transcript.lines().filter(|l| is_persona_line(l)).collect();
    let start = lines.len().saturating_sub(MAX_PERSONA_LINES);
    lines[start..].join("\n")
}

/// Tone indicators implied by a set of agent lines, deduplicated in lexicon order.
pub fn tone_indicators<'a>(agent_lines: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let lowered: Vec<String> = agent_lines.into_iter().map(str::to_lowercase).collect();
    TONE_MARKERS
        .iter()
        .filter(|(markers, _)| {
            lowered
                .iter()
                .any(|line| markers.iter().any(|m| line.contains(m)))
        })
        .map(|(_, indicator)| *indicator)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_keeps_only_persona_lines() {
        let transcript = "User: hello\nAgent: My name is Aiko\nUser: roll a d20\nAgent: I am a tsundere mage";
        let persona = extract_persona(transcript);
        assert_eq!(persona, "Agent: My name is Aiko\nAgent: I am a tsundere mage");
    }

    #[test]
    fn extract_keeps_last_five() {
        let transcript = (0..8)
            .map(|i| format!("trait {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let persona = extract_persona(&transcript);
        assert_eq!(persona.lines().count(), 5);
        assert!(persona.starts_with("trait 3"));
        assert!(persona.ends_with("trait 7"));
    }

    #[test]
    fn extract_empty_when_no_match() {
        assert_eq!(extract_persona("User: attack the goblin\nAgent: You hit."), "");
    }

    #[test]
    fn summary_check_uses_full_lexicon() {
        assert!(summary_has_persona("Persona: Agent: my name is Bob"));
        assert!(summary_has_persona("Agent responses: I play the ROLE of healer"));
        assert!(summary_has_persona("User discussed: your PERSONALITY"));
        assert!(!summary_has_persona("User discussed: roll a d20 | Agent responses: 17"));
    }

    #[test]
    fn tone_indicators_dedupe() {
        let lines = ["Agent: Baka! It's not like I care", "Agent: I'm so embarrassed", "Agent: idiot"];
        assert_eq!(
            tone_indicators(lines),
            vec!["tsundere personality", "emotional responses"]
        );
        assert!(tone_indicators(["Agent: the door opens"]).is_empty());
    }
}
