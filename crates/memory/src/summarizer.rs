//! Extractive summaries of conversation transcripts.
//!
//! Transcripts are line-oriented with `User:` and `Agent:` prefixes. The
//! summary keeps the tail of each side plus whatever persona signals appear,
//! so persona survives into archived chunks.

use agentmesh_core::persona::{extract_persona, tone_indicators};

/// Longest fragment kept from any single line.
pub const MAX_FRAGMENT_CHARS: usize = 100;
const USER_LINES: usize = 3;
const AGENT_LINES: usize = 2;
const PART_SEPARATOR: &str = " | ";

fn truncate(text: &str) -> String {
    text.trim().chars().take(MAX_FRAGMENT_CHARS).collect()
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Build the summary of a transcript.
///
/// Parts, in order, joined by `" | "`:
/// - `User discussed: ` the last 3 user lines
/// - `Persona: ` persona-lexicon lines from the whole transcript
/// - `Agent showed: ` tone indicators found in agent lines
/// - `Agent responses: ` the last 2 agent lines
///
/// A transcript with none of these is summarized as its own first 100 chars.
pub fn summarize(transcript: &str) -> String {
    let user: Vec<&str> = transcript
        .lines()
        .filter_map(|l| l.trim_start().strip_prefix("User:"))
        .collect();
    let agent: Vec<&str> = transcript
        .lines()
        .filter_map(|l| l.trim_start().strip_prefix("Agent:"))
        .collect();

    let mut parts = Vec::new();

    if !user.is_empty() {
        let recent: Vec<String> = tail(&user, USER_LINES).iter().map(|l| truncate(l)).collect();
        parts.push(format!("User discussed: {}", recent.join("; ")));
    }

    let persona = extract_persona(transcript);
    if !persona.is_empty() {
        let lines: Vec<String> = persona.lines().map(truncate).collect();
        parts.push(format!("Persona: {}", lines.join("; ")));
    }

    if !agent.is_empty() {
        let tones = tone_indicators(agent.iter().copied());
        if !tones.is_empty() {
            parts.push(format!("Agent showed: {}", tones.join(", ")));
        }
        let recent: Vec<String> = tail(&agent, AGENT_LINES).iter().map(|l| truncate(l)).collect();
        parts.push(format!("Agent responses: {}", recent.join("; ")));
    }

    if parts.is_empty() {
        return truncate(transcript);
    }
    parts.join(PART_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_three_user_and_two_agent_lines() {
        let transcript = "User: one\nAgent: a\nUser: two\nAgent: b\nUser: three\nAgent: c\nUser: four";
        let summary = summarize(transcript);
        assert_eq!(
            summary,
            "User discussed: two; three; four | Agent responses: b; c"
        );
    }

    #[test]
    fn fragments_are_truncated() {
        let long = "x".repeat(250);
        let summary = summarize(&format!("User: {long}"));
        assert_eq!(summary, format!("User discussed: {}", "x".repeat(100)));
    }

    #[test]
    fn persona_and_tone_are_captured() {
        let transcript = "User: what is your personality?\nAgent: Baka! It's not like I like you.\nAgent: I'm not embarrassed!";
        let summary = summarize(transcript);
        assert!(summary.contains("User discussed: what is your personality?"));
        assert!(summary.contains("Persona: User: what is your personality?"));
        assert!(summary.contains("Agent showed: tsundere personality, emotional responses"));
        assert!(summary.ends_with("Agent responses: Baka! It's not like I like you.; I'm not embarrassed!"));
    }

    #[test]
    fn unstructured_text_falls_back_to_prefix() {
        assert_eq!(
            summarize("Session abc conversation history with 8001 tokens"),
            "Session abc conversation history with 8001 tokens"
        );
    }
}
