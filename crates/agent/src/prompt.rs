//! Prompt assembly: system instruction, context block and bounded history.

use chrono::{DateTime, Local};
use localecho_config::{AgentSettings, UserProfile};
use localecho_core::message::{ChatTurn, Message, Role};
use localecho_tools::{truncate_chars, truncate_lines};

pub const HISTORY_TRUNCATION_MARKER: &str = "\n[... content truncated ...]";

/// The fixed instruction, tool schema and current time.
pub fn system_prompt(schema: &str, context: &str, now: DateTime<Local>) -> String {
    let mut prompt = String::from("You are Echo, a private AI assistant running on this machine.\n");
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str("\nAVAILABLE TOOLS:\n");
    prompt.push_str(schema);
    prompt.push_str(
        "\nFORMAT:\n\
         To use a tool, reply with one line and nothing after it:\n\
         Tool: tool_name(\"argument\")\n\
         You will then receive an Observation with the result.\n\
         When you can reply to the user, write:\n\
         Answer: your reply\n\
         \n\
         IMPORTANT:\n\
         - Use tools for tasks, notes, calendars and news. Never invent their contents.\n\
         - When the user shares something worth keeping, save it with save_note.\n\
         - When the user asks about something they told you before, use recall_notes.\n\
         - Call at most one tool per reply.\n\
         - Keep answers short and direct.\n",
    );
    prompt.push_str(&format!(
        "\nCurrent date and time: {}\n",
        now.format("%A, %B %-d, %Y %-I:%M %p")
    ));
    prompt
}

/// Profile facts and recalled notes, each capped.
pub fn context_block(profile: &UserProfile, recalled: Option<&str>, settings: &AgentSettings) -> String {
    let cap = |text: &str| {
        truncate_lines(
            &truncate_chars(text, settings.context_block_chars),
            settings.max_context_lines,
        )
    };

    let mut sections = Vec::new();
    let profile = profile.format_for_prompt();
    if !profile.is_empty() {
        sections.push(format!("USER PROFILE:\n{}", cap(&profile)));
    }
    if let Some(recalled) = recalled.filter(|r| !r.trim().is_empty()) {
        sections.push(format!("CONTEXT FROM MEMORY:\n{}", cap(recalled)));
    }
    sections.join("\n\n")
}

/// Cut an oversized turn to its first `keep` characters plus a marker.
pub fn truncate_turn(content: &str, limit: usize, keep: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let kept: String = content.chars().take(keep).collect();
    format!("{kept}{HISTORY_TRUNCATION_MARKER}")
}

/// The last `history_turns` user/assistant turns as prompt messages.
pub fn history_messages(turns: &[ChatTurn], settings: &AgentSettings) -> Vec<Message> {
    let relevant: Vec<&ChatTurn> = turns
        .iter()
        .filter(|t| matches!(t.role, Role::User | Role::Assistant))
        .collect();
    let start = relevant.len().saturating_sub(settings.history_turns);
    relevant[start..]
        .iter()
        .map(|turn| Message {
            role: turn.role,
            content: truncate_turn(
                &turn.content,
                settings.history_char_limit,
                settings.history_keep_chars,
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_prompt_carries_schema_and_time() {
        let now = Local.with_ymd_and_hms(2026, 3, 2, 14, 5, 0).unwrap();
        let prompt = system_prompt("\n1. **list_tasks()**\n   - List tasks.\n", "", now);
        assert!(prompt.starts_with("You are Echo"));
        assert!(prompt.contains("**list_tasks()**"));
        assert!(prompt.contains("Tool: tool_name(\"argument\")"));
        assert!(prompt.contains("Answer: your reply"));
        assert!(prompt.contains("Current date and time: Monday, March 2, 2026 2:05 PM"));
    }

    #[test]
    fn context_block_caps_each_section() {
        let settings = AgentSettings {
            context_block_chars: 40,
            max_context_lines: 2,
            ..AgentSettings::default()
        };
        let profile = UserProfile {
            name: Some("Dana".into()),
            ..UserProfile::default()
        };
        let recalled = "Found 3 note(s):\n- one\n- two\n- three";
        let block = context_block(&profile, Some(recalled), &settings);

        assert!(block.starts_with("USER PROFILE:\nUser's name: Dana"));
        assert!(block.contains("CONTEXT FROM MEMORY:\nFound 3 note(s):\n- one\n\n[... 2 more lines truncated ...]"));
        assert_eq!(context_block(&UserProfile::default(), None, &settings), "");
    }

    #[test]
    fn long_turns_are_cut_with_marker() {
        let long = "x".repeat(2500);
        let cut = truncate_turn(&long, 2000, 1500);
        assert_eq!(cut.len(), 1500 + HISTORY_TRUNCATION_MARKER.len());
        assert!(cut.ends_with("[... content truncated ...]"));
        assert_eq!(truncate_turn("short", 2000, 1500), "short");
    }

    #[test]
    fn history_keeps_last_turns_without_system() {
        let settings = AgentSettings {
            history_turns: 2,
            ..AgentSettings::default()
        };
        let turns = vec![
            ChatTurn::new("s", Role::User, "first"),
            ChatTurn::new("s", Role::Assistant, "second"),
            ChatTurn::new("s", Role::System, "ignored"),
            ChatTurn::new("s", Role::User, "third"),
        ];
        let messages = history_messages(&turns, &settings);
        assert_eq!(
            messages,
            vec![Message::assistant("second"), Message::user("third")]
        );
    }
}
