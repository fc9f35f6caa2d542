//! User profile — standing facts about the user injected into every prompt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,

    #[serde(default)]
    pub team: Vec<String>,

    #[serde(default)]
    pub tech_ecosystem: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,

    #[serde(default)]
    pub memory_support: bool,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.format_for_prompt().is_empty()
    }

    /// One line per known fact, empty when nothing is known.
    pub fn format_for_prompt(&self) -> String {
        let mut parts = Vec::new();

        if let Some(name) = &self.name {
            parts.push(format!("User's name: {name}"));
        }
        if let Some(location) = &self.location {
            parts.push(format!("User's location: {location}"));
        }
        if let Some(profession) = &self.profession {
            parts.push(format!("User's profession: {profession}"));
        }
        if !self.team.is_empty() {
            let team = if self.team.len() <= 2 {
                self.team.join(" and ")
            } else {
                self.team.join(", ")
            };
            parts.push(format!(
                "User's team/colleagues: {team}. When user mentions 'the guys' or 'the team', they mean these people."
            ));
        }
        if !self.tech_ecosystem.is_empty() {
            parts.push(format!(
                "User's tech: {}. Provide platform-specific answers when relevant.",
                self.tech_ecosystem.join(", ")
            ));
        }
        if let Some(style) = &self.communication_style {
            parts.push(format!(
                "Communication preference: {style}. Match this style in responses."
            ));
        }
        if self.memory_support {
            parts.push(
                "User appreciates reminders and memory support. Proactively recall relevant past information."
                    .into(),
            );
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_formats_to_nothing() {
        assert!(UserProfile::default().is_empty());
    }

    #[test]
    fn team_of_two_joins_with_and() {
        let profile = UserProfile {
            name: Some("Sam".into()),
            team: vec!["Dom".into(), "Marley".into()],
            ..Default::default()
        };
        let text = profile.format_for_prompt();
        assert!(text.starts_with("User's name: Sam"));
        assert!(text.contains("Dom and Marley"));
    }

    #[test]
    fn larger_team_joins_with_commas() {
        let profile = UserProfile {
            team: vec!["A".into(), "B".into(), "C".into()],
            memory_support: true,
            ..Default::default()
        };
        let text = profile.format_for_prompt();
        assert!(text.contains("A, B, C"));
        assert!(text.contains("memory support"));
    }
}
