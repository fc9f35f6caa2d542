//! Deterministic intent routing ahead of the model.
//!
//! Each [`FastPathRule`] maps an utterance to one tool invocation. The first
//! rule whose pattern matches and whose observation it accepts answers the
//! user directly. A rejected observation falls through to the next rule and
//! finally to the reasoning loop.

use localecho_core::session::SessionContext;
use localecho_core::tool::{ArgValue, Observation, ToolInvocation, ToolRegistry};
use regex_lite::Regex;
use tracing::{debug, warn};

type Router = Box<dyn Fn(&str) -> Option<ToolInvocation> + Send + Sync>;
type Acceptor = fn(&str, &Observation) -> bool;

pub struct FastPathRule {
    name: &'static str,
    route: Router,
    accept: Acceptor,
}

impl FastPathRule {
    pub fn new(
        name: &'static str,
        route: impl Fn(&str) -> Option<ToolInvocation> + Send + Sync + 'static,
        accept: Acceptor,
    ) -> Self {
        Self {
            name,
            route: Box::new(route),
            accept,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The invocation this rule would make for `text`, if any.
    pub fn route(&self, text: &str) -> Option<ToolInvocation> {
        (self.route)(text)
    }
}

/// A fast-path answer.
#[derive(Debug, Clone)]
pub struct FastPathHit {
    pub rule: &'static str,
    pub observation: Observation,
}

/// Ordered fast-path rules.
pub struct FastPathTable {
    rules: Vec<FastPathRule>,
}

impl Default for FastPathTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl FastPathTable {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rules, highest priority first.
    pub fn standard() -> Self {
        let rules = [
            list_tasks_rule(),
            task_action_rule(),
            remember_rule(),
            who_active_rule(),
            calendar_rule(),
            news_rule(),
            recall_rule(),
        ];
        Self {
            rules: rules.into_iter().flatten().collect(),
        }
    }

    pub fn with_rule(mut self, rule: FastPathRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule and its invocation, without running anything.
    pub fn route(&self, text: &str) -> Option<(&'static str, ToolInvocation)> {
        let text = normalize(text);
        self.rules
            .iter()
            .find_map(|rule| rule.route(&text).map(|call| (rule.name, call)))
    }

    /// Run matching rules in order until one produces an acceptable answer.
    /// Rules whose tool is not registered are skipped.
    pub async fn try_handle(
        &self,
        text: &str,
        tools: &ToolRegistry,
        session: &mut SessionContext,
    ) -> Option<FastPathHit> {
        let text = normalize(text);
        for rule in &self.rules {
            let Some(call) = rule.route(&text) else {
                continue;
            };
            if tools.get(&call.name).is_none() {
                continue;
            }

            let observation = tools.execute(&call, session).await;
            if (rule.accept)(&text, &observation) {
                debug!(rule = rule.name, tool = %call.name, "Fast path answered");
                return Some(FastPathHit {
                    rule: rule.name,
                    observation,
                });
            }
            debug!(rule = rule.name, tool = %call.name, "Fast path fell through");
        }
        None
    }
}

fn normalize(text: &str) -> String {
    text.trim().replace(['\u{2018}', '\u{2019}'], "'")
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "Fast-path pattern rejected, rule disabled");
            None
        }
    }
}

fn always(_text: &str, _obs: &Observation) -> bool {
    true
}

fn not_error(_text: &str, obs: &Observation) -> bool {
    !obs.is_error
}

fn list_tasks_rule() -> Option<FastPathRule> {
    let re = compile(r"(?i)\b(show|list|get|what are|what do|what's) (my )?(tasks|task list|todo|to-do)\b")?;
    Some(FastPathRule::new(
        "list_tasks",
        move |text| re.is_match(text).then(|| ToolInvocation::new("list_tasks")),
        always,
    ))
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

fn task_action_rule() -> Option<FastPathRule> {
    let complete = compile(r"(?i)\b(complete|finish|done|mark done)\s+task\s+(.+)")?;
    let delete = compile(r"(?i)\b(delete|remove|clear)\s+task\s+(.+)")?;
    Some(FastPathRule::new(
        "task_action",
        move |text| {
            let (caps, by_id, by_description) = if let Some(caps) = complete.captures(text) {
                (caps, "complete_task", "complete_task_by_description")
            } else {
                (delete.captures(text)?, "delete_task", "delete_task_by_description")
            };
            let target = strip_quotes(caps.get(2)?.as_str());
            if target.is_empty() {
                return None;
            }
            let id = target
                .trim_start_matches('#')
                .trim_end_matches(['.', '!'])
                .parse::<i64>();
            Some(match id {
                Ok(id) => ToolInvocation::new(by_id).arg(id),
                Err(_) => ToolInvocation::new(by_description).arg(target),
            })
        },
        |_text, obs| !obs.text.starts_with("Error"),
    ))
}

fn remember_rule() -> Option<FastPathRule> {
    let re = compile(r"(?is)^(?:please\s+)?remember\s+(?:that\s+)?(.+)$")?;
    Some(FastPathRule::new(
        "remember",
        move |text| {
            if text.ends_with('?') {
                return None;
            }
            let content = re.captures(text)?.get(1)?.as_str().trim();
            let content = content.trim_end_matches('.').trim();
            (!content.is_empty()).then(|| ToolInvocation::new("save_note").arg(content))
        },
        not_error,
    ))
}

fn who_active_rule() -> Option<FastPathRule> {
    let re = compile(
        r"(?i)\b(who is working|who's working|who is on shift|who's on shift|is anyone working|who is available|who's available|coverage|who is here|who's here)\b",
    )?;
    Some(FastPathRule::new(
        "who_active",
        move |text| re.is_match(text).then(|| ToolInvocation::new("check_entity_status")),
        |_text, obs| !obs.is_error && !obs.text.contains('❌'),
    ))
}

fn calendar_rule() -> Option<FastPathRule> {
    let list_calendars = compile(r"(?i)\b(list|show)\s+(my\s+)?calendars\b")?;
    let list_shifts = compile(r"(?i)list shifts.*calendar\s+([\w-]+)(?:.*?(\d{4}-\d{2}-\d{2}))?")?;
    let create_shift = compile(
        r"(?i)(?:create|add).*shift.*calendar\s+([\w-]+).*?(?:titled|title)\s+(.+?)\s+on\s+(\d{4}-\d{2}-\d{2})(?:.*?from\s+(\d{2}:\d{2})\s+to\s+(\d{2}:\d{2}))?",
    )?;
    Some(FastPathRule::new(
        "calendar",
        move |text| {
            if list_calendars.is_match(text) {
                return Some(ToolInvocation::new("list_calendars"));
            }
            if let Some(caps) = create_shift.captures(text) {
                let mut call = ToolInvocation::new("create_shift")
                    .arg(caps.get(1)?.as_str())
                    .arg(strip_quotes(caps.get(2)?.as_str()))
                    .arg(caps.get(3)?.as_str());
                if let (Some(start), Some(end)) = (caps.get(4), caps.get(5)) {
                    call = call.arg(start.as_str()).arg(end.as_str());
                }
                return Some(call);
            }
            let caps = list_shifts.captures(text)?;
            let mut call = ToolInvocation::new("list_shifts").arg(caps.get(1)?.as_str());
            if let Some(date) = caps.get(2) {
                call = call.arg(date.as_str());
            }
            Some(call)
        },
        not_error,
    ))
}

fn news_rule() -> Option<FastPathRule> {
    let trigger = compile(r"(?i)\b(news|headlines|daily news|latest news)\b")?;
    let topic = compile(r"(?i)news\s+(?:about|on|regarding)?\s*(.+)$")?;
    Some(FastPathRule::new(
        "news",
        move |text| {
            if !trigger.is_match(text) {
                return None;
            }
            let topic = topic
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().trim_end_matches(['?', '.', '!']).trim())
                .filter(|t| !t.is_empty())
                .filter(|t| !matches!(t.to_lowercase().as_str(), "today" | "latest"));
            let call = ToolInvocation::new("get_news");
            Some(match topic {
                Some(topic) => call.arg(topic),
                None => call.arg(ArgValue::None),
            })
        },
        not_error,
    ))
}

const RECALL_LEADS: [&str; 15] = [
    "what did i tell you about",
    "what did i tell you",
    "do you remember",
    "what's my",
    "what is my",
    "what was my",
    "what was",
    "tell me my",
    "remind me of",
    "remind me",
    "when is",
    "where is",
    "recall",
    "what's",
    "what is",
];

const STOPWORDS: [&str; 8] = ["the", "and", "for", "you", "are", "was", "what", "about"];

/// The utterance with its recall phrase and punctuation removed.
pub fn recall_key_phrase(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut phrase = lowered.as_str();
    for lead in RECALL_LEADS {
        if let Some(rest) = phrase.strip_prefix(lead) {
            phrase = rest;
            break;
        }
    }
    let phrase = phrase.trim().trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    if phrase.is_empty() {
        lowered.trim_end_matches('?').to_string()
    } else {
        phrase.to_string()
    }
}

/// A recall answer is only returned when some note shares a word with the question.
fn recall_relevant(text: &str, obs: &Observation) -> bool {
    if obs.is_error || !obs.text.starts_with("Found") {
        return false;
    }
    let notes = obs
        .text
        .split_once('\n')
        .map(|(_, rest)| rest.to_lowercase())
        .unwrap_or_default();
    recall_key_phrase(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .any(|w| notes.contains(w))
}

fn recall_rule() -> Option<FastPathRule> {
    let phrases = compile(
        r"(?i)\b(what's my|what is my|what was|tell me my|remind me|do you remember|what did i tell you|recall|when is|where is)\b",
    )?;
    Some(FastPathRule::new(
        "recall",
        move |text| {
            let lowered = text.to_lowercase();
            let possessive = lowered.contains("'s")
                && ["what", "where", "when", "who", "which"]
                    .iter()
                    .any(|w| lowered.contains(w));
            if !(phrases.is_match(text) || possessive) {
                return None;
            }
            Some(ToolInvocation::new("recall_notes").arg(recall_key_phrase(text)))
        },
        recall_relevant,
    ))
}
