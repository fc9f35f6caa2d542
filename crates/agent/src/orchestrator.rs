//! The orchestration loop — one user utterance in, one answer out.
//!
//! 1. **Fast path**: deterministic intent rules answer common requests
//!    directly through a tool, without the model.
//! 2. **Readiness**: wait briefly for a chat model that is mid-swap.
//! 3. **Reasoning loop**: prompt the model, run the first `Tool:` call it
//!    makes, feed the observation back, and repeat up to `max_turns` times.
//! 4. **Persist**: the utterance and answer are appended to the session and
//!    the chat log.
//!
//! Every failure along the way becomes answer text; the loop never returns
//! an error to its caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use localecho_config::{AgentSettings, AppConfig, InferenceConfig, UserProfile};
use localecho_core::error::LifecycleError;
use localecho_core::event::{DomainEvent, EventBus};
use localecho_core::lifecycle::{ModelKind, ModelLifecycle};
use localecho_core::message::{Message, Role};
use localecho_core::provider::{Provider, ProviderRequest};
use localecho_core::session::SessionContext;
use localecho_core::store::ChatLog;
use localecho_core::tool::{Observation, ToolInvocation, ToolRegistry};
use localecho_tools::truncate_lines;
use tracing::{debug, info, warn};

use crate::fast_path::FastPathTable;
use crate::parser::{ParsedOutput, final_answer, parse_output, text_before_call};
use crate::prompt::{context_block, history_messages, system_prompt};

pub const EMPTY_INPUT_MESSAGE: &str = "I didn't catch that. Could you say it again?";
pub const UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, my language service is unavailable right now. Please try again in a moment.";
pub const BUSY_MESSAGE: &str =
    "My language model is switching right now. Please try again in a few seconds.";
pub const TIMEOUT_MESSAGE: &str =
    "I'm sorry, that took longer than I'm allowed to think. Please try a simpler request.";
pub const EXHAUSTED_MESSAGE: &str = "I wasn't able to finish that within my reasoning budget.";
const EMPTY_ANSWER_MESSAGE: &str = "I'm not sure how to answer that.";

/// Drives one conversation turn against the model, tools and chat log.
pub struct Orchestrator {
    /// Chat completion backend.
    provider: Arc<dyn Provider>,
    /// The closed tool set; also the source of the prompt schema.
    tools: Arc<ToolRegistry>,
    /// Durable chat history.
    chat_log: Arc<dyn ChatLog>,
    /// Optional lifecycle manager consulted before reasoning.
    lifecycle: Option<Arc<dyn ModelLifecycle>>,
    /// Deterministic intent rules tried before the model.
    fast_paths: FastPathTable,
    /// Loop bounds and truncation limits.
    settings: AgentSettings,
    /// Model identifier passed to the backend.
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    stop: Vec<String>,
    /// Standing facts about the user.
    profile: UserProfile,
    /// How long to wait for a swapping chat model.
    busy_wait: Duration,
    /// Event bus for domain events.
    events: Option<Arc<EventBus>>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        chat_log: Arc<dyn ChatLog>,
    ) -> Self {
        let inference = InferenceConfig::default();
        Self {
            provider,
            tools,
            chat_log,
            lifecycle: None,
            fast_paths: FastPathTable::standard(),
            settings: AgentSettings::default(),
            model: inference.model,
            temperature: inference.temperature,
            max_tokens: Some(inference.max_tokens),
            stop: inference.stop,
            profile: UserProfile::default(),
            busy_wait: Duration::from_secs(5),
            events: None,
        }
    }

    /// Wire every setting from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        chat_log: Arc<dyn ChatLog>,
    ) -> Self {
        Self::new(provider, tools, chat_log)
            .with_settings(config.agent.clone())
            .with_inference(&config.inference)
            .with_profile(config.profile.clone())
            .with_busy_wait(Duration::from_secs(config.models.busy_wait_secs))
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_inference(mut self, inference: &InferenceConfig) -> Self {
        self.model = inference.model.clone();
        self.temperature = inference.temperature;
        self.max_tokens = Some(inference.max_tokens);
        self.stop = inference.stop.clone();
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ModelLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_busy_wait(mut self, busy_wait: Duration) -> Self {
        self.busy_wait = busy_wait;
        self
    }

    pub fn with_fast_paths(mut self, fast_paths: FastPathTable) -> Self {
        self.fast_paths = fast_paths;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer one utterance. Never fails: errors become answer text.
    pub async fn process_input(&self, session: &mut SessionContext, user_text: &str) -> String {
        let text = user_text.trim();
        if text.is_empty() {
            return EMPTY_INPUT_MESSAGE.into();
        }

        info!(session = %session.session_id(), chars = text.chars().count(), "Processing input");
        self.publish(DomainEvent::MessageReceived {
            session_id: session.session_id().to_string(),
            content_preview: text.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let (answer, fast_path, turns) =
            match self.fast_paths.try_handle(text, &self.tools, session).await {
                Some(hit) => {
                    self.tool_executed(&hit.observation);
                    (hit.observation.text, Some(hit.rule.to_string()), 0)
                }
                None => {
                    let (answer, turns) = self.reason(session, text).await;
                    (answer, None, turns)
                }
            };

        self.record_exchange(session, text, &answer).await;
        self.publish(DomainEvent::ResponseGenerated {
            session_id: session.session_id().to_string(),
            fast_path,
            turns,
            timestamp: Utc::now(),
        });
        answer
    }

    async fn reason(&self, session: &mut SessionContext, text: &str) -> (String, usize) {
        if let Some(lifecycle) = &self.lifecycle {
            if let Err(e) = lifecycle.wait_ready(ModelKind::Chat, self.busy_wait).await {
                warn!(error = %e, "Chat model not ready");
                self.error_occurred("model_readiness", &e.to_string());
                let message = match e {
                    LifecycleError::Busy { .. } => BUSY_MESSAGE.to_string(),
                    other => format!("My language model isn't available right now ({other})."),
                };
                return (message, 0);
            }
        }

        let budget = Duration::from_secs(self.settings.turn_budget_secs);
        let mut progress = Progress::default();
        let outcome = tokio::time::timeout(budget, self.run_loop(session, text, &mut progress)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    budget_secs = self.settings.turn_budget_secs,
                    turns = progress.turns,
                    "Reasoning loop timed out"
                );
                self.error_occurred("reasoning_loop", "turn budget exceeded");
                (best_effort(&progress.last_text, TIMEOUT_MESSAGE), progress.turns)
            }
        }
    }

    async fn build_prompt(&self, session: &mut SessionContext, text: &str) -> Vec<Message> {
        let history = history_messages(session.history(), &self.settings);

        let recalled = if self.tools.get("recall_notes").is_some() {
            let call = ToolInvocation::new("recall_notes").arg(text);
            let observation = self.tools.execute(&call, session).await;
            (!observation.is_error && observation.text.starts_with("Found")).then_some(observation.text)
        } else {
            None
        };

        let context = context_block(&self.profile, recalled.as_deref(), &self.settings);
        let system = system_prompt(&self.tools.render_schema(), &context, Local::now());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(history);
        messages.push(Message::user(text));
        messages
    }

    async fn run_loop(
        &self,
        session: &mut SessionContext,
        text: &str,
        progress: &mut Progress,
    ) -> (String, usize) {
        let mut messages = self.build_prompt(session, text).await;

        for turn in 1..=self.settings.max_turns {
            progress.turns = turn;
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stop: self.stop.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn, provider = self.provider.name(), error = %e, "Completion failed");
                    self.error_occurred("inference", &e.to_string());
                    return (UNAVAILABLE_MESSAGE.into(), turn);
                }
            };
            debug!(
                turn,
                model = %response.model,
                stop_reason = ?response.stop_reason,
                usage = ?response.usage,
                "Model turn complete"
            );

            match parse_output(&response.content) {
                ParsedOutput::ToolCall(call) => {
                    info!(turn, tool = %call.name, "Model requested tool");
                    let observation = self.tools.execute(&call, session).await;
                    self.tool_executed(&observation);
                    let observed = truncate_lines(&observation.text, self.settings.max_context_lines);
                    messages.push(Message::assistant(response.content.trim()));
                    messages.push(Message::observation(&observed));
                }
                ParsedOutput::Malformed { reason } => {
                    warn!(turn, %reason, "Malformed tool call");
                    messages.push(Message::assistant(response.content.trim()));
                    messages.push(Message::observation(&format!(
                        "Error: {reason}. Write the call as Tool: tool_name(\"argument\")."
                    )));
                }
                ParsedOutput::PlainText(content) => {
                    let answer = final_answer(&content);
                    debug!(turn, "Final answer");
                    if answer.is_empty() {
                        return (EMPTY_ANSWER_MESSAGE.into(), turn);
                    }
                    return (answer, turn);
                }
            }
            progress.last_text = response.content;
        }

        warn!(max_turns = self.settings.max_turns, "Turn limit reached without an answer");
        (
            best_effort(&progress.last_text, EXHAUSTED_MESSAGE),
            self.settings.max_turns,
        )
    }

    async fn record_exchange(&self, session: &mut SessionContext, text: &str, answer: &str) {
        session.push(Role::User, text);
        session.push(Role::Assistant, answer);

        let session_id = session.session_id();
        for (role, content) in [(Role::User, text), (Role::Assistant, answer)] {
            if let Err(e) = self.chat_log.append_turn(session_id, role, content).await {
                warn!(session = %session_id, role = %role, error = %e, "Failed to persist chat turn");
            }
        }
    }

    fn tool_executed(&self, observation: &Observation) {
        self.publish(DomainEvent::ToolExecuted {
            tool_name: observation.tool.clone(),
            success: !observation.is_error,
            duration_ms: observation.duration_ms,
            timestamp: Utc::now(),
        });
    }

    fn error_occurred(&self, context: &str, message: &str) {
        self.publish(DomainEvent::ErrorOccurred {
            context: context.into(),
            error_message: message.into(),
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// What the reasoning loop has produced so far, readable after a timeout.
#[derive(Debug, Default)]
struct Progress {
    turns: usize,
    last_text: String,
}

/// The model's last words before its pending tool call, else `fallback`.
fn best_effort(last_text: &str, fallback: &str) -> String {
    let partial = text_before_call(last_text);
    if partial.is_empty() {
        fallback.to_string()
    } else {
        final_answer(partial)
    }
}
