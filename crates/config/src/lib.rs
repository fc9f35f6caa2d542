//! Configuration loading, validation, and management for localecho.
//!
//! Loads configuration from `~/.localecho/config.toml` (or `$LOCALECHO_HOME`)
//! with environment variable overrides. Validates all settings at startup.

pub mod profile;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use profile::UserProfile;

/// The root configuration structure.
///
/// Maps directly to `~/.localecho/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The single persistent conversation
    #[serde(default = "default_session_id")]
    pub session_id: String,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub news: NewsConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub profile: UserProfile,

    /// Directory relative paths resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_session_id() -> String {
    "echo_main".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("session_id", &self.session_id)
            .field("inference", &self.inference)
            .field("embedding", &self.embedding)
            .field("models", &self.models)
            .field("agent", &self.agent)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("news", &self.news)
            .field("calendar", &self.calendar)
            .field("web", &self.web)
            .field("profile", &self.profile)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// OpenAI-compatible base URL of the local inference server
    #[serde(default = "default_inference_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_stop")]
    pub stop: Vec<String>,

    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

fn default_inference_url() -> String {
    "http://127.0.0.1:1234/v1".into()
}
fn default_model() -> String {
    "local".into()
}
fn default_max_tokens() -> u32 {
    600
}
fn default_temperature() -> f32 {
    0.1
}
fn default_stop() -> Vec<String> {
    vec!["Observation:".into()]
}
fn default_inference_timeout() -> u64 {
    120
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_url(),
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop: default_stop(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("stop", &self.stop)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Falls back to the inference URL when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".into()
}
fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_chat_dirs")]
    pub chat_dirs: Vec<String>,

    #[serde(default = "default_embed_dirs")]
    pub embed_dirs: Vec<String>,

    /// Last-resort chat model for swap fallback
    #[serde(default = "default_chat_model")]
    pub default_chat: String,

    #[serde(default = "default_embed_model")]
    pub default_embed: String,

    /// JSON file persisting the selected models across restarts
    #[serde(default = "default_selection_file")]
    pub selection_file: String,

    /// How long a chat request waits for an in-flight swap
    #[serde(default = "default_busy_wait")]
    pub busy_wait_secs: u64,

    /// Supervised inference server process (sleep/wake)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerCommand>,
}

fn default_chat_dirs() -> Vec<String> {
    vec!["models/chat".into()]
}
fn default_embed_dirs() -> Vec<String> {
    vec!["models/embeddings".into()]
}
fn default_chat_model() -> String {
    "models/chat/Llama-3.2-3B-Instruct-4bit".into()
}
fn default_embed_model() -> String {
    "models/embeddings/all-MiniLM-L6-v2-bf16".into()
}
fn default_selection_file() -> String {
    "user_config.json".into()
}
fn default_busy_wait() -> u64 {
    5
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat_dirs: default_chat_dirs(),
            embed_dirs: default_embed_dirs(),
            default_chat: default_chat_model(),
            default_embed: default_embed_model(),
            selection_file: default_selection_file(),
            busy_wait_secs: default_busy_wait(),
            server: None,
        }
    }
}

/// How to launch the inference server. `program` must be an absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Turns longer than this are cut before entering the prompt
    #[serde(default = "default_history_char_limit")]
    pub history_char_limit: usize,

    /// How much of an over-long turn is kept
    #[serde(default = "default_history_keep_chars")]
    pub history_keep_chars: usize,

    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: usize,

    /// Cap per context block (profile, recalled notes)
    #[serde(default = "default_context_block_chars")]
    pub context_block_chars: usize,

    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,

    /// Wall-clock budget for one reasoning loop
    #[serde(default = "default_turn_budget")]
    pub turn_budget_secs: u64,
}

fn default_max_turns() -> usize {
    6
}
fn default_history_turns() -> usize {
    10
}
fn default_history_char_limit() -> usize {
    2000
}
fn default_history_keep_chars() -> usize {
    1500
}
fn default_max_context_lines() -> usize {
    50
}
fn default_context_block_chars() -> usize {
    1200
}
fn default_recall_top_k() -> usize {
    2
}
fn default_turn_budget() -> u64 {
    300
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_turns: default_history_turns(),
            history_char_limit: default_history_char_limit(),
            history_keep_chars: default_history_keep_chars(),
            max_context_lines: default_max_context_lines(),
            context_block_chars: default_context_block_chars(),
            recall_top_k: default_recall_top_k(),
            turn_budget_secs: default_turn_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

fn default_db_path() -> String {
    "echo.db".into()
}
fn default_archive_dir() -> String {
    "archives".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            archive_dir: default_archive_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8008
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// RSS search URL; `{query}` is replaced by the encoded search terms
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_news_domains")]
    pub domains: Vec<String>,

    #[serde(default = "default_limit_per_source")]
    pub limit_per_source: usize,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_news_timeout")]
    pub timeout_secs: u64,
}

fn default_feed_url() -> String {
    "https://news.google.com/rss/search?q={query}&hl=fr&gl=MU&ceid=MU:fr".into()
}
fn default_news_domains() -> Vec<String> {
    vec![
        "lexpress.mu".into(),
        "defimedia.info".into(),
        "lemauricien.com".into(),
        "ionnews.mu".into(),
    ]
}
fn default_limit_per_source() -> usize {
    3
}
fn default_max_items() -> usize {
    15
}
fn default_cache_ttl() -> u64 {
    900
}
fn default_news_timeout() -> u64 {
    10
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            domains: default_news_domains(),
            limit_per_source: default_limit_per_source(),
            max_items: default_max_items(),
            cache_ttl_secs: default_cache_ttl(),
            timeout_secs: default_news_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_url")]
    pub base_url: String,

    /// Sent as `X-API-Key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_calendar_timeout")]
    pub timeout_secs: u64,
}

fn default_calendar_url() -> String {
    "http://127.0.0.1:3000".into()
}
fn default_calendar_timeout() -> u64 {
    20
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: default_calendar_url(),
            api_key: None,
            timeout_secs: default_calendar_timeout(),
        }
    }
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// HTML search page used when `browse_web` gets a query instead of a URL
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_web_max_chars")]
    pub max_chars: usize,
}

fn default_search_url() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_web_timeout() -> u64 {
    15
}
fn default_web_max_chars() -> usize {
    6000
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            timeout_secs: default_web_timeout(),
            max_chars: default_web_max_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_dir);

        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self {
                base_dir,
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.base_dir = base_dir;

        config.validate()?;
        Ok(config)
    }

    /// `$LOCALECHO_HOME`, or `~/.localecho`.
    pub fn config_dir() -> PathBuf {
        std::env::var("LOCALECHO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_home().join(".localecho"))
    }

    /// Apply `LOCALECHO_*` overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LOCALECHO_INFERENCE_URL") {
            self.inference.base_url = url;
        }
        if let Some(url) = lookup("LOCALECHO_EMBEDDING_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(path) = lookup("LOCALECHO_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(port) = lookup("LOCALECHO_GATEWAY_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(url) = lookup("LOCALECHO_CALENDAR_URL") {
            self.calendar.base_url = url;
        }
        if let Some(key) = lookup("LOCALECHO_CALENDAR_API_KEY") {
            self.calendar.api_key = Some(key);
        }
        if let Some(session) = lookup("LOCALECHO_SESSION_ID") {
            self.session_id = session;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(ConfigError::ValidationError(
                "inference.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_turns must be at least 1".into(),
            ));
        }
        if self.agent.history_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_turns must be at least 1".into(),
            ));
        }
        if self.agent.history_keep_chars > self.agent.history_char_limit {
            return Err(ConfigError::ValidationError(
                "agent.history_keep_chars must not exceed agent.history_char_limit".into(),
            ));
        }
        if self.agent.max_context_lines == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_context_lines must be at least 1".into(),
            ));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }
        if self.session_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session_id must not be empty".into(),
            ));
        }
        if let Some(server) = &self.models.server {
            if !Path::new(&server.program).is_absolute() {
                return Err(ConfigError::ValidationError(format!(
                    "models.server.program must be an absolute path, got '{}'",
                    server.program
                )));
            }
        }
        Ok(())
    }

    /// Resolve a configured path: absolute paths pass through, relative
    /// ones are taken relative to the config directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The embedding service URL.
    pub fn embedding_url(&self) -> &str {
        self.embedding
            .base_url
            .as_deref()
            .unwrap_or(&self.inference.base_url)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            inference: InferenceConfig::default(),
            embedding: EmbeddingConfig::default(),
            models: ModelsConfig::default(),
            agent: AgentSettings::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            news: NewsConfig::default(),
            calendar: CalendarConfig::default(),
            web: WebConfig::default(),
            profile: UserProfile::default(),
            base_dir: Self::config_dir(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_id, "echo_main");
        assert_eq!(config.agent.max_turns, 6);
        assert_eq!(config.agent.history_turns, 10);
        assert_eq!(config.inference.max_tokens, 600);
        assert_eq!(config.inference.stop, vec!["Observation:".to_string()]);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.models.default_chat, config.models.default_chat);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.inference.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn keep_chars_cannot_exceed_limit() {
        let mut config = AppConfig::default();
        config.agent.history_keep_chars = 3000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_server_program_rejected() {
        let mut config = AppConfig::default();
        config.models.server = Some(ServerCommand {
            program: "python".into(),
            args: vec!["server.py".into()],
            working_dir: None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));

        config.models.server = Some(ServerCommand {
            program: "/usr/bin/python3".into(),
            args: vec![],
            working_dir: None,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.port, 8008);
        assert_eq!(config.base_dir(), Path::new("/nonexistent"));
    }

    #[test]
    fn partial_file_fills_defaults_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
max_turns = 3

[storage]
db_path = "data/echo.db"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_turns, 3);
        assert_eq!(config.agent.history_turns, 10);
        assert_eq!(
            config.resolve_path(&config.storage.db_path),
            dir.path().join("data/echo.db")
        );
        assert_eq!(config.resolve_path("/abs/x.db"), PathBuf::from("/abs/x.db"));
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "agent = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LOCALECHO_INFERENCE_URL", "http://10.0.0.2:1234/v1"),
            ("LOCALECHO_GATEWAY_PORT", "9000"),
            ("LOCALECHO_CALENDAR_API_KEY", "secret"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.inference.base_url, "http://10.0.0.2:1234/v1");
        assert_eq!(config.embedding_url(), "http://10.0.0.2:1234/v1");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.calendar.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.calendar.api_key = Some("top-secret".into());
        config.inference.api_key = Some("sk-123".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("sk-123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("echo_main"));
        assert!(toml_str.contains("8008"));
        assert!(toml_str.contains("Observation:"));
    }
}
