//! Configuration tree loaded from `voicegate.toml`.
//!
//! Every section and field has a default so a missing file or a partial
//! file still yields a runnable gateway. Secrets are never stored in the
//! file itself — config carries the *names* of environment variables and
//! the values are read once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub pos: PosConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    #[serde(default = "d_bind")]
    pub bind: String,
    /// Allowed CORS origins for the REST surface. Empty = same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: d_bind(),
            cors_origins: Vec::new(),
        }
    }
}

fn d_bind() -> String {
    "0.0.0.0:8080".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Gemini API base URL.
    #[serde(default = "d_llm_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_llm_model")]
    pub model: String,
    /// Wall-clock bound on streaming initiation, in seconds.
    #[serde(default = "d_stream_timeout")]
    pub stream_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_base_url(),
            api_key_env: d_llm_key_env(),
            model: d_llm_model(),
            stream_timeout_secs: d_stream_timeout(),
        }
    }
}

fn d_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn d_llm_key_env() -> String {
    "VG_GEMINI_API_KEY".into()
}

fn d_llm_model() -> String {
    "gemini-2.0-flash".into()
}

fn d_stream_timeout() -> u64 {
    15
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Voice sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// WebSocket path prefix the voice transport connects to.
    #[serde(default = "d_ws_prefix")]
    pub ws_path_prefix: String,
    /// Hidden single-turn prompt that seeds the greeting utterance.
    #[serde(default = "d_greeting_prompt")]
    pub greeting_prompt: String,
    /// Spoken when a response is requested on an empty transcript.
    #[serde(default = "d_nudge_text")]
    pub nudge_text: String,
    /// Spoken after an unexpected provider failure.
    #[serde(default = "d_apology_text")]
    pub apology_text: String,
    /// Outbound frame channel depth per session.
    #[serde(default = "d_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            ws_path_prefix: d_ws_prefix(),
            greeting_prompt: d_greeting_prompt(),
            nudge_text: d_nudge_text(),
            apology_text: d_apology_text(),
            outbound_buffer: d_outbound_buffer(),
        }
    }
}

fn d_ws_prefix() -> String {
    "/voice".into()
}

fn d_greeting_prompt() -> String {
    "A caller just connected. Greet them briefly in your persona's voice \
     and ask how you can help. One or two short sentences."
        .into()
}

fn d_nudge_text() -> String {
    "I'm listening — go ahead whenever you're ready.".into()
}

fn d_apology_text() -> String {
    "I'm sorry, could you please say that again?".into()
}

fn d_outbound_buffer() -> usize {
    64
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding tenants.json, orders.jsonl, reservations.jsonl,
    /// and the pending-jobs file.
    #[serde(default = "d_state_path")]
    pub state_path: std::path::PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

fn d_state_path() -> std::path::PathBuf {
    "./data".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Env var holding the voice transport's webhook signing secret.
    /// Unset = signature verification skipped (dev mode).
    #[serde(default = "d_voice_secret_env")]
    pub voice_secret_env: String,
    /// Env var holding the POS provider's webhook signing secret.
    #[serde(default = "d_pos_secret_env")]
    pub pos_secret_env: String,
    /// How long event ids are remembered for deduplication, in seconds.
    #[serde(default = "d_dedupe_ttl")]
    pub dedupe_ttl_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            voice_secret_env: d_voice_secret_env(),
            pos_secret_env: d_pos_secret_env(),
            dedupe_ttl_secs: d_dedupe_ttl(),
        }
    }
}

fn d_voice_secret_env() -> String {
    "VG_VOICE_WEBHOOK_SECRET".into()
}

fn d_pos_secret_env() -> String {
    "VG_POS_WEBHOOK_SECRET".into()
}

fn d_dedupe_ttl() -> u64 {
    86_400
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Max delivery attempts before a job is parked as dead.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    /// Delay between retries, in seconds.
    #[serde(default = "d_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            retry_delay_secs: d_retry_delay(),
        }
    }
}

fn d_max_attempts() -> u32 {
    5
}

fn d_retry_delay() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POS provider (OAuth bootstrap)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosConfig {
    /// OAuth token endpoint for authorization-code exchange.
    #[serde(default)]
    pub oauth_token_url: String,
    #[serde(default = "d_pos_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "d_pos_client_secret_env")]
    pub client_secret_env: String,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            oauth_token_url: String::new(),
            client_id_env: d_pos_client_id_env(),
            client_secret_env: d_pos_client_secret_env(),
        }
    }
}

fn d_pos_client_id_env() -> String {
    "VG_POS_CLIENT_ID".into()
}

fn d_pos_client_secret_env() -> String {
    "VG_POS_CLIENT_SECRET".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// A single issue found while validating the config.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the loaded configuration. Errors make startup fail;
    /// warnings are logged and tolerated.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.bind".into(),
                message: format!("not a valid socket address: {:?}", self.server.bind),
            });
        }

        if !self.voice.ws_path_prefix.starts_with('/') {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "voice.ws_path_prefix".into(),
                message: "must start with '/'".into(),
            });
        }

        if self.llm.stream_timeout_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "llm.stream_timeout_secs".into(),
                message: "must be at least 1 second".into(),
            });
        }

        if std::env::var(&self.llm.api_key_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key_env".into(),
                message: format!(
                    "{} is unset — LLM calls will fail until it is exported",
                    self.llm.api_key_env
                ),
            });
        }

        if std::env::var(&self.webhooks.voice_secret_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "webhooks.voice_secret_env".into(),
                message: "secret unset — voice webhook signatures will not be verified".into(),
            });
        }

        issues
    }
}
