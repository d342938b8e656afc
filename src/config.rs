use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// State backend configuration
    pub state: StateConfig,

    /// Stream broker configuration
    pub streams: StreamsConfig,

    /// LLM scorer configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Policy / allowlist configuration
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Pipeline behaviour configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl Config {
    /// Load configuration from embedded defaults, an optional file and the
    /// environment (prefix: GUARDIAN, separator: __)
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/guardian.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GUARDIAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Redis connection string (redis backend)
    pub redis_url: Option<String>,

    /// Key prefix for all persisted documents
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Stream broker connection string
    #[serde(default = "default_broker_url")]
    pub url: String,

    /// Stream carrying agent action intents
    #[serde(default = "default_stream_intent")]
    pub intent: String,

    /// Stream carrying guardian decisions
    #[serde(default = "default_stream_decision")]
    pub decision: String,

    /// Stream notified when an approval is opened
    #[serde(default = "default_stream_approval_request")]
    pub approval_request: String,

    /// Stream carrying human approval resolutions
    #[serde(default = "default_stream_approval_decision")]
    pub approval_decision: String,

    /// Consumer group for the intent stream
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Consumer name within the group
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Max messages fetched per read
    #[serde(default = "default_read_count")]
    pub read_count: usize,

    /// Block duration for a group read (milliseconds)
    #[serde(default = "default_block_ms")]
    pub block_ms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (e.g. http://localhost:11434/v1).
    /// Unset together with api_key disables the scorer.
    pub base_url: Option<String>,

    /// API key; optional for local backends
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout (seconds)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Completion token cap
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// The scorer runs when either a base URL (Ollama) or an API key
    /// (hosted API) is configured.
    pub fn enabled(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        has(&self.base_url) || has(&self.api_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Domains agents may send data to without approval
    #[serde(default)]
    pub external_domains: Vec<String>,

    /// Domains considered inside the trust boundary
    #[serde(default)]
    pub internal_domains: Vec<String>,

    /// Seed the default rule set when the policy store is empty
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            external_domains: Vec::new(),
            internal_domains: Vec::new(),
            seed_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessingConfig {
    /// Persist approval records for REQUIRE_APPROVAL outcomes of the
    /// synchronous /evaluate endpoint (off by default; the stream path
    /// always persists them)
    #[serde(default)]
    pub sync_create_approvals: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_key_prefix() -> String {
    "guardian".to_string()
}

fn default_broker_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_stream_intent() -> String {
    "action.intent".to_string()
}

fn default_stream_decision() -> String {
    "action.decision".to_string()
}

fn default_stream_approval_request() -> String {
    "approval.request".to_string()
}

fn default_stream_approval_decision() -> String {
    "approval.decision".to_string()
}

fn default_consumer_group() -> String {
    "guardian".to_string()
}

fn default_consumer_name() -> String {
    "guardian-1".to_string()
}

fn default_read_count() -> usize {
    10
}

fn default_block_ms() -> usize {
    2000
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    10
}

fn default_llm_max_tokens() -> u32 {
    256
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.state.backend, StateBackend::Memory);
        assert_eq!(config.streams.intent, "action.intent");
        assert_eq!(config.streams.read_count, 10);
        assert!(!config.llm.enabled());
    }

    #[test]
    fn llm_enabled_by_base_url_or_key() {
        let mut llm = LlmConfig::default();
        assert!(!llm.enabled());

        llm.base_url = Some("http://localhost:11434/v1".to_string());
        assert!(llm.enabled());

        llm.base_url = Some("   ".to_string());
        assert!(!llm.enabled());

        llm.api_key = Some("sk-test".to_string());
        assert!(llm.enabled());
    }
}
