//! Application configuration for EventFeed.
//!
//! User config lives at `~/.eventfeed/eventfeed.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; it only names the env vars.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EventFeedError, Result};
use crate::types::{SearchDepth, SourceLabel};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "eventfeed.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".eventfeed";

// ---------------------------------------------------------------------------
// Config structs (matching eventfeed.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Sites queried on every run, in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where the published `{ "events": [...] }` file is written.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("public/data/events.json")
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Result cap per source query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Per-source timeout.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> u32 {
    10
}
fn default_search_timeout() -> u64 {
    30
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the OpenRouter API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for structured extraction.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash".into()
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Snippet budget per hit in the model context, in characters.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Drop events the model returned outside the query window.
    #[serde(default = "default_true")]
    pub enforce_window: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snippet_chars: default_snippet_chars(),
            enforce_window: true,
        }
    }
}

fn default_snippet_chars() -> usize {
    400
}
fn default_true() -> bool {
    true
}

/// `[retry]` section. Zero retries keeps the single-attempt behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_backoff_ms() -> u64 {
    500
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

/// `[[sources]]` entry: one site scoped by domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub label: SourceLabel,
    pub domain: String,
    #[serde(default)]
    pub search_depth: SearchDepth,
}

impl SourceConfig {
    pub fn new(label: SourceLabel, domain: impl Into<String>, search_depth: SearchDepth) -> Self {
        Self {
            label,
            domain: domain.into(),
            search_depth,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(SourceLabel::Kktix, "kktix.com", SearchDepth::Basic),
        SourceConfig::new(SourceLabel::Accupass, "accupass.com", SearchDepth::Basic),
        SourceConfig::new(SourceLabel::Tixcraft, "tixcraft.com", SearchDepth::Basic),
        SourceConfig::new(
            SourceLabel::BillboardLiveTaipei,
            "billboardlivetaipei.tw",
            SearchDepth::Advanced,
        ),
    ]
}

impl AppConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Reject settings that would make every run fail or produce nothing.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EventFeedError::config("at least one [[sources]] entry is required"));
        }
        if let Some(source) = self.sources.iter().find(|s| s.domain.trim().is_empty()) {
            return Err(EventFeedError::config(format!(
                "source '{}' has an empty domain",
                source.label
            )));
        }
        if self.search.max_results == 0 {
            return Err(EventFeedError::config("search.max_results must be at least 1"));
        }
        if self.pipeline.snippet_chars == 0 {
            return Err(EventFeedError::config("pipeline.snippet_chars must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// API keys (resolved once at startup)
// ---------------------------------------------------------------------------

/// API keys read from the environment at startup.
#[derive(Clone)]
pub struct ApiKeys {
    pub search: String,
    pub llm: String,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("search", &"<redacted>")
            .field("llm", &"<redacted>")
            .finish()
    }
}

/// Read both API keys from the env vars named in the config.
///
/// A missing or empty variable is fatal: nothing should run without both keys.
pub fn resolve_api_keys(config: &AppConfig) -> Result<ApiKeys> {
    Ok(ApiKeys {
        search: read_api_key(&config.search.api_key_env, "Tavily search")?,
        llm: read_api_key(&config.llm.api_key_env, "OpenRouter")?,
    })
}

fn read_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(EventFeedError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.eventfeed/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| EventFeedError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.eventfeed/eventfeed.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EventFeedError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| EventFeedError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventFeedError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = render_default_config()?;

    std::fs::write(&path, content).map_err(|e| EventFeedError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Default config rendered as TOML.
pub fn render_default_config() -> Result<String> {
    toml::to_string_pretty(&AppConfig::default()).map_err(|e| EventFeedError::config(e.to_string()))
}
