//! TOML configuration.
//!
//! Only `[server]` is required; every other section falls back to the
//! defaults below. [`load_config`] parses and then validates, so callers
//! never see an inconsistent [`Config`].
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [store]
//! backend = "sqlite"
//! path = "./data/docviz.sqlite"
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docviz_core::context::DEFAULT_MAX_CONTEXT_CHARS;
use docviz_core::retrieve::DEFAULT_RESULT_CAP;
use docviz_core::segment::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docviz.sqlite")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_summary_context_chars")]
    pub summary_context_chars: usize,
    /// Previous user/assistant turns replayed to the model.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_max_results() -> usize {
    DEFAULT_RESULT_CAP
}
fn default_max_context_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}
fn default_summary_context_chars() -> usize {
    4000
}
fn default_history_turns() -> usize {
    6
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_context_chars: default_max_context_chars(),
            summary_context_chars: default_summary_context_chars(),
            history_turns: default_history_turns(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Web search for the assistant chat.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    /// Environment variable holding the custom search engine id.
    #[serde(default = "default_engine_id_env")]
    pub engine_id_env: String,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_engine_id_env() -> String {
    "GOOGLE_CSE_ID".to_string()
}
fn default_search_results() -> usize {
    5
}
fn default_search_timeout_secs() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key_env: default_search_key_env(),
            engine_id_env: default_engine_id_env(),
            max_results: default_search_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_speech_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_speech_key_env() -> String {
    "ELEVENLABS_API_KEY".to_string()
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_speech_timeout_secs() -> u64 {
    30
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key_env: default_speech_key_env(),
            voice_id: default_voice_id(),
            timeout_secs: default_speech_timeout_secs(),
        }
    }
}

impl Config {
    /// Defaults for commands that run without a config file
    /// (`segment`, `search`, `context`, `profile`).
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:5000".to_string(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    match config.search.provider.as_str() {
        "disabled" | "google" => {}
        other => anyhow::bail!(
            "Unknown search provider: '{}'. Must be disabled or google.",
            other
        ),
    }
    if config.search.max_results == 0 || config.search.max_results > 10 {
        anyhow::bail!("search.max_results must be between 1 and 10");
    }

    match config.speech.provider.as_str() {
        "disabled" | "elevenlabs" => {}
        other => anyhow::bail!(
            "Unknown speech provider: '{}'. Must be disabled or elevenlabs.",
            other
        ),
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(toml: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let cfg = load("[server]\nbind = \"127.0.0.1:0\"\n").unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.max_results, 5);
        assert_eq!(cfg.retrieval.max_context_chars, 8000);
        assert_eq!(cfg.retrieval.summary_context_chars, 4000);
        assert_eq!(cfg.retrieval.history_turns, 6);
        assert!(!cfg.llm.is_enabled());
        assert_eq!(cfg.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.search.provider, "disabled");
        assert_eq!(cfg.search.max_results, 5);
        assert_eq!(cfg.speech.provider, "disabled");
    }

    #[test]
    fn test_missing_server_rejected() {
        assert!(load("[chunking]\nchunk_size = 10\n").is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = load("[server]\nbind = \"x\"\n[chunking]\nchunk_size = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = load("[server]\nbind = \"x\"\n[llm]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn test_openai_requires_model() {
        assert!(load("[server]\nbind = \"x\"\n[llm]\nprovider = \"openai\"\n").is_err());
        let cfg = load(
            "[server]\nbind = \"x\"\n[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n",
        )
        .unwrap();
        assert!(cfg.llm.is_enabled());
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_search_and_speech_providers() {
        let cfg = load(
            "[server]\nbind = \"x\"\n[search]\nprovider = \"google\"\nmax_results = 3\n[speech]\nprovider = \"elevenlabs\"\nvoice_id = \"v1\"\n",
        )
        .unwrap();
        assert_eq!(cfg.search.provider, "google");
        assert_eq!(cfg.search.max_results, 3);
        assert_eq!(cfg.search.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(cfg.speech.voice_id, "v1");

        let err = load("[server]\nbind = \"x\"\n[search]\nprovider = \"bing\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown search provider"));
        let err = load("[server]\nbind = \"x\"\n[search]\nmax_results = 11\n").unwrap_err();
        assert!(err.to_string().contains("search.max_results"));
        let err = load("[server]\nbind = \"x\"\n[speech]\nprovider = \"say\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown speech provider"));
    }

    #[test]
    fn test_sqlite_backend() {
        let cfg = load("[server]\nbind = \"x\"\n[store]\nbackend = \"sqlite\"\npath = \"/tmp/a.db\"\n")
            .unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.store.path, PathBuf::from("/tmp/a.db"));
    }
}
