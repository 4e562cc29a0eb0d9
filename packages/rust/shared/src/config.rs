//! Application configuration for ControlQA.
//!
//! User config lives at `~/.controlqa/controlqa.toml`.
//! API keys are never stored in the file, only the names of the environment
//! variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ControlQaError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "controlqa.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".controlqa";

// ---------------------------------------------------------------------------
// Config structs (matching controlqa.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Semantic search service settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Chat-completion service settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Control store and audit settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[search]` section.
///
/// The hit count is fixed by the search adapter; unknown keys such as `top`
/// are rejected rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Base URL of the search service.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Index to query.
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Named semantic ranking profile.
    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    /// Name of the env var holding the query key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Index field carrying the document title.
    #[serde(default = "default_title_field")]
    pub title_field: String,

    /// Index field carrying the document text (`chunk` or `content`).
    #[serde(default = "default_content_field")]
    pub content_field: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            index_name: default_index_name(),
            semantic_configuration: default_semantic_configuration(),
            api_version: default_search_api_version(),
            api_key_env: default_search_key_env(),
            title_field: default_title_field(),
            content_field: default_content_field(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://example.search.windows.net".into()
}
fn default_index_name() -> String {
    "controls-index".into()
}
fn default_semantic_configuration() -> String {
    "controls-index-semantic-configuration".into()
}
fn default_search_api_version() -> String {
    "2024-07-01".into()
}
fn default_search_key_env() -> String {
    "AZURE_SEARCH_KEY".into()
}
fn default_title_field() -> String {
    "title".into()
}
fn default_content_field() -> String {
    "chunk".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[completion]` section.
///
/// The generation budget is fixed by the synthesis adapter and has no keys here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// Base URL of the completion resource.
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    /// Model deployment name.
    #[serde(default = "default_deployment")]
    pub deployment: String,

    #[serde(default = "default_completion_api_version")]
    pub api_version: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            deployment: default_deployment(),
            api_version: default_completion_api_version(),
            api_key_env: default_completion_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_endpoint() -> String {
    "https://example.openai.azure.com".into()
}
fn default_deployment() -> String {
    "gpt-4o".into()
}
fn default_completion_api_version() -> String {
    "2024-08-01-preview".into()
}
fn default_completion_key_env() -> String {
    "AZURE_OPENAI_API_KEY".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the control database. A leading `~/` expands to the home dir.
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Persist every pipeline response as an audit record.
    #[serde(default)]
    pub audit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            audit: false,
        }
    }
}

fn default_store_path() -> String {
    "~/.controlqa/controls.db".into()
}

impl StoreConfig {
    /// The store path with `~/` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match self.path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    ControlQaError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.path)),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Check values that would otherwise only fail on the first request.
    pub fn validate(&self) -> Result<()> {
        parse_endpoint("search.endpoint", &self.search.endpoint)?;
        parse_endpoint("completion.endpoint", &self.completion.endpoint)?;
        Ok(())
    }
}

/// Parse an endpoint URL, naming the config key on failure.
pub fn parse_endpoint(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| ControlQaError::config(format!("{key} '{value}' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ControlQaError::config(format!(
            "{key} must use http or https, got '{other}'"
        ))),
    }
}

/// Read the API key held by `var_name`.
pub fn read_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ControlQaError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both service API key env vars are set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    read_api_key(&config.search.api_key_env)?;
    read_api_key(&config.completion.api_key_env)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.controlqa/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ControlQaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.controlqa/controlqa.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ControlQaError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ControlQaError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ControlQaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ControlQaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ControlQaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("semantic_configuration"));
        assert!(toml_str.contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.search.index_name, "controls-index");
        assert_eq!(config.completion.deployment, "gpt-4o");
        assert!(!config.store.audit);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn request_budget_keys_are_rejected() {
        for toml_str in [
            "[search]\ntop = 6\n",
            "[search]\ntop = 50\n",
            "[completion]\nmax_tokens = 4096\n",
            "[completion]\ntemperature = 0.2\n",
            "[completion]\ntop_p = 0.5\n",
        ] {
            let parsed: std::result::Result<AppConfig, _> = toml::from_str(toml_str);
            assert!(parsed.is_err(), "accepted: {toml_str}");
        }
    }

    #[test]
    fn load_config_from_reports_fixed_key() {
        let path = std::env::temp_dir().join(format!(
            "cqa_config_test_{}.toml",
            uuid::Uuid::now_v7()
        ));
        std::fs::write(&path, "[search]\ntop = 6\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.component(), "configuration");
        assert!(err.to_string().contains("top"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[search]
endpoint = "https://contoso.search.windows.net"
content_field = "content"

[store]
path = "/tmp/controls.db"
audit = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.content_field, "content");
        assert_eq!(config.search.title_field, "title");
        assert_eq!(config.completion.deployment, "gpt-4o");
        assert!(config.store.audit);
        assert_eq!(
            config.store.resolved_path().unwrap(),
            PathBuf::from("/tmp/controls.db")
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.search.endpoint = "not a url".into();
        assert!(config.validate().unwrap_err().to_string().contains("search.endpoint"));

        let mut config = AppConfig::default();
        config.completion.endpoint = "ftp://example.com".into();
        assert!(config.validate().is_err());

    }

    #[test]
    fn store_path_expands_home() {
        let store = StoreConfig::default();
        let path = store.resolved_path().expect("resolve");
        assert!(path.ends_with(".controlqa/controls.db"));
        assert!(!path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Unique names so parallel tests never see a real key
        config.search.api_key_env = "CQA_TEST_NONEXISTENT_SEARCH_KEY_12345".into();
        config.completion.api_key_env = "CQA_TEST_NONEXISTENT_LLM_KEY_12345".into();
        let result = validate_api_keys(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("CQA_TEST_NONEXISTENT_SEARCH_KEY_12345"));
    }
}
