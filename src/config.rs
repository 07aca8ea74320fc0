//! Configuration management for Device Duel
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DuelError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Provider types accepted by `provider.type`
pub const VALID_PROVIDERS: [&str; 2] = ["gemini", "fake"];

/// Main configuration structure for Device Duel
///
/// Holds the settings for both halves of the system: the backend that
/// talks to the LLM provider and the client that talks to the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM provider settings (backend side)
    #[serde(default)]
    pub provider: ProviderConfig,
    /// HTTP client settings (client side)
    #[serde(default)]
    pub client: ClientConfig,
    /// Follow-up chat behavior
    #[serde(default)]
    pub chat: ChatConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the backend listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Provider configuration
///
/// Specifies which LLM provider the backend uses and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Google Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; usually supplied through `GEMINI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (overridable for tests and local mocks)
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Model used for both comparisons and chat
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Per-request timeout for provider calls (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_gemini_api_base(),
            model: default_gemini_model(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// Client-side HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for the comparison request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Follow-up chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longest wait for the next streamed fragment before the turn fails (seconds)
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_seconds: u64,

    /// Assistant message shown in place of a failed turn
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_stream_idle_timeout() -> u64 {
    60
}

fn default_fallback_message() -> String {
    crate::chat::FALLBACK_MESSAGE.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_idle_timeout_seconds: default_stream_idle_timeout(),
            fallback_message: default_fallback_message(),
        }
    }
}

impl ChatConfig {
    /// Idle timeout as a [`Duration`]
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

/// Log output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let (config, warnings) = Self::load_with_warnings(path, cli)?;
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Load configuration, returning warnings instead of logging them
    ///
    /// Used at startup, before the tracing subscriber exists.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load_with_warnings(path: &str, cli: &crate::cli::Cli) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            warnings.push(format!("Config file not found at {}, using defaults", path));
            Self::default()
        };

        config.apply_env_vars(&mut warnings);
        config.apply_cli_overrides(cli);

        Ok((config, warnings))
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DuelError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| DuelError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self, warnings: &mut Vec<String>) {
        if let Ok(bind) = std::env::var("DUEL_BIND") {
            self.server.bind = bind;
        }

        if let Ok(provider_type) = std::env::var("DUEL_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        // The hosted deployment exposes the key as API_KEY; GEMINI_API_KEY wins.
        if let Ok(api_key) = std::env::var("API_KEY") {
            self.provider.gemini.api_key = Some(api_key);
        }
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            self.provider.gemini.api_key = Some(api_key);
        }

        if let Ok(model) = std::env::var("DUEL_GEMINI_MODEL") {
            self.provider.gemini.model = model;
        }

        if let Ok(api_base) = std::env::var("DUEL_GEMINI_API_BASE") {
            self.provider.gemini.api_base = api_base;
        }

        if let Ok(base_url) = std::env::var("DUEL_CLIENT_BASE_URL") {
            self.client.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("DUEL_STREAM_IDLE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.chat.stream_idle_timeout_seconds = value;
            } else {
                warnings.push(format!(
                    "Invalid DUEL_STREAM_IDLE_TIMEOUT_SECONDS: {}, keeping {}",
                    timeout, self.chat.stream_idle_timeout_seconds
                ));
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if cli.json_logs {
            self.logging.json = true;
        }

        match &cli.command {
            crate::cli::Commands::Serve { bind, provider } => {
                if let Some(bind) = bind {
                    self.server.bind = bind.clone();
                }
                if let Some(provider) = provider {
                    self.provider.provider_type = provider.clone();
                }
            }
            crate::cli::Commands::Compare { server, .. } => {
                if let Some(server) = server {
                    self.client.base_url = server.clone();
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set. Provider credentials are
    /// checked when the provider is constructed, so the client can run
    /// without a key.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(DuelError::Config("Provider type cannot be empty".to_string()).into());
        }

        if !VALID_PROVIDERS.contains(&self.provider.provider_type.as_str()) {
            return Err(DuelError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                VALID_PROVIDERS.join(", ")
            ))
            .into());
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(DuelError::Config(format!(
                "server.bind is not a valid socket address: {}",
                self.server.bind
            ))
            .into());
        }

        if url::Url::parse(&self.client.base_url).is_err() {
            return Err(DuelError::Config(format!(
                "client.base_url is not a valid URL: {}",
                self.client.base_url
            ))
            .into());
        }

        if self.provider.gemini.timeout_seconds == 0 {
            return Err(DuelError::Config(
                "provider.gemini.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.client.request_timeout_seconds == 0 {
            return Err(DuelError::Config(
                "client.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.stream_idle_timeout_seconds == 0 {
            return Err(DuelError::Config(
                "chat.stream_idle_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.fallback_message.trim().is_empty() {
            return Err(
                DuelError::Config("chat.fallback_message cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use serial_test::serial;

    const ENV_VARS: [&str; 9] = [
        "DUEL_BIND",
        "DUEL_PROVIDER",
        "API_KEY",
        "GEMINI_API_KEY",
        "DUEL_GEMINI_MODEL",
        "DUEL_GEMINI_API_BASE",
        "DUEL_CLIENT_BASE_URL",
        "DUEL_STREAM_IDLE_TIMEOUT_SECONDS",
        "RUST_LOG",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.provider_type, "gemini");
        assert_eq!(config.provider.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.client.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.chat.stream_idle_timeout_seconds, 60);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_provider() {
        let mut config = Config::default();
        config.provider.provider_type = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = Config::default();
        config.provider.provider_type = "openai".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gemini, fake"));
    }

    #[test]
    fn test_config_validation_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_base_url() {
        let mut config = Config::default();
        config.client.base_url = "::nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let mut config = Config::default();
        config.chat.stream_idle_timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.client.request_timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.provider.gemini.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_blank_fallback() {
        let mut config = Config::default();
        config.chat.fallback_message = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
server:
  bind: 0.0.0.0:8080
provider:
  type: fake
  gemini:
    model: gemini-2.0-flash
    timeout_seconds: 30
client:
  base_url: http://duel.internal:8080
chat:
  stream_idle_timeout_seconds: 15
  fallback_message: Something went wrong.
logging:
  json: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.provider.provider_type, "fake");
        assert_eq!(config.provider.gemini.model, "gemini-2.0-flash");
        assert_eq!(
            config.provider.gemini.api_base,
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(config.client.base_url, "http://duel.internal:8080");
        assert_eq!(config.chat.stream_idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.chat.fallback_message, "Something went wrong.");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("provider:\n  type: fake\n").unwrap();
        assert_eq!(config.provider.provider_type, "fake");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.chat.fallback_message, crate::chat::FALLBACK_MESSAGE);
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let config = Config::load("nonexistent.yaml", &Cli::default()).unwrap();
        assert_eq!(config.provider.provider_type, "gemini");
    }

    #[test]
    #[serial]
    fn test_load_with_warnings_reports_missing_file() {
        clear_env();
        let (config, warnings) =
            Config::load_with_warnings("nonexistent.yaml", &Cli::default()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(
            warnings,
            vec!["Config file not found at nonexistent.yaml, using defaults".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        clear_env();
        std::env::set_var("DUEL_BIND", "0.0.0.0:9999");
        std::env::set_var("DUEL_PROVIDER", "fake");
        std::env::set_var("API_KEY", "from-api-key");
        std::env::set_var("GEMINI_API_KEY", "from-gemini-key");
        std::env::set_var("DUEL_STREAM_IDLE_TIMEOUT_SECONDS", "5");

        let mut config = Config::default();
        let mut warnings = Vec::new();
        config.apply_env_vars(&mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(config.server.bind, "0.0.0.0:9999");
        assert_eq!(config.provider.provider_type, "fake");
        assert_eq!(
            config.provider.gemini.api_key.as_deref(),
            Some("from-gemini-key")
        );
        assert_eq!(config.chat.stream_idle_timeout_seconds, 5);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_ignores_bad_numbers() {
        clear_env();
        std::env::set_var("DUEL_STREAM_IDLE_TIMEOUT_SECONDS", "soon");

        let mut config = Config::default();
        let mut warnings = Vec::new();
        config.apply_env_vars(&mut warnings);
        assert_eq!(config.chat.stream_idle_timeout_seconds, 60);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Invalid DUEL_STREAM_IDLE_TIMEOUT_SECONDS: soon"));

        clear_env();
    }

    #[test]
    fn test_cli_overrides_for_serve() {
        let cli = Cli {
            config: None,
            verbose: false,
            json_logs: true,
            command: Commands::Serve {
                bind: Some("127.0.0.1:4000".to_string()),
                provider: Some("fake".to_string()),
            },
        };
        let mut config = Config::default();
        config.apply_cli_overrides(&cli);
        assert_eq!(config.server.bind, "127.0.0.1:4000");
        assert_eq!(config.provider.provider_type, "fake");
        assert!(config.logging.json);
    }

    #[test]
    fn test_cli_overrides_for_compare() {
        let cli = Cli {
            config: None,
            verbose: false,
            json_logs: false,
            command: Commands::Compare {
                server: Some("http://10.0.0.2:3000".to_string()),
                device_one: None,
                device_two: None,
            },
        };
        let mut config = Config::default();
        config.apply_cli_overrides(&cli);
        assert_eq!(config.client.base_url, "http://10.0.0.2:3000");
        assert_eq!(config.provider.provider_type, "gemini");
    }
}
