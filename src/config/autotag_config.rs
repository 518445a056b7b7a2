//! cycle-autotag configuration file handling
//!
//! Loads and manages the ~/.config/cycle-autotag/config.yaml file. The API
//! token is never stored in the file; it is read from the environment
//! variable named by `token_env`.

use crate::integrations::retry::RetryConfig;
use crate::processor::{CategoryRule, CategoryRules};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Cycle GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.product.cycle.app/graphql";

/// Default environment variable holding the API token
pub const DEFAULT_TOKEN_ENV: &str = "CYCLE_API_TOKEN";

/// Retry settings for GraphQL calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per GraphQL call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    crate::integrations::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    crate::integrations::retry::DEFAULT_DELAY.as_millis() as u64
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Webhook receiver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the webhook receiver to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Request body size limit in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_max_body_size() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// cycle-autotag configuration
///
/// Immutable once loaded; shared by reference with the transport and the
/// event processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutotagConfig {
    /// GraphQL endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Send an empty `Authorization` header when no token is set (false = omit it)
    #[serde(default = "default_send_empty_authorization")]
    pub send_empty_authorization: bool,

    /// Per-request timeout in seconds (unset = no timeout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Workspace (product) id events must belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    /// Workspace slug, resolved to an id at startup when `workspace_id` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_slug: Option<String>,

    /// Doctype id of feedback docs; events carrying another doctypeId are skipped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_doctype_id: Option<String>,

    /// Doctype name a fetched doc must have
    #[serde(default = "default_doctype_name")]
    pub doctype_name: String,

    /// Select attribute definition to write
    pub attribute_definition_id: String,

    /// Compare emails ignoring ASCII case
    #[serde(default)]
    pub case_insensitive_emails: bool,

    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Webhook receiver settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Ordered category rules; the first match wins
    #[serde(default)]
    pub rules: Vec<CategoryRule>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_send_empty_authorization() -> bool {
    true
}

fn default_doctype_name() -> String {
    "Feedback".to_string()
}

impl AutotagConfig {
    /// Create a configuration for a known workspace id
    pub fn new(
        workspace_id: impl Into<String>,
        attribute_definition_id: impl Into<String>,
        rules: Vec<CategoryRule>,
    ) -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: default_token_env(),
            send_empty_authorization: default_send_empty_authorization(),
            request_timeout_secs: None,
            workspace_id: Some(workspace_id.into()),
            workspace_slug: None,
            feedback_doctype_id: None,
            doctype_name: default_doctype_name(),
            attribute_definition_id: attribute_definition_id.into(),
            case_insensitive_emails: false,
            retry: RetrySettings::default(),
            server: ServerConfig::default(),
            rules,
        }
    }

    /// Sample configuration written by `autotag init`
    pub fn sample() -> Self {
        let mut config = Self::new(
            "WORKSPACE_ID",
            "ATTRIBUTE_DEFINITION_ID",
            vec![
                CategoryRule::new(
                    "SELECT_VALUE_ID_MOBILE",
                    "Mobile",
                    ["john@email.com", "jane@email.com"],
                ),
                CategoryRule::new(
                    "SELECT_VALUE_ID_SECURITY",
                    "Security",
                    ["eric@email.com", "sara@email.com"],
                ),
                CategoryRule::new(
                    "SELECT_VALUE_ID_PAYMENT",
                    "Payment",
                    ["paul@email.com", "anne@email.com"],
                ),
                CategoryRule::new(
                    "SELECT_VALUE_ID_CORE",
                    "Core",
                    ["emil@email.com", "lucy@email.com"],
                ),
            ],
        );
        config.feedback_doctype_id = Some("FEEDBACK_DOCTYPE_ID".to_string());
        config
    }

    /// Load configuration from the default path (~/.config/cycle-autotag/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::AutotagError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading autotag configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            rules = config.rules.len(),
            endpoint = %config.endpoint,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving autotag configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/cycle-autotag/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("cycle-autotag");
        path.push("config.yaml");
        path
    }

    /// API token from the environment, if set and non-empty
    pub fn api_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Rule table in configured order
    pub fn category_rules(&self) -> CategoryRules {
        CategoryRules::new(self.rules.clone())
            .case_insensitive(self.case_insensitive_emails)
    }
}
