//! Client configuration: where the pipeline service lives and how long to wait for it.
//!
//! [`ClientConfig`] is built through [`ClientConfig::builder`], or loaded from a
//! TOML file and environment variables with [`ClientConfig::from_env`].
//!
//! TOML schema (all keys optional):
//!
//! ```toml
//! api_url = "http://localhost:8000"
//! timeout_secs = 60
//! user_agent = "lesson-pipeline/0.1"
//! ```

use crate::{error::Result, PipelineError};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Base address used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "LESSON_PIPELINE_CONFIG";

/// Environment variable overriding the base address.
pub const API_URL_ENV: &str = "LESSON_PIPELINE_API_URL";

/// Resolved client configuration.
///
/// # Example
///
/// ```
/// use lesson_pipeline::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder("http://localhost:8000/")
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(config.generate_url(), "http://localhost:8000/generate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the pipeline service, without trailing slash.
    pub base_url: String,
    /// Upper bound on a single `/generate` call.
    pub timeout: Duration,
    /// Optional `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }
}

/// On-disk shape of the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: base_url.into(),
            timeout: None,
            user_agent: None,
        }
    }

    /// Full URL of the generation endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// Parse a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s)
            .map_err(|e| PipelineError::InvalidConfig(format!("bad TOML: {}", e)))?;

        let mut builder =
            ClientConfig::builder(file.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()));
        if let Some(secs) = file.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(ua) = file.user_agent {
            builder = builder.user_agent(ua);
        }
        builder.build()
    }

    /// Load configuration from the environment.
    ///
    /// Reads the TOML file named by `LESSON_PIPELINE_CONFIG` when set, then
    /// applies `LESSON_PIPELINE_API_URL` on top. A file that cannot be read or
    /// parsed is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    error!(target: "lesson_pipeline", %path, error = %e, "Failed to read config file");
                    PipelineError::InvalidConfig(format!("cannot read {}: {}", path, e))
                })?;
                let config = Self::from_toml_str(&text)?;
                info!(target: "lesson_pipeline", %path, "Loaded client config (TOML)");
                config
            }
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.base_url = normalize_base_url(&url)?;
        }
        Ok(config)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ClientConfigBuilder {
    /// Set the request timeout. Default: 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the `User-Agent` header value.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Build the configuration, validating the base URL and timeout.
    pub fn build(self) -> Result<ClientConfig> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        Ok(ClientConfig {
            base_url: normalize_base_url(&self.base_url)?,
            timeout,
            user_agent: self.user_agent,
        })
    }
}

/// Strip trailing slashes and a trailing `/generate` from a base URL.
/// Prevents double-pathing when a full endpoint URL was configured.
fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix("/generate")
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(PipelineError::InvalidConfig(format!(
            "base URL must start with http:// or https://, got {:?}",
            url
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn test_normalize_strips_trailing_slash_and_endpoint() {
        assert_eq!(normalize_base_url("http://localhost:8000/").unwrap(), "http://localhost:8000");
        assert_eq!(
            normalize_base_url("http://localhost:8000/generate").unwrap(),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_base_url(" https://api.example.com/v2/generate/ ").unwrap(),
            "https://api.example.com/v2"
        );
    }

    #[test]
    fn test_normalize_rejects_missing_scheme() {
        assert!(matches!(
            normalize_base_url("localhost:8000"),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let err = ClientConfig::builder(DEFAULT_API_URL)
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ClientConfig::builder("http://svc:9000/").build().unwrap();
        assert_eq!(config.generate_url(), "http://svc:9000/generate");
        assert_eq!(config.health_url(), "http://svc:9000/health");
    }

    #[test]
    fn test_from_toml_str() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_url = "http://svc:9000"
            timeout_secs = 5
            user_agent = "tests"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://svc:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent.as_deref(), Some("tests"));
    }

    #[test]
    fn test_from_toml_str_empty_uses_defaults() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_keys() {
        assert!(ClientConfig::from_toml_str("api_uri = \"http://x\"").is_err());
    }
}
