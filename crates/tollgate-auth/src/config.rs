//! Authorization configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! global_policies = ["Authenticated"]
//! read_only_methods = ["GET", "HEAD"]
//! filter_responses = true
//! denied_message = "Access denied"
//!
//! [logging]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};

/// Methods whose requests skip parameter write checks by default.
pub const DEFAULT_READ_ONLY_METHODS: &[&str] = &["GET"];

/// Returns `true` if `method` is one of `methods`, ignoring ASCII case.
pub fn is_read_only_method<S: AsRef<str>>(methods: &[S], method: &str) -> bool {
    methods.iter().any(|m| m.as_ref().eq_ignore_ascii_case(method))
}

/// Root authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Policies applied to routes that carry no route-scoped decorator on the
    /// action or the controller. `None` means routes only require an identity.
    pub global_policies: Option<Vec<String>>,

    /// HTTP methods whose requests skip parameter write checks.
    pub read_only_methods: Vec<String>,

    /// Apply read policies to response bodies.
    pub filter_responses: bool,

    /// Message returned on route denial instead of `Forbidden` / `Unauthorized`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_message: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            global_policies: None,
            read_only_methods: DEFAULT_READ_ONLY_METHODS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            filter_responses: true,
            denied_message: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Returns `true` if requests with this HTTP method skip write checks.
    #[must_use]
    pub fn is_read_only(&self, method: &str) -> bool {
        is_read_only_method(&self.read_only_methods, method)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `global_policies` is present but empty, or contains a blank name
    /// - a read-only method is blank or not an HTTP token
    /// - the log level is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(policies) = &self.global_policies {
            if policies.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "global_policies cannot be an empty list".to_string(),
                ));
            }
            if policies.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "global_policies cannot contain blank policy names".to_string(),
                ));
            }
        }

        for method in &self.read_only_methods {
            if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid read-only HTTP method: '{}'",
                    method
                )));
            }
        }

        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid log level: '{}'. Must be trace, debug, info, warn or error",
                    other
                )));
            }
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

pub mod loader {
    use std::path::PathBuf;

    use config::{Config, Environment, File};

    use super::{AuthConfig, ConfigError};

    /// Default configuration file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "tollgate.toml";

    /// Loads configuration from a TOML file plus `TOLLGATE__*` environment
    /// overrides, then validates it.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load_config(path: Option<&str>) -> Result<AuthConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(ConfigError::Missing(format!("config file {p}")));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. TOLLGATE__LOGGING__LEVEL=debug
        builder = builder.add_source(
            Environment::with_prefix("TOLLGATE")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("global_policies")
                .with_list_parse_key("read_only_methods"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AuthConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
