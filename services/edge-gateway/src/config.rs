//! Type-Safe Configuration with Validation
//!
//! Process settings come from environment variables (optionally seeded from a
//! `.env` file). The routing and exemption policy lives in a separate document
//! loaded by [`crate::policy`].

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::jwt::{MIN_SECRET_BYTES, Role};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Setting that carried the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid timeout value
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Signing secret too short for HMAC-SHA256
    #[error("JWT secret must be at least {min_bytes} bytes")]
    WeakSecret {
        /// Required minimum length
        min_bytes: usize,
    },

    /// Rule that cannot be compiled
    #[error("Invalid rule {rule}: {reason}")]
    InvalidRule {
        /// Rule as written in the policy
        rule: String,
        /// Why it was refused
        reason: String,
    },

    /// Two rules claim the same path for overlapping methods
    #[error("Ambiguous rules: {first} and {second} overlap")]
    AmbiguousRules {
        /// Earlier rule
        first: String,
        /// Later rule
        second: String,
    },

    /// Route pointing at a backend with no configured URL
    #[error("Route references unknown backend {backend}")]
    UnknownBackend {
        /// Name used by the route
        backend: String,
    },

    /// Policy document could not be read or deserialized
    #[error("Failed to load policy: {0}")]
    Policy(#[from] ::config::ConfigError),
}

/// Where the role guard reads the caller's role from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleLookup {
    /// `role` claim of the verified access token
    #[default]
    Claims,
    /// Live user lookup on the identity service
    Identity,
}

impl FromStr for RoleLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claims" => Ok(Self::Claims),
            "identity" => Ok(Self::Identity),
            other => Err(format!("expected `claims` or `identity`, got `{other}`")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Shared HMAC secret for access and refresh tokens
    pub jwt_secret: SecretString,
    /// Identity service base URL
    pub identity_service_url: Url,
    /// Bound on each identity call in milliseconds
    pub identity_timeout_ms: u64,
    /// Role required on privileged paths
    pub admin_role: Role,
    /// Role source for the guard
    pub role_lookup: RoleLookup,
    /// Policy document; the built-in table is used when unset
    pub policy_file: Option<PathBuf>,
    /// Backend forward timeout in seconds
    pub backend_timeout_secs: u64,
    /// Largest request body forwarded
    pub max_body_bytes: usize,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Log output format
    pub log_format: LogFormat,
}

const DEFAULT_IDENTITY_SERVICE_URL: &str = "http://localhost:8081/auth";

impl Config {
    /// Configuration with defaults around the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if the default identity URL does
    /// not parse.
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            jwt_secret: SecretString::from(jwt_secret.into()),
            identity_service_url: parse_url("IDENTITY_SERVICE_URL", DEFAULT_IDENTITY_SERVICE_URL)?,
            identity_timeout_ms: 3000,
            admin_role: Role::Admin,
            role_lookup: RoleLookup::Claims,
            policy_file: None,
            backend_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            shutdown_timeout_seconds: 30,
            log_format: LogFormat::Json,
        })
    }

    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingRequired("JWT_SECRET".to_string()))?;

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8000)?,
            jwt_secret: SecretString::from(jwt_secret),
            identity_service_url: parse_url_env("IDENTITY_SERVICE_URL", DEFAULT_IDENTITY_SERVICE_URL)?,
            identity_timeout_ms: parse_env("IDENTITY_TIMEOUT_MS", 3000)?,
            admin_role: env::var("ADMIN_ROLE").map_or(Role::Admin, Role::from),
            role_lookup: parse_env("ROLE_LOOKUP", RoleLookup::Claims)?,
            policy_file: env::var("POLICY_FILE").ok().map(PathBuf::from),
            backend_timeout_secs: parse_env("BACKEND_TIMEOUT_SECS", 30)?,
            max_body_bytes: parse_env("MAX_BODY_BYTES", 10 * 1024 * 1024)?,
            shutdown_timeout_seconds: parse_env("SHUTDOWN_TIMEOUT", 30)?,
            log_format: parse_env("LOG_FORMAT", LogFormat::Json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.jwt_secret.expose_secret().len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret {
                min_bytes: MIN_SECRET_BYTES,
            });
        }
        if self.identity_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("IDENTITY_TIMEOUT_MS"));
        }
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("BACKEND_TIMEOUT_SECS"));
        }
        if self.admin_role.as_str().is_empty() {
            return Err(ConfigError::MissingRequired("ADMIN_ROLE".to_string()));
        }
        Ok(())
    }

    /// Socket address to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Identity call bound.
    #[must_use]
    pub const fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }

    /// Backend forward bound.
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Drain window after a shutdown signal.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_url(name, &url_str)
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
