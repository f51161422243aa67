//! Error handler configuration.
//!
//! `ErrorHandlerConfig` is the raw, serde-facing shape (YAML file, environment
//! variables, or code). It is resolved exactly once at startup into
//! [`Settings`], which holds parsed header names and addresses and is never
//! modified afterwards.

use std::fmt;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::request_id::X_REQUEST_ID;

/// Prefix of environment variables read by [`ErrorHandlerConfig::load`].
pub const ENV_PREFIX: &str = "VAULT_ERRORS_";

pub const DEFAULT_DEBUG_HEADER: &str = "x-vault-debug";
pub const DEFAULT_AUTH_CHALLENGE: &str = r#"Bearer realm="vault", error="invalid_token""#;

/// Stack lines kept outside development when `max_stack_lines` is not set.
const DEFAULT_MAX_STACK_LINES: usize = 15;

/// Deployment mode. Parsed case-insensitively, with `dev` and `prod` aliases,
/// both by [`FromStr`] and when loading configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum EnvMode {
    Development,
    #[default]
    Production,
    Test,
}

impl EnvMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for EnvMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnv {
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for EnvMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration error for the error handler
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown env mode '{value}'")]
    InvalidEnv { value: String },
    #[error("'{value}' is not a valid header name for {field}")]
    InvalidHeaderName { field: &'static str, value: String },
    #[error("'{value}' in show_debug_for_ips is not an IP address: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: AddrParseError,
    },
    #[error("auth_challenge is not a valid header value")]
    InvalidAuthChallenge,
    #[error("failed to load error handler config: {0}")]
    Load(#[source] Box<figment::Error>),
}

fn default_debug_header() -> String {
    DEFAULT_DEBUG_HEADER.to_owned()
}

fn default_request_id_header() -> String {
    X_REQUEST_ID.as_str().to_owned()
}

fn default_allow_list() -> Vec<String> {
    vec!["127.0.0.1".to_owned(), "::1".to_owned()]
}

fn default_auth_challenge() -> String {
    DEFAULT_AUTH_CHALLENGE.to_owned()
}

/// Error handler configuration as read from files or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlerConfig {
    #[serde(default)]
    pub env: EnvMode,

    /// Include the stack in `debug`. Defaults to `env != production`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_stack: Option<bool>,

    /// How many causal links to include in `debug` (0 = none).
    #[serde(default)]
    pub include_causes: usize,

    /// Max stack lines in `debug` (0 = unbounded). Defaults to unbounded in
    /// development and 15 otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stack_lines: Option<usize>,

    /// Header that opts a request into debug output when set to "1" or "true".
    #[serde(default = "default_debug_header")]
    pub allow_debug_header: String,

    /// Callers allowed to see debug output. Empty is permissive in development only.
    #[serde(default = "default_allow_list")]
    pub show_debug_for_ips: Vec<String>,

    /// Kill switch: never attach debug output.
    #[serde(default)]
    pub disable_debug: bool,

    /// Inbound correlation header.
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// `WWW-Authenticate` value set on 401 responses that carry none.
    #[serde(default = "default_auth_challenge")]
    pub auth_challenge: String,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            env: EnvMode::default(),
            include_stack: None,
            include_causes: 0,
            max_stack_lines: None,
            allow_debug_header: default_debug_header(),
            show_debug_for_ips: default_allow_list(),
            disable_debug: false,
            request_id_header: default_request_id_header(),
            auth_challenge: default_auth_challenge(),
        }
    }
}

impl ErrorHandlerConfig {
    /// Extract the configuration from an existing figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if the figment cannot be deserialized.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load defaults, then an optional YAML file, then `VAULT_ERRORS_*` env vars.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if a source is malformed or holds unknown keys.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(&figment)
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` for invalid header names, addresses, or challenge value.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let debug_header = parse_header_name("allow_debug_header", &self.allow_debug_header)?;
        let request_id_header = parse_header_name("request_id_header", &self.request_id_header)?;

        let allow_list = self
            .show_debug_for_ips
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse::<IpAddr>()
                    .map(|ip| ip.to_canonical())
                    .map_err(|source| ConfigError::InvalidAddress {
                        value: raw.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let auth_challenge = HeaderValue::from_str(&self.auth_challenge)
            .map_err(|_| ConfigError::InvalidAuthChallenge)?;

        let include_stack = self
            .include_stack
            .unwrap_or(self.env != EnvMode::Production);
        let max_stack_lines = self.max_stack_lines.unwrap_or(match self.env {
            EnvMode::Development => 0,
            EnvMode::Production | EnvMode::Test => DEFAULT_MAX_STACK_LINES,
        });

        Ok(Settings {
            env: self.env,
            include_stack,
            include_causes: self.include_causes,
            max_stack_lines,
            debug_header,
            request_id_header,
            allow_list,
            disable_debug: self.disable_debug,
            auth_challenge,
        })
    }
}

fn parse_header_name(field: &'static str, value: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(value.trim().as_bytes()).map_err(|_| ConfigError::InvalidHeaderName {
        field,
        value: value.to_owned(),
    })
}

/// Resolved, immutable error handler settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: EnvMode,
    pub include_stack: bool,
    pub include_causes: usize,
    /// 0 = unbounded
    pub max_stack_lines: usize,
    pub debug_header: HeaderName,
    pub request_id_header: HeaderName,
    pub allow_list: Vec<IpAddr>,
    pub disable_debug: bool,
    pub auth_challenge: HeaderValue,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: EnvMode::Production,
            include_stack: false,
            include_causes: 0,
            max_stack_lines: DEFAULT_MAX_STACK_LINES,
            debug_header: HeaderName::from_static(DEFAULT_DEBUG_HEADER),
            request_id_header: X_REQUEST_ID,
            allow_list: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            disable_debug: false,
            auth_challenge: HeaderValue::from_static(DEFAULT_AUTH_CHALLENGE),
        }
    }
}
