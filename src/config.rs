//! # Config
//!
//! Credentials, region and timeouts used to construct the CloudWatch clients

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// CloudWatch region used when none is supplied
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connect and request timeout used when none is supplied
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Static AWS user credentials
///
/// <http://docs.aws.amazon.com/general/latest/gr/managing-aws-access-keys.html>
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            credentials: None,
            connect_timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the standard AWS environment variables
    pub fn from_env() -> Self {
        let credentials = match (std::env::var("AWS_ACCESS_KEY_ID"), std::env::var("AWS_SECRET_ACCESS_KEY")) {
            (Ok(access_key_id), Ok(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            }),
            _ => None,
        };

        Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| default_region()),
            credentials,
            connect_timeout_ms: std::env::var("CLOUDWATCH_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            request_timeout_ms: std::env::var("CLOUDWATCH_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Validation("region must not be empty".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation("timeouts must be greater than zero".to_string()));
        }
        if let Some(credentials) = &self.credentials {
            if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
                return Err(ConfigError::Validation(
                    "credentials need both an access key id and a secret".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn parses_credentials() {
        let config = ClientConfig::from_json(
            r#"{"region":"eu-west-1","credentials":{"access_key_id":"AKIA","secret_access_key":"shh"},"connect_timeout_ms":2500}"#,
        )
        .unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.credentials, Some(Credentials::new("AKIA", "shh")));
        assert_eq!(config.connect_timeout(), Duration::from_millis(2500));
        assert_eq!(config.request_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn rejects_invalid() {
        assert!(matches!(
            ClientConfig::from_json(r#"{"region":""}"#),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"request_timeout_ms":0}"#),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(ClientConfig::from_json("not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", Credentials::new("AKIA", "very-secret"));
        assert!(debug.contains("AKIA"));
        assert!(!debug.contains("very-secret"));
    }
}
