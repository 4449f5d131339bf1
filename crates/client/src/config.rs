//! Client configuration, loaded from TOML.
//!
//! ```toml
//! base_url = "https://api.github.com/"
//! timeout_secs = 30
//! user_agent = "courier/0.1"
//! validate_eagerly = true
//!
//! [default_headers]
//! accept = "application/vnd.github+json"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transport::HttpSettings;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed client config")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Every declared path is resolved against this URL. Must end in `/`.
    pub base_url: Url,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Build every declared method when the client is created, so that a bad
    /// declaration fails at startup rather than on first use.
    #[serde(default)]
    pub validate_eagerly: bool,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Result<Self, ConfigLoadError> {
        let config = Self {
            base_url,
            timeout_secs: None,
            user_agent: None,
            default_headers: BTreeMap::new(),
            validate_eagerly: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the base URL, re-checking it.
    pub fn with_base_url(mut self, base_url: Url) -> Result<Self, ConfigLoadError> {
        self.base_url = base_url;
        self.validate()?;
        Ok(self)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: self.timeout_secs.map(Duration::from_secs),
            user_agent: self.user_agent.clone(),
            default_headers: self
                .default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        let invalid = |reason: &str| ConfigLoadError::InvalidBaseUrl {
            url: self.base_url.to_string(),
            reason: reason.to_owned(),
        };
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if !self.base_url.path().ends_with('/') {
            return Err(invalid("base URL must end in /"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ClientConfig::from_toml_str(r#"base_url = "https://api.github.com/""#).unwrap();
        assert_eq!(config.base_url.as_str(), "https://api.github.com/");
        assert_eq!(config.timeout_secs, None);
        assert!(!config.validate_eagerly);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn full_config_maps_to_http_settings() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://api.github.com/v3/"
            timeout_secs = 10
            user_agent = "courier/0.1"
            validate_eagerly = true

            [default_headers]
            accept = "application/json"
            "#,
        )
        .unwrap();
        assert!(config.validate_eagerly);

        let settings = config.http_settings();
        assert_eq!(settings.timeout, Some(Duration::from_secs(10)));
        assert_eq!(settings.user_agent.as_deref(), Some("courier/0.1"));
        assert_eq!(
            settings.default_headers,
            vec![("accept".to_owned(), "application/json".to_owned())]
        );
    }

    #[test]
    fn base_url_must_end_in_slash() {
        let err = ClientConfig::from_toml_str(r#"base_url = "https://api.github.com/v3""#).unwrap_err();
        assert!(matches!(err, ConfigLoadError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn base_url_must_be_http() {
        let url = Url::parse("ftp://files.example.com/").unwrap();
        assert!(ClientConfig::new(url).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClientConfig::from_toml_str(
            r#"
            base_url = "https://api.github.com/"
            retries = 3
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
