//! Runtime settings.
//!
//! Settings are read once from a TOML file, validated, and then passed around
//! by reference. Every section and every key is optional:
//!
//! ```toml
//! [matching]
//! threshold = 0.9
//!
//! [eutils]
//! api_key = "..."
//! email = "reviews@example.org"
//!
//! [screening]
//! allowed_languages = ["eng", "dut"]
//!
//! [logging]
//! file = "refscreen.log"
//! filter = "refscreen=debug"
//! ```

use crate::error::ConfigError;
use crate::select::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Public E-utilities endpoint.
pub const DEFAULT_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// All settings, one field per TOML section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub matching: MatchPolicy,
    pub eutils: EUtilsConfig,
    pub screening: ScreeningConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Read and validate settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matching.validate().map_err(ConfigError::Invalid)?;
        self.eutils.validate().map_err(ConfigError::Invalid)?;
        self.screening.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

/// The `[eutils]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EUtilsConfig {
    pub base_url: String,
    /// Maximum ids returned per search
    pub retmax: usize,
    pub api_key: Option<String>,
    /// Sent as the `tool` parameter NCBI asks clients to identify with
    pub tool: Option<String>,
    pub email: Option<String>,
    pub timeout_secs: u64,
    /// Overrides the request rate NCBI allows for the key (or lack of one)
    pub max_requests_per_second: Option<f64>,
}

impl Default for EUtilsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EUTILS_URL.to_string(),
            retmax: 20,
            api_key: None,
            tool: Some(env!("CARGO_PKG_NAME").to_string()),
            email: None,
            timeout_secs: 30,
            max_requests_per_second: None,
        }
    }
}

impl EUtilsConfig {
    /// Requests per second: the override when set, otherwise 10 with an API
    /// key and 3 without.
    pub fn requests_per_second(&self) -> f64 {
        match (self.max_requests_per_second, &self.api_key) {
            (Some(rate), _) => rate,
            (None, Some(_)) => 10.0,
            (None, None) => 3.0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.retmax == 0 {
            return Err("eutils.retmax must be at least 1".to_string());
        }
        if self.base_url.trim().is_empty() {
            return Err("eutils.base_url must not be empty".to_string());
        }
        if let Some(rate) = self.max_requests_per_second
            && !rate.is_finite()
        {
            return Err(format!(
                "eutils.max_requests_per_second must be a number, got {rate}"
            ));
        }
        Ok(())
    }
}

/// The `[screening]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Language values kept by the language filter
    pub allowed_languages: Vec<String>,
    /// ISO 639-3 codes kept when the language is detected from the
    /// original publication text
    pub detected_languages: Vec<String>,
    pub doi_url_prefix: String,
    /// Mark which records the institution has full-text access to
    pub only_full_texts: bool,
    /// WorldCat site of the institution, e.g. `https://uni.on.worldcat.org`
    pub institution_worldcat_url: Option<String>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            allowed_languages: ["eng", "dut", "ger", "English"]
                .map(String::from)
                .to_vec(),
            detected_languages: ["eng", "deu", "nld"].map(String::from).to_vec(),
            doi_url_prefix: "https://www.doi.org/".to_string(),
            only_full_texts: false,
            institution_worldcat_url: None,
        }
    }
}

impl ScreeningConfig {
    /// The institution URL, when the full-text check is switched on.
    pub fn full_text_url(&self) -> Option<&str> {
        if !self.only_full_texts {
            return None;
        }
        self.institution_worldcat_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    fn validate(&self) -> Result<(), String> {
        if self.only_full_texts && self.full_text_url().is_none() {
            return Err(
                "screening.only_full_texts requires screening.institution_worldcat_url"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// The `[logging]` section. Used by the command-line binary only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file appended to in addition to stderr
    pub file: Option<PathBuf>,
    /// `tracing-subscriber` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            filter: "info".to_string(),
        }
    }
}
