//! mailmask Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::EntityType;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// PII detection and masking configuration
    pub pii: PiiConfig,

    /// Classifier collaborator configuration
    pub classifier: ClassifierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_var("API_PORT", port)?;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // PII
        if let Ok(value) = std::env::var("PII_NORMALIZE_INPUT") {
            self.pii.normalize_input = parse_var("PII_NORMALIZE_INPUT", value)?;
        }
        if let Ok(value) = std::env::var("PII_PARALLEL_DETECTION") {
            self.pii.parallel_detection = parse_var("PII_PARALLEL_DETECTION", value)?;
        }
        if let Ok(value) = std::env::var("PII_ENABLED_ENTITIES") {
            self.pii.enabled_entities = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<EntityType>()
                        .map_err(|_| ConfigError::InvalidValue {
                            key: "PII_ENABLED_ENTITIES".to_string(),
                            value: s.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }

        // Classifier
        if let Ok(provider) = std::env::var("CLASSIFIER_PROVIDER") {
            self.classifier.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("CLASSIFIER_URL") {
            self.classifier.endpoint = Some(url);
        }
        if let Ok(token) = std::env::var("CLASSIFIER_API_TOKEN") {
            self.classifier.api_token = Some(token);
        }
        if let Ok(value) = std::env::var("CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_var("CLASSIFIER_TIMEOUT_SECS", value)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(value) = std::env::var("LOG_JSON") {
            self.logging.json_format = parse_var("LOG_JSON", value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pii.phone_min_digits == 0 || self.pii.phone_min_digits > self.pii.phone_max_digits
        {
            return Err(ConfigError::InvalidValue {
                key: "pii.phone_min_digits".to_string(),
                value: format!(
                    "{}..={}",
                    self.pii.phone_min_digits, self.pii.phone_max_digits
                ),
            });
        }
        if self.pii.cvv_window_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pii.cvv_window_tokens".to_string(),
                value: "0".to_string(),
            });
        }
        if self.classifier.provider == ClassifierProvider::Remote
            && self.classifier.endpoint.is_none()
        {
            return Err(ConfigError::MissingRequired("classifier.endpoint".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_enabled: true,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// PII detection and masking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    /// Strip HTML tags and collapse whitespace before detection
    pub normalize_input: bool,

    /// Minimum national digits for a phone number
    pub phone_min_digits: usize,

    /// Maximum national digits for a phone number
    pub phone_max_digits: usize,

    /// Tokens scanned after a CVV keyword
    pub cvv_window_tokens: usize,

    /// Characters scanned after a CVV keyword
    pub cvv_window_chars: usize,

    /// Characters searched on each side of a date for DOB/expiry keywords
    pub date_context_chars: usize,

    /// Run independent detectors on scoped threads
    pub parallel_detection: bool,

    /// Entity types to mask
    pub enabled_entities: Vec<EntityType>,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            normalize_input: true,
            phone_min_digits: 10,
            phone_max_digits: 10,
            cvv_window_tokens: 5,
            cvv_window_chars: 40,
            date_context_chars: 30,
            parallel_detection: false,
            enabled_entities: EntityType::ALL.to_vec(),
        }
    }
}

impl PiiConfig {
    /// Whether an entity type should be detected and masked
    pub fn is_enabled(&self, entity_type: EntityType) -> bool {
        self.enabled_entities.contains(&entity_type)
    }
}

/// Classifier collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Classifier backend to use
    pub provider: ClassifierProvider,

    /// Text-classification inference endpoint (remote provider)
    pub endpoint: Option<String>,

    /// Bearer token for the inference endpoint
    pub api_token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Characters sent to the model; longer bodies are truncated
    pub max_input_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::Keyword,
            endpoint: None,
            api_token: None,
            timeout_secs: 30,
            // ~512 model tokens
            max_input_chars: 2048,
        }
    }
}

/// Supported classifier backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    /// Hosted fine-tuned sequence classifier reached over HTTP
    Remote,
    /// Deterministic keyword scoring, no model required
    Keyword,
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "keyword" => Ok(Self::Keyword),
            _ => Err(ConfigError::InvalidValue {
                key: "CLASSIFIER_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pii.phone_min_digits, 10);
        assert_eq!(config.classifier.provider, ClassifierProvider::Keyword);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_classifier_provider_parse() {
        assert_eq!(
            "remote".parse::<ClassifierProvider>().unwrap(),
            ClassifierProvider::Remote
        );
        assert_eq!(
            "KEYWORD".parse::<ClassifierProvider>().unwrap(),
            ClassifierProvider::Keyword
        );
        assert!("torch".parse::<ClassifierProvider>().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [pii]
            phone_max_digits = 12
            enabled_entities = ["email", "cvv_no"]

            [classifier]
            provider = "remote"
            endpoint = "http://localhost:9000/classify"
            "#,
        )
        .unwrap();

        assert_eq!(config.pii.phone_max_digits, 12);
        assert_eq!(config.pii.phone_min_digits, 10);
        assert!(config.pii.is_enabled(EntityType::CvvNo));
        assert!(!config.pii.is_enabled(EntityType::FullName));
        assert_eq!(config.classifier.provider, ClassifierProvider::Remote);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_phone_range() {
        let mut config = AppConfig::default();
        config.pii.phone_min_digits = 12;
        config.pii.phone_max_digits = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_requires_remote_endpoint() {
        let mut config = AppConfig::default();
        config.classifier.provider = ClassifierProvider::Remote;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
