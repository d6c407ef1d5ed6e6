//! mailmask Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout mailmask:
//! - Sensitive entity taxonomy and support-email categories
//! - Common error types
//! - The classifier collaborator trait
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ClassifierConfig, ClassifierProvider, ConfigError, LoggingConfig, PiiConfig,
    ServerConfig,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for mailmask operations
#[derive(Error, Debug)]
pub enum MailmaskError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Masking failed: {0}")]
    Masking(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for MailmaskError {
    fn from(err: ConfigError) -> Self {
        MailmaskError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailmaskError>;

// ============================================================================
// Entity Taxonomy
// ============================================================================

/// Kinds of sensitive data that get masked in an email body
///
/// The serialized (snake_case) name doubles as the placeholder tag, so
/// `EntityType::Email` is rendered as `[email]` in masked text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    FullName,
    Email,
    PhoneNumber,
    Dob,
    AadharNum,
    CreditDebitNo,
    CvvNo,
    ExpiryNo,
}

impl EntityType {
    /// Every entity type, in a stable order
    pub const ALL: [EntityType; 8] = [
        Self::FullName,
        Self::Email,
        Self::PhoneNumber,
        Self::Dob,
        Self::AadharNum,
        Self::CreditDebitNo,
        Self::CvvNo,
        Self::ExpiryNo,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::PhoneNumber => "phone_number",
            Self::Dob => "dob",
            Self::AadharNum => "aadhar_num",
            Self::CreditDebitNo => "credit_debit_no",
            Self::CvvNo => "cvv_no",
            Self::ExpiryNo => "expiry_no",
        }
    }

    /// Placeholder that replaces an entity of this type in masked text
    pub fn placeholder(&self) -> String {
        format!("[{}]", self.as_str())
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = MailmaskError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| MailmaskError::InvalidInput(format!("unknown entity type: {s}")))
    }
}

// ============================================================================
// Email Categories
// ============================================================================

/// Support-email category predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Incident,
    Request,
    Change,
    Problem,
}

impl Category {
    /// Categories in the order of the classification head's logits
    pub const ALL: [Category; 4] = [
        Self::Incident,
        Self::Request,
        Self::Change,
        Self::Problem,
    ];

    /// Map a classification head index to its category
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "Incident",
            Self::Request => "Request",
            Self::Change => "Change",
            Self::Problem => "Problem",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = MailmaskError;

    /// Accepts category names (any case) and `LABEL_<n>` head indices
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Some(index) = trimmed
            .strip_prefix("LABEL_")
            .and_then(|n| n.parse::<usize>().ok())
        {
            return Self::from_index(index).ok_or_else(|| {
                MailmaskError::Classification(format!("label index out of range: {trimmed}"))
            });
        }

        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| MailmaskError::Classification(format!("unknown label: {trimmed}")))
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Email classifier interface
///
/// Implementations are built once at startup and shared read-only across
/// requests; `classify` must not mutate model state.
#[async_trait]
pub trait EmailClassifier: Send + Sync {
    /// Predict the category of an email body
    async fn classify(&self, text: &str) -> Result<Category>;

    /// Short identifier used in logs and readiness checks
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(Category);

    #[async_trait]
    impl EmailClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<Category> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_entity_type_placeholder() {
        assert_eq!(EntityType::Email.placeholder(), "[email]");
        assert_eq!(EntityType::CreditDebitNo.placeholder(), "[credit_debit_no]");
        assert_eq!(EntityType::FullName.to_string(), "full_name");
    }

    #[test]
    fn test_entity_type_serde_matches_as_str() {
        for entity_type in EntityType::ALL {
            let json = serde_json::to_string(&entity_type).unwrap();
            assert_eq!(json, format!("\"{}\"", entity_type.as_str()));
        }
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("cvv_no".parse::<EntityType>().unwrap(), EntityType::CvvNo);
        assert_eq!(" DOB ".parse::<EntityType>().unwrap(), EntityType::Dob);
        assert!("ssn".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_category_from_index() {
        assert_eq!(Category::from_index(0), Some(Category::Incident));
        assert_eq!(Category::from_index(3), Some(Category::Problem));
        assert_eq!(Category::from_index(4), None);
    }

    #[test]
    fn test_category_parse_labels() {
        assert_eq!("LABEL_1".parse::<Category>().unwrap(), Category::Request);
        assert_eq!("change".parse::<Category>().unwrap(), Category::Change);
        assert!("LABEL_9".parse::<Category>().is_err());
        assert!("Question".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_as_name() {
        let json = serde_json::to_string(&Category::Incident).unwrap();
        assert_eq!(json, "\"Incident\"");
    }

    #[test]
    fn test_classifier_trait_object() {
        let classifier: Box<dyn EmailClassifier> = Box::new(FixedClassifier(Category::Change));
        let category = tokio_test::block_on(classifier.classify("anything")).unwrap();
        assert_eq!(category, Category::Change);
        assert_eq!(classifier.name(), "fixed");
    }
}
