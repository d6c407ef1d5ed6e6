//! mailmask Pipeline - Support email processing orchestrator
//!
//! Runs one email body through the full pipeline:
//! - Input validation and normalization
//! - PII/PCI masking (detect, resolve, mask)
//! - Category prediction on the normalized, unmasked text
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Instant;

use mailmask_core::{AppConfig, Category, EmailClassifier, MailmaskError, Result};
use mailmask_pii::{MaskedEntity, MaskedOutput, PiiEngine};
use serde::{Deserialize, Serialize};

pub mod classifier;

pub use classifier::{create_classifier, KeywordClassifier, RemoteClassifier};

// ============================================================================
// Results
// ============================================================================

/// Masking and classification result for one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEmail {
    /// Body exactly as received
    pub input_email_body: String,
    /// Masked entities, positioned in the normalized body
    pub list_of_masked_entities: Vec<MaskedEntity>,
    pub masked_email: String,
    pub category_of_the_email: Category,
}

/// Masking-only result for one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedEmail {
    pub input_email_body: String,
    pub list_of_masked_entities: Vec<MaskedEntity>,
    pub masked_email: String,
}

// ============================================================================
// Email Processor
// ============================================================================

/// Masks and classifies support emails
///
/// Both the engine and the classifier are built once and shared read-only.
pub struct EmailProcessor {
    engine: Arc<PiiEngine>,
    classifier: Arc<dyn EmailClassifier>,
}

impl EmailProcessor {
    pub fn new(engine: Arc<PiiEngine>, classifier: Arc<dyn EmailClassifier>) -> Self {
        Self { engine, classifier }
    }

    /// Build the engine and classifier described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = PiiEngine::new(config.pii.clone())?;
        let classifier = create_classifier(&config.classifier)?;
        Ok(Self::new(Arc::new(engine), classifier))
    }

    /// Name of the configured classifier
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Mask an email body without classifying it
    pub fn mask_only(&self, body: &str) -> Result<MaskedEmail> {
        let output = self.mask_body(body)?;

        Ok(MaskedEmail {
            input_email_body: body.to_string(),
            list_of_masked_entities: output.entities,
            masked_email: output.masked_text,
        })
    }

    /// Mask an email body and predict its category
    pub async fn process(&self, body: &str) -> Result<ProcessedEmail> {
        let start = Instant::now();
        let output = self.mask_body(body)?;

        // Classification runs on the normalized, unmasked body
        let category = self
            .classifier
            .classify(&output.original_text)
            .await
            .map_err(|e| match e {
                MailmaskError::Classification(_) => e,
                other => MailmaskError::Classification(other.to_string()),
            })?;

        tracing::info!(
            entities = output.entities.len(),
            category = %category,
            classifier = self.classifier.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Email processed"
        );

        Ok(ProcessedEmail {
            input_email_body: body.to_string(),
            list_of_masked_entities: output.entities,
            masked_email: output.masked_text,
            category_of_the_email: category,
        })
    }

    fn mask_body(&self, body: &str) -> Result<MaskedOutput> {
        if body.trim().is_empty() {
            return Err(MailmaskError::InvalidInput(
                "input_email_body must not be empty".to_string(),
            ));
        }

        let normalized = self.engine.normalize(body);
        let output = self.engine.mask(&normalized)?;

        let types: Vec<&str> = output
            .entities
            .iter()
            .map(|e| e.classification.as_str())
            .collect();
        tracing::debug!(count = types.len(), types = ?types, "Masked entities");

        Ok(output)
    }
}
