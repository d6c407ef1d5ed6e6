//! Email classifier implementations
//!
//! Provides a remote text-classification client for a hosted fine-tuned
//! model and an offline keyword classifier.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailmask_core::{
    Category, ClassifierConfig, ClassifierProvider, EmailClassifier, MailmaskError, Result,
};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Remote Classifier
// ============================================================================

/// Client for a hosted text-classification inference endpoint
pub struct RemoteClassifier {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    max_input_chars: usize,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Endpoints answer either per input (nested) or flat for a single input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl InferenceResponse {
    /// Highest-scoring label mapped to a category
    fn best_category(self) -> Result<Category> {
        let scores = match self {
            Self::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
            Self::Flat(scores) => scores,
        };

        scores
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| MailmaskError::Classification("No label returned".to_string()))?
            .label
            .parse()
    }
}

impl RemoteClassifier {
    /// Create a new remote classifier
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailmaskError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token: None,
            max_input_chars: ClassifierConfig::default().max_input_chars,
        })
    }

    /// Create from config
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let endpoint = config.endpoint.as_ref().ok_or_else(|| {
            MailmaskError::Config("Classifier endpoint required for remote provider".to_string())
        })?;

        let mut classifier = Self::new(endpoint.clone(), Duration::from_secs(config.timeout_secs))?
            .with_max_input_chars(config.max_input_chars);
        classifier.api_token = config.api_token.clone();
        Ok(classifier)
    }

    /// Set bearer token
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set how many characters are sent to the model
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }
}

#[async_trait]
impl EmailClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<Category> {
        let request = InferenceRequest {
            inputs: truncate_chars(text, self.max_input_chars),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MailmaskError::Classification(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MailmaskError::Classification(format!(
                "Inference endpoint returned {status}: {error_text}"
            )));
        }

        let result: InferenceResponse = response.json().await.map_err(|e| {
            MailmaskError::Classification(format!("Failed to parse response: {e}"))
        })?;

        result.best_category()
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Keyword Classifier
// ============================================================================

/// Keywords counted as evidence for each category
const CATEGORY_KEYWORDS: [(Category, &[&str]); 4] = [
    (
        Category::Incident,
        &[
            "outage", "down", "not working", "error", "errors", "crash", "crashed", "crashing",
            "failed", "failure", "broken", "unable", "cannot", "can't", "urgent", "stopped",
            "unavailable", "offline",
        ],
    ),
    (
        Category::Request,
        &[
            "request", "please", "need", "access", "reset", "would like", "could you",
            "can you", "provide", "information", "quote", "invoice", "help",
        ],
    ),
    (
        Category::Change,
        &[
            "change", "update", "upgrade", "modify", "migrate", "migration", "replace",
            "install", "configure", "switch", "rename", "downgrade",
        ],
    ),
    (
        Category::Problem,
        &[
            "recurring", "again", "root cause", "repeatedly", "intermittent", "intermittently",
            "keeps", "persistent", "every time", "investigate", "frequent", "frequently",
        ],
    ),
];

/// Deterministic classifier scoring keyword hits per category
///
/// Ties and bodies without any evidence fall back to `Request`.
pub struct KeywordClassifier {
    rules: Vec<(Category, Regex)>,
}

impl KeywordClassifier {
    pub fn new() -> Result<Self> {
        let rules = CATEGORY_KEYWORDS
            .iter()
            .map(|(category, keywords)| {
                let alternation = keywords
                    .iter()
                    .map(|k| regex::escape(k).replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
                    .map(|re| (*category, re))
                    .map_err(|e| MailmaskError::Config(format!("Invalid keyword rule: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Keyword hits per category, in rule order
    pub fn scores(&self, text: &str) -> Vec<(Category, usize)> {
        self.rules
            .iter()
            .map(|(category, re)| (*category, re.find_iter(text).count()))
            .collect()
    }
}

#[async_trait]
impl EmailClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Category> {
        let scores = self.scores(text);
        let best = scores.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let mut leaders = scores.iter().filter(|(_, n)| *n == best && best > 0);

        let category = match (leaders.next(), leaders.next()) {
            (Some((category, _)), None) => *category,
            _ => Category::Request,
        };

        tracing::debug!(category = %category, hits = best, "Keyword classification");
        Ok(category)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create the configured classifier
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn EmailClassifier>> {
    match config.provider {
        ClassifierProvider::Remote => Ok(Arc::new(RemoteClassifier::from_config(config)?)),
        ClassifierProvider::Keyword => Ok(Arc::new(KeywordClassifier::new()?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
