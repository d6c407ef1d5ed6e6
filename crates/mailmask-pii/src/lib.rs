//! mailmask PII - Sensitive data detection and masking
//!
//! Finds PII/PCI spans in free text with deterministic rules, resolves
//! conflicts between detectors and rewrites the text with typed
//! placeholders.
//!
//! Pipeline: detectors -> conflict resolver -> masker.

use mailmask_core::{EntityType, MailmaskError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod detectors;
pub mod engine;
pub mod masker;
pub mod normalize;
pub mod resolver;

pub use detectors::{CvvDetector, GenericDetector, PatternDetector};
pub use engine::PiiEngine;
pub use masker::{mask, unmask, MaskedEntity, MaskedOutput};
pub use normalize::TextNormalizer;
pub use resolver::ConflictResolver;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised inside the detection and masking pipeline
#[derive(Error, Debug)]
pub enum PiiError {
    #[error("Detector {name} failed: {message}")]
    Detector { name: String, message: String },

    #[error("Invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Resolver invariant violated: {0}")]
    ResolverInvariant(String),

    #[error("Cannot reconstruct text: {0}")]
    Reconstruction(String),
}

impl From<PiiError> for MailmaskError {
    fn from(err: PiiError) -> Self {
        MailmaskError::Masking(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PiiError>;

// ============================================================================
// Spans and Entities
// ============================================================================

/// Half-open byte range `[start, end)` into the original text
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the two spans share at least one byte
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Non-empty, inside `text` and on char boundaries
    pub fn is_valid_in(&self, text: &str) -> bool {
        !self.is_empty()
            && self.end <= text.len()
            && text.is_char_boundary(self.start)
            && text.is_char_boundary(self.end)
    }
}

impl From<regex::Match<'_>> for Span {
    fn from(m: regex::Match<'_>) -> Self {
        Self::new(m.start(), m.end())
    }
}

/// Unresolved detection emitted by a single detector
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub span: Span,
    pub entity_type: EntityType,
    /// Name of the detector that produced it
    pub source: &'static str,
    pub score: f32,
}

impl Candidate {
    pub fn new(span: Span, entity_type: EntityType, source: &'static str, score: f32) -> Self {
        Self {
            span,
            entity_type,
            source,
            score,
        }
    }
}

/// Candidate that survived conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub span: Span,
    pub entity_type: EntityType,
}

// ============================================================================
// Detector Traits
// ============================================================================

/// Independent recognizer scanning the whole text
pub trait Detector: Send + Sync {
    /// Name used in logs and on emitted candidates
    fn name(&self) -> &'static str;

    /// Return every candidate found; an empty vector when nothing matches
    fn detect(&self, text: &str) -> Result<Vec<Candidate>>;
}

/// Recognizer that needs to know which spans other detectors already claimed
pub trait ContextualDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, text: &str, claimed: &[Span]) -> Result<Vec<Candidate>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap() {
        let a = Span::new(0, 5);
        assert!(a.overlaps(&Span::new(4, 8)));
        assert!(!a.overlaps(&Span::new(5, 8)));
        assert!(Span::new(2, 3).overlaps(&a));
    }

    #[test]
    fn test_span_validity() {
        let text = "héllo";
        assert!(Span::new(0, 1).is_valid_in(text));
        // 'é' is two bytes wide
        assert!(!Span::new(0, 2).is_valid_in(text));
        assert!(!Span::new(3, 3).is_valid_in(text));
        assert!(!Span::new(4, 10).is_valid_in(text));
    }

    #[test]
    fn test_pii_error_maps_to_masking_failure() {
        let err: MailmaskError = PiiError::ResolverInvariant("overlap".to_string()).into();
        assert!(matches!(err, MailmaskError::Masking(_)));
    }
}
