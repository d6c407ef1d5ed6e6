//! PII engine: detection -> resolution -> masking

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use mailmask_core::PiiConfig;

use crate::detectors::{CvvDetector, GenericDetector, PatternDetector};
use crate::masker::{mask, MaskedOutput};
use crate::normalize::TextNormalizer;
use crate::resolver::ConflictResolver;
use crate::{Candidate, ContextualDetector, Detector, ResolvedEntity, Result, Span};

/// Outcome of one detector run; `Err` holds a panic payload
type DetectorOutcome = std::thread::Result<Result<Vec<Candidate>>>;

/// Detection and masking engine
///
/// Holds only compiled rules; shared read-only across requests.
pub struct PiiEngine {
    normalizer: TextNormalizer,
    detectors: Vec<Box<dyn Detector>>,
    contextual: Vec<Box<dyn ContextualDetector>>,
    resolver: ConflictResolver,
    config: PiiConfig,
}

impl PiiEngine {
    /// Build the engine with the default rule set
    pub fn new(config: PiiConfig) -> Result<Self> {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(GenericDetector::new()?),
            Box::new(PatternDetector::aadhar()?),
            Box::new(PatternDetector::card()?),
            Box::new(PatternDetector::expiry()?),
            Box::new(PatternDetector::dob()?),
            Box::new(PatternDetector::phone(
                config.phone_min_digits,
                config.phone_max_digits,
            )?),
        ];
        let contextual: Vec<Box<dyn ContextualDetector>> = vec![Box::new(CvvDetector::new(
            config.cvv_window_tokens,
            config.cvv_window_chars,
        )?)];

        Ok(Self {
            normalizer: TextNormalizer::new()?,
            detectors,
            contextual,
            resolver: ConflictResolver::new(config.date_context_chars)?,
            config,
        })
    }

    /// Engine with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(PiiConfig::default())
    }

    /// Register an additional independent detector
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Register an additional detector that runs after the independent ones
    pub fn with_contextual_detector(mut self, detector: Box<dyn ContextualDetector>) -> Self {
        self.contextual.push(detector);
        self
    }

    pub fn config(&self) -> &PiiConfig {
        &self.config
    }

    /// Apply input normalization if enabled
    pub fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.config.normalize_input {
            self.normalizer.clean(text)
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Run every detector and return the enabled candidates
    ///
    /// A failing detector is logged and contributes nothing.
    pub fn detect(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (name, outcome) in self.run_detectors(text) {
            collect_outcome(name, outcome, &mut candidates);
        }

        // Contextual detectors must not reuse anything already claimed
        let claimed: Vec<Span> = candidates.iter().map(|c| c.span).collect();
        for detector in &self.contextual {
            let outcome = catch_unwind(AssertUnwindSafe(|| detector.detect(text, &claimed)));
            collect_outcome(detector.name(), outcome, &mut candidates);
        }

        candidates.retain(|c| self.config.is_enabled(c.entity_type));
        candidates
    }

    /// Resolve candidates into the final non-overlapping entity set
    pub fn resolve(&self, text: &str, candidates: Vec<Candidate>) -> Result<Vec<ResolvedEntity>> {
        self.resolver.resolve(text, candidates)
    }

    /// Detect, resolve and mask `text`; positions refer to `text` as given
    pub fn mask(&self, text: &str) -> Result<MaskedOutput> {
        let start = Instant::now();

        let candidates = self.detect(text);
        let candidate_count = candidates.len();
        let resolved = self.resolve(text, candidates)?;
        let output = mask(text, &resolved)?;

        tracing::debug!(
            candidates = candidate_count,
            masked = output.entities.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Masked text"
        );

        Ok(output)
    }

    fn run_detectors(&self, text: &str) -> Vec<(&'static str, DetectorOutcome)> {
        if !self.config.parallel_detection {
            return self
                .detectors
                .iter()
                .map(|d| (d.name(), catch_unwind(AssertUnwindSafe(|| d.detect(text)))))
                .collect();
        }

        // Joined in registration order
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|d| (d.name(), scope.spawn(move || d.detect(text))))
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| (name, handle.join()))
                .collect()
        })
    }
}

fn collect_outcome(name: &str, outcome: DetectorOutcome, candidates: &mut Vec<Candidate>) {
    match outcome {
        Ok(Ok(found)) => {
            tracing::trace!(detector = name, found = found.len(), "Detector finished");
            candidates.extend(found);
        }
        Ok(Err(e)) => {
            tracing::warn!(detector = name, error = %e, "Detector failed, ignoring its results");
        }
        Err(_) => {
            tracing::warn!(detector = name, "Detector panicked, ignoring its results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PiiError;
    use mailmask_core::EntityType;

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _text: &str) -> Result<Vec<Candidate>> {
            Err(PiiError::Detector {
                name: "failing".to_string(),
                message: "broken state".to_string(),
            })
        }
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn detect(&self, _text: &str) -> Result<Vec<Candidate>> {
            panic!("unexpected character class")
        }
    }

    struct PanickingContextualDetector;

    impl ContextualDetector for PanickingContextualDetector {
        fn name(&self) -> &'static str {
            "panicking_contextual"
        }

        fn detect(&self, _text: &str, _claimed: &[Span]) -> Result<Vec<Candidate>> {
            panic!("window overflow")
        }
    }

    fn classifications(output: &MaskedOutput) -> Vec<(EntityType, &str)> {
        output
            .entities
            .iter()
            .map(|e| (e.classification, e.entity.as_str()))
            .collect()
    }

    #[test]
    fn test_failing_detector_is_ignored() {
        let engine = PiiEngine::with_defaults()
            .unwrap()
            .with_detector(Box::new(FailingDetector));
        let output = engine.mask("My email is a@b.com").unwrap();
        assert_eq!(output.masked_text, "My email is [email]");
    }

    #[test]
    fn test_panicking_detector_is_ignored_in_parallel_mode() {
        let config = PiiConfig {
            parallel_detection: true,
            ..PiiConfig::default()
        };
        let engine = PiiEngine::new(config)
            .unwrap()
            .with_detector(Box::new(PanickingDetector));
        let output = engine.mask("call 555-123-4567").unwrap();
        assert_eq!(output.masked_text, "call [phone_number]");
    }

    #[test]
    fn test_panicking_detector_is_ignored_in_sequential_mode() {
        let engine = PiiEngine::with_defaults()
            .unwrap()
            .with_detector(Box::new(PanickingDetector));
        assert!(!engine.config().parallel_detection);

        let output = engine.mask("mail a@b.com").unwrap();
        assert_eq!(output.masked_text, "mail [email]");
    }

    #[test]
    fn test_panicking_contextual_detector_is_ignored() {
        for parallel_detection in [false, true] {
            let engine = PiiEngine::new(PiiConfig {
                parallel_detection,
                ..PiiConfig::default()
            })
            .unwrap()
            .with_contextual_detector(Box::new(PanickingContextualDetector));

            let output = engine.mask("CVV 123 for card ending 4567-8901-2345-6789").unwrap();
            assert_eq!(
                output.masked_text,
                "CVV [cvv_no] for card ending [credit_debit_no]"
            );
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let text = "Dear Anna Bell, card 4111 1111 1111 1111 exp 09/27 CVV 321, \
                    dob 12-08-1991, aadhar 2345 6789 0123, call +91 98765 43210";
        let sequential = PiiEngine::with_defaults().unwrap().mask(text).unwrap();
        let parallel = PiiEngine::new(PiiConfig {
            parallel_detection: true,
            ..PiiConfig::default()
        })
        .unwrap()
        .mask(text)
        .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_disabled_entities_are_not_masked() {
        let config = PiiConfig {
            enabled_entities: vec![EntityType::Email],
            ..PiiConfig::default()
        };
        let engine = PiiEngine::new(config).unwrap();
        let output = engine.mask("mail a@b.com or call 555-123-4567").unwrap();
        assert_eq!(output.masked_text, "mail [email] or call 555-123-4567");
    }

    #[test]
    fn test_disabled_card_still_blocks_cvv_reuse() {
        let config = PiiConfig {
            enabled_entities: vec![EntityType::CvvNo],
            ..PiiConfig::default()
        };
        let engine = PiiEngine::new(config).unwrap();
        let output = engine.mask("CVV for 4567 8901 2345 6789 is 321").unwrap();
        assert_eq!(classifications(&output), vec![(EntityType::CvvNo, "321")]);
    }

    #[test]
    fn test_normalize_respects_config() {
        let engine = PiiEngine::with_defaults().unwrap();
        assert_eq!(engine.normalize("<b>hi</b>   there"), "hi there");

        let raw = PiiEngine::new(PiiConfig {
            normalize_input: false,
            ..PiiConfig::default()
        })
        .unwrap();
        assert_eq!(raw.normalize("<b>hi</b>   there"), "<b>hi</b>   there");
    }

    #[test]
    fn test_full_mix() {
        let text = "Dear Anna Bell, card 4111 1111 1111 1111 exp 09/27 CVV 321, \
                    dob 12-08-1991, aadhar 2345 6789 0123, call +91 98765 43210";
        let output = PiiEngine::with_defaults().unwrap().mask(text).unwrap();

        assert_eq!(
            classifications(&output),
            vec![
                (EntityType::FullName, "Anna Bell"),
                (EntityType::CreditDebitNo, "4111 1111 1111 1111"),
                (EntityType::ExpiryNo, "09/27"),
                (EntityType::CvvNo, "321"),
                (EntityType::Dob, "12-08-1991"),
                (EntityType::AadharNum, "2345 6789 0123"),
                (EntityType::PhoneNumber, "+91 98765 43210"),
            ]
        );
        assert_eq!(
            output.masked_text,
            "Dear [full_name], card [credit_debit_no] exp [expiry_no] CVV [cvv_no], \
             dob [dob], aadhar [aadhar_num], call [phone_number]"
        );
    }
}
