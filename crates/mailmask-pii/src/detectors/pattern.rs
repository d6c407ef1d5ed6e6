//! Deterministic pattern detectors for structured identifiers

use regex::{Match, Regex};

use super::{digit_count, has_consistent_separators, is_isolated_digit_run};
use crate::{Candidate, Detector, Result, Span};
use mailmask_core::EntityType;

/// Post-match check; returns the final score or `None` to reject the match
type Validator = Box<dyn Fn(&str, &Match<'_>, f32) -> Option<f32> + Send + Sync>;

/// Regex-based detector for one entity type
pub struct PatternDetector {
    name: &'static str,
    entity_type: EntityType,
    /// Pattern rules (regex, base score)
    patterns: Vec<(Regex, f32)>,
    validator: Option<Validator>,
}

impl PatternDetector {
    /// Create an empty detector; add rules with [`with_pattern`](Self::with_pattern)
    pub fn new(name: &'static str, entity_type: EntityType) -> Self {
        Self {
            name,
            entity_type,
            patterns: Vec::new(),
            validator: None,
        }
    }

    /// Add a regex rule
    pub fn with_pattern(mut self, pattern: &str, score: f32) -> Result<Self> {
        self.patterns.push((Regex::new(pattern)?, score));
        Ok(self)
    }

    /// Set the post-match validator
    pub fn with_validator(
        mut self,
        validator: impl Fn(&str, &Match<'_>, f32) -> Option<f32> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Aadhar numbers: 12 digits, grouped 4-4-4 or ungrouped
    ///
    /// An ungrouped 12-digit run is always treated as Aadhar since card
    /// numbers need at least 13 digits.
    pub fn aadhar() -> Result<Self> {
        Ok(Self::new("aadhar", EntityType::AadharNum)
            .with_pattern(r"\b(?:\d{4} \d{4} \d{4}|\d{4}-\d{4}-\d{4}|\d{12})\b", 0.9)?
            .with_validator(|text, m, score| {
                is_isolated_digit_run(text, m.start(), m.end(), &[' ', '-']).then_some(score)
            }))
    }

    /// Credit/debit card numbers with validated group structure
    ///
    /// The 4-4-4-4-3 form is only taken when the full number passes Luhn;
    /// otherwise the trailing group is left out and the leading 16 digits
    /// stand on their own.
    pub fn card() -> Result<Self> {
        Ok(Self::new("card", EntityType::CreditDebitNo)
            .with_pattern(
                r"\b(?:\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}|\d{4}[ -]\d{6}[ -]\d{5}|\d{13,19})\b",
                0.85,
            )?
            .with_pattern(r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{3}\b", 0.85)?
            .with_validator(|text, m, score| {
                let number = m.as_str();
                let digits = digit_count(number);
                if !(13..=19).contains(&digits) || !has_consistent_separators(number) {
                    return None;
                }

                let luhn = luhn_valid(number);
                let grouped = digits != number.len();
                if grouped && digits == 19 && !luhn {
                    return None;
                }

                let isolated = is_isolated_digit_run(text, m.start(), m.end(), &[' ', '-'])
                    || (grouped && digits == 16 && has_unconfirmed_tail(text, m));
                isolated.then_some(if luhn { 0.95 } else { score })
            }))
    }

    /// Card expiry dates: MM/YY, MM-YY, MM/YYYY, MM-YYYY
    pub fn expiry() -> Result<Self> {
        Ok(Self::new("expiry", EntityType::ExpiryNo)
            .with_pattern(r"\b(?:0[1-9]|1[0-2])[/-](?:\d{4}|\d{2})\b", 0.8)?
            .with_validator(|text, m, score| {
                is_isolated_digit_run(text, m.start(), m.end(), &['/', '-', '.']).then_some(score)
            }))
    }

    /// Full calendar dates: DD/MM/YYYY (also `-` and `.`) and ISO YYYY-MM-DD
    pub fn dob() -> Result<Self> {
        Ok(Self::new("dob", EntityType::Dob)
            .with_pattern(
                r"\b(?:0[1-9]|[12]\d|3[01])[-/.](?:0[1-9]|1[0-2])[-/.](?:19|20)\d{2}\b",
                0.9,
            )?
            .with_pattern(
                r"\b(?:19|20)\d{2}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01])\b",
                0.9,
            )?
            .with_validator(|text, m, score| {
                (has_consistent_separators(m.as_str())
                    && is_isolated_digit_run(text, m.start(), m.end(), &['/', '-', '.']))
                .then_some(score)
            }))
    }

    /// Phone numbers whose national part has `min_digits..=max_digits` digits
    pub fn phone(min_digits: usize, max_digits: usize) -> Result<Self> {
        let ungrouped = format!(r"(?:\+\d{{1,3}}[-\s]?)?\d{{{min_digits},{max_digits}}}");

        Ok(Self::new("phone", EntityType::PhoneNumber)
            // 3-3-4 with optional area code parentheses
            .with_pattern(
                r"(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
                0.8,
            )?
            // 5-5 (Indian mobile numbers)
            .with_pattern(r"(?:\+\d{1,3}[-\s]?)?\d{5}[-\s]\d{5}", 0.8)?
            .with_pattern(&ungrouped, 0.75)?
            .with_validator(move |text, m, score| {
                let matched = m.as_str();
                let digits = digit_count(matched);
                let national_ok = if matched.starts_with('+') {
                    // country code is 1-3 digits
                    (1..=3).any(|cc| {
                        digits > cc && (min_digits..=max_digits).contains(&(digits - cc))
                    })
                } else {
                    (min_digits..=max_digits).contains(&digits)
                };

                (national_ok && is_standalone(text, m.start(), m.end())).then_some(score)
            }))
    }

    fn extract_by_patterns(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (regex, score) in &self.patterns {
            for mat in regex.find_iter(text) {
                let score = match &self.validator {
                    Some(validate) => match validate(text, &mat, *score) {
                        Some(score) => score,
                        None => continue,
                    },
                    None => *score,
                };
                candidates.push(Candidate::new(
                    Span::from(mat),
                    self.entity_type,
                    self.name,
                    score,
                ));
            }
        }

        // Several rules can match the same span
        candidates.sort_by(|a, b| a.span.cmp(&b.span).then(b.score.total_cmp(&a.score)));
        candidates.dedup_by(|later, earlier| later.span == earlier.span);
        candidates
    }
}

impl Detector for PatternDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, text: &str) -> Result<Vec<Candidate>> {
        Ok(self.extract_by_patterns(text))
    }
}

/// Not touching letters or digits, and not part of a longer digit run
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let prev = text[..start].chars().next_back();
    let next = text[end..].chars().next();
    let touches_word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);

    !touches_word(prev)
        && !touches_word(next)
        && is_isolated_digit_run(text, start, end, &['-', '.', ' '])
}

/// True when a grouped 16-digit match is followed by a 3-digit group that
/// does not complete a Luhn-valid 19-digit number
fn has_unconfirmed_tail(text: &str, m: &Match<'_>) -> bool {
    let Some(separator) = m.as_str().bytes().find(|b| !b.is_ascii_digit()) else {
        return false;
    };
    let tail = &text.as_bytes()[m.end()..];
    if tail.len() < 4 || tail[0] != separator || !tail[1..4].iter().all(u8::is_ascii_digit) {
        return false;
    }

    let extended_end = m.end() + 4;
    is_isolated_digit_run(text, m.start(), extended_end, &[' ', '-'])
        && !luhn_valid(&text[m.start()..extended_end])
}

/// Luhn checksum over the digits of `number`
pub fn luhn_valid(number: &str) -> bool {
    let digits: Vec<u32> = number.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(detector: &PatternDetector, text: &str) -> Vec<String> {
        detector
            .detect(text)
            .unwrap()
            .iter()
            .map(|c| text[c.span.start..c.span.end].to_string())
            .collect()
    }

    #[test]
    fn test_aadhar_grouped_and_plain() {
        let detector = PatternDetector::aadhar().unwrap();
        assert_eq!(
            found(&detector, "My aadhar is 2345 6789 0123."),
            vec!["2345 6789 0123"]
        );
        assert_eq!(found(&detector, "aadhar 234567890123"), vec!["234567890123"]);
        assert_eq!(found(&detector, "id 2345-6789-0123 ok"), vec!["2345-6789-0123"]);
    }

    #[test]
    fn test_aadhar_rejects_part_of_card() {
        let detector = PatternDetector::aadhar().unwrap();
        assert!(found(&detector, "card 4567 8901 2345 6789").is_empty());
        assert!(found(&detector, "run 12345678901234").is_empty());
        assert!(found(&detector, "mixed 2345 6789-0123").is_empty());
    }

    #[test]
    fn test_card_group_structure() {
        let detector = PatternDetector::card().unwrap();
        assert_eq!(
            found(&detector, "card 4567-8901-2345-6789 please"),
            vec!["4567-8901-2345-6789"]
        );
        assert_eq!(found(&detector, "amex 3782 822463 10005"), vec!["3782 822463 10005"]);
        assert_eq!(found(&detector, "raw 4111111111111111"), vec!["4111111111111111"]);
        assert!(found(&detector, "bad 4567-8901 2345-6789").is_empty());
        assert!(found(&detector, "short 2345 6789 0123").is_empty());
    }

    #[test]
    fn test_card_trailing_group_needs_luhn() {
        let detector = PatternDetector::card().unwrap();
        assert_eq!(
            found(&detector, "Card 4567 8901 2345 6789 123 is what I have"),
            vec!["4567 8901 2345 6789"]
        );
        assert_eq!(
            found(&detector, "card 4111-1111-1111-1111-003 ok"),
            vec!["4111-1111-1111-1111-003"]
        );
        assert!(found(&detector, "card 4567 8901 2345 6789 1234").is_empty());
    }

    #[test]
    fn test_card_luhn_raises_score() {
        let detector = PatternDetector::card().unwrap();
        let valid = detector.detect("4111 1111 1111 1111").unwrap();
        let invalid = detector.detect("4111 1111 1111 1112").unwrap();
        assert_eq!(valid[0].score, 0.95);
        assert_eq!(invalid[0].score, 0.85);
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111-1111-1111-1111"));
        assert!(luhn_valid("378282246310005"));
        assert!(!luhn_valid("1234567812345678"));
        assert!(!luhn_valid("7"));
    }

    #[test]
    fn test_expiry_formats() {
        let detector = PatternDetector::expiry().unwrap();
        assert_eq!(found(&detector, "expires 12/25"), vec!["12/25"]);
        assert_eq!(found(&detector, "valid thru 03-2027"), vec!["03-2027"]);
        assert!(found(&detector, "month 13/25").is_empty());
    }

    #[test]
    fn test_expiry_ignores_fragments_of_full_dates() {
        let detector = PatternDetector::expiry().unwrap();
        assert!(found(&detector, "born on 01/01/1990").is_empty());
    }

    #[test]
    fn test_dob_formats() {
        let detector = PatternDetector::dob().unwrap();
        assert_eq!(found(&detector, "born on 01/01/1990,"), vec!["01/01/1990"]);
        assert_eq!(found(&detector, "dob 31.12.2001"), vec!["31.12.2001"]);
        assert_eq!(found(&detector, "dob 1985-07-14"), vec!["1985-07-14"]);
        assert!(found(&detector, "dob 01/01-1990").is_empty());
        assert!(found(&detector, "dob 32/01/1990").is_empty());
    }

    #[test]
    fn test_phone_formats() {
        let detector = PatternDetector::phone(10, 10).unwrap();
        assert_eq!(found(&detector, "call 555-123-4567 now"), vec!["555-123-4567"]);
        assert_eq!(found(&detector, "call (555) 123-4567"), vec!["(555) 123-4567"]);
        assert_eq!(found(&detector, "call +91 98765 43210"), vec!["+91 98765 43210"]);
        assert_eq!(found(&detector, "call 9876543210"), vec!["9876543210"]);
        assert_eq!(found(&detector, "call +919876543210"), vec!["+919876543210"]);
    }

    #[test]
    fn test_phone_rejects_other_numbers() {
        let detector = PatternDetector::phone(10, 10).unwrap();
        assert!(found(&detector, "card 4567-8901-2345-6789").is_empty());
        assert!(found(&detector, "id 234567890123").is_empty());
        assert!(found(&detector, "order ABC9876543210").is_empty());
    }

    #[test]
    fn test_phone_length_is_configurable() {
        let detector = PatternDetector::phone(8, 8).unwrap();
        assert_eq!(found(&detector, "office 65432198"), vec!["65432198"]);
        assert!(found(&detector, "call 9876543210").is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        let detector = PatternDetector::card().unwrap();
        assert!(detector.detect("Please reset my password").unwrap().is_empty());
    }
}
