//! Conflict resolution
//!
//! Turns the union of all detector candidates into one non-overlapping,
//! start-sorted set:
//! 1. drop malformed spans
//! 2. retype dates as DOB or expiry from nearby keywords
//! 3. greedy selection by priority tier, length, start and specificity
//! 4. verify the result before it reaches the masker

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regex::Regex;

use crate::{Candidate, PiiError, ResolvedEntity, Result, Span};
use mailmask_core::EntityType;

/// Structured numeric identifiers outrank free-form detections
fn priority_tier(entity_type: EntityType) -> u8 {
    match entity_type {
        EntityType::FullName | EntityType::Email => 1,
        _ => 2,
    }
}

/// Tie-breaker for candidates covering the exact same span
fn specificity(entity_type: EntityType) -> u8 {
    match entity_type {
        EntityType::CreditDebitNo => 8,
        EntityType::AadharNum => 7,
        EntityType::Dob => 6,
        EntityType::ExpiryNo => 5,
        EntityType::PhoneNumber => 4,
        EntityType::CvvNo => 3,
        EntityType::Email => 2,
        EntityType::FullName => 1,
    }
}

/// Selection order: higher tier, longer, leftmost, more specific, higher score
fn selection_order(a: &Candidate, b: &Candidate) -> Ordering {
    priority_tier(b.entity_type)
        .cmp(&priority_tier(a.entity_type))
        .then(b.span.len().cmp(&a.span.len()))
        .then(a.span.start.cmp(&b.span.start))
        .then(specificity(b.entity_type).cmp(&specificity(a.entity_type)))
        .then(b.score.total_cmp(&a.score))
}

/// Merges candidates from all detectors into the final entity set
pub struct ConflictResolver {
    /// Characters searched on each side of a date
    context_chars: usize,
    dob_keywords: Regex,
    expiry_keywords: Regex,
}

impl ConflictResolver {
    pub fn new(context_chars: usize) -> Result<Self> {
        Ok(Self {
            context_chars,
            dob_keywords: Regex::new(
                r"(?i)\b(?:born|birth|birthday|dob|d\.o\.b|date\s+of\s+birth)\b",
            )?,
            expiry_keywords: Regex::new(
                r"(?i)\b(?:exp|expiry|expires|expire|expired|expiration|valid\s+(?:thru|through|till|until|upto))\b",
            )?,
        })
    }

    /// Resolve candidates over `text`
    pub fn resolve(&self, text: &str, candidates: Vec<Candidate>) -> Result<Vec<ResolvedEntity>> {
        let mut candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.span.is_valid_in(text))
            .collect();

        self.disambiguate_dates(text, &mut candidates);
        let resolved = select_non_overlapping(candidates);
        verify(text, &resolved)?;
        Ok(resolved)
    }

    /// Retype DOB/expiry candidates from keyword evidence around them
    pub fn disambiguate_dates(&self, text: &str, candidates: &mut [Candidate]) {
        for candidate in candidates
            .iter_mut()
            .filter(|c| matches!(c.entity_type, EntityType::Dob | EntityType::ExpiryNo))
        {
            if let Some(entity_type) = self.date_type_from_context(text, candidate.span) {
                candidate.entity_type = entity_type;
            }
        }
    }

    /// Keyword-implied type for a date span, if any keyword is in range
    ///
    /// Keywords before the date win over keywords after it; on each side
    /// the nearest keyword wins.
    fn date_type_from_context(&self, text: &str, span: Span) -> Option<EntityType> {
        let window_start = text[..span.start]
            .char_indices()
            .rev()
            .nth(self.context_chars.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let window_end = text[span.end..]
            .char_indices()
            .nth(self.context_chars)
            .map(|(i, _)| span.end + i)
            .unwrap_or(text.len());

        // (distance to the span, type) for keywords before and after it
        let mut preceding: Option<(usize, EntityType)> = None;
        let mut following: Option<(usize, EntityType)> = None;

        let before = &text[window_start..span.start];
        let after = &text[span.end..window_end];

        for (regex, entity_type) in [
            (&self.dob_keywords, EntityType::Dob),
            (&self.expiry_keywords, EntityType::ExpiryNo),
        ] {
            for m in regex.find_iter(before) {
                let distance = before.len() - m.end();
                if preceding.map_or(true, |(d, _)| distance < d) {
                    preceding = Some((distance, entity_type));
                }
            }
            for m in regex.find_iter(after) {
                let distance = m.start();
                if following.map_or(true, |(d, _)| distance < d) {
                    following = Some((distance, entity_type));
                }
            }
        }

        preceding.or(following).map(|(_, entity_type)| entity_type)
    }
}

/// Greedily accept candidates in selection order, skipping any overlap
pub fn select_non_overlapping(mut candidates: Vec<Candidate>) -> Vec<ResolvedEntity> {
    candidates.sort_by(selection_order);

    // start -> end of accepted spans
    let mut accepted: BTreeMap<usize, (usize, EntityType)> = BTreeMap::new();

    for candidate in candidates {
        let Span { start, end } = candidate.span;
        // Only the accepted span with the greatest start below `end` can overlap
        let overlaps = accepted
            .range(..end)
            .next_back()
            .is_some_and(|(_, (accepted_end, _))| *accepted_end > start);

        if !overlaps {
            accepted.insert(start, (end, candidate.entity_type));
        }
    }

    accepted
        .into_iter()
        .map(|(start, (end, entity_type))| ResolvedEntity {
            span: Span::new(start, end),
            entity_type,
        })
        .collect()
}

/// Check the masker's preconditions: in bounds, sorted, pairwise disjoint
pub fn verify(text: &str, resolved: &[ResolvedEntity]) -> Result<()> {
    if let Some(bad) = resolved.iter().find(|e| !e.span.is_valid_in(text)) {
        return Err(PiiError::ResolverInvariant(format!(
            "span {}..{} is not valid for text of length {}",
            bad.span.start,
            bad.span.end,
            text.len()
        )));
    }

    if let Some(pair) = resolved.windows(2).find(|w| w[0].span.end > w[1].span.start) {
        return Err(PiiError::ResolverInvariant(format!(
            "{} at {}..{} overlaps or precedes {} at {}..{}",
            pair[0].entity_type,
            pair[0].span.start,
            pair[0].span.end,
            pair[1].entity_type,
            pair[1].span.start,
            pair[1].span.end
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(start: usize, end: usize, entity_type: EntityType) -> Candidate {
        Candidate::new(Span::new(start, end), entity_type, "test", 0.8)
    }

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(30).unwrap()
    }

    #[test]
    fn test_drops_invalid_spans() {
        let text = "short";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(2, 2, EntityType::CvvNo),
                    candidate(3, 99, EntityType::PhoneNumber),
                    candidate(0, 5, EntityType::FullName),
                ],
            )
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].entity_type, EntityType::FullName);
    }

    #[test]
    fn test_structured_outranks_generic() {
        let text = "Regards, Ravi 9876543210";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    // generic detector over-reached into the number
                    candidate(9, 24, EntityType::FullName),
                    candidate(14, 24, EntityType::PhoneNumber),
                ],
            )
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].entity_type, EntityType::PhoneNumber);
    }

    #[test]
    fn test_longer_span_wins_within_tier() {
        let text = "4567 8901 2345 6789";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(0, 14, EntityType::AadharNum),
                    candidate(0, 19, EntityType::CreditDebitNo),
                ],
            )
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].entity_type, EntityType::CreditDebitNo);
    }

    #[test]
    fn test_equal_length_prefers_leftmost() {
        let text = "aaaaaaaaaa";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(3, 7, EntityType::CvvNo),
                    candidate(1, 5, EntityType::CvvNo),
                ],
            )
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].span, Span::new(1, 5));
    }

    #[test]
    fn test_same_span_prefers_specific_type() {
        let text = "9876543210123";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(0, 13, EntityType::PhoneNumber),
                    candidate(0, 13, EntityType::CreditDebitNo),
                ],
            )
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::CreditDebitNo);
    }

    #[test]
    fn test_result_is_sorted_and_disjoint() {
        let text = "a@b.com then 555-123-4567 then x@y.org";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(31, 38, EntityType::Email),
                    candidate(13, 25, EntityType::PhoneNumber),
                    candidate(0, 7, EntityType::Email),
                ],
            )
            .unwrap();

        let starts: Vec<usize> = resolved.iter().map(|e| e.span.start).collect();
        assert_eq!(starts, vec![0, 13, 31]);
        assert!(verify(text, &resolved).is_ok());
    }

    #[test]
    fn test_dates_retyped_by_keywords() {
        let text = "born on 01/01/1990, expires 12/25";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(8, 18, EntityType::Dob),
                    candidate(28, 33, EntityType::ExpiryNo),
                ],
            )
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::Dob);
        assert_eq!(resolved[1].entity_type, EntityType::ExpiryNo);
    }

    #[test]
    fn test_full_date_near_expiry_keyword_becomes_expiry() {
        let text = "card valid thru 01/01/2030";
        let resolved = resolver()
            .resolve(text, vec![candidate(16, 26, EntityType::Dob)])
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::ExpiryNo);
    }

    #[test]
    fn test_short_date_near_birth_keyword_becomes_dob() {
        let text = "my date of birth is 04/96";
        let resolved = resolver()
            .resolve(text, vec![candidate(20, 25, EntityType::ExpiryNo)])
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::Dob);
    }

    #[test]
    fn test_following_keyword_used_when_none_precede() {
        let text = "12/26 is the expiry";
        let resolved = resolver()
            .resolve(text, vec![candidate(0, 5, EntityType::Dob)])
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::ExpiryNo);
    }

    #[test]
    fn test_no_keyword_keeps_pattern_type() {
        let text = "meeting 01/02/2020 and 11/24";
        let resolved = resolver()
            .resolve(
                text,
                vec![
                    candidate(8, 18, EntityType::Dob),
                    candidate(23, 28, EntityType::ExpiryNo),
                ],
            )
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::Dob);
        assert_eq!(resolved[1].entity_type, EntityType::ExpiryNo);
    }

    #[test]
    fn test_exp_does_not_match_inside_words() {
        let text = "I expect 01/02/2020 works";
        let resolved = resolver()
            .resolve(text, vec![candidate(9, 19, EntityType::Dob)])
            .unwrap();

        assert_eq!(resolved[0].entity_type, EntityType::Dob);
    }

    #[test]
    fn test_verify_rejects_overlap() {
        let text = "0123456789";
        let bad = vec![
            ResolvedEntity {
                span: Span::new(0, 5),
                entity_type: EntityType::CvvNo,
            },
            ResolvedEntity {
                span: Span::new(4, 8),
                entity_type: EntityType::CvvNo,
            },
        ];
        assert!(matches!(
            verify(text, &bad),
            Err(PiiError::ResolverInvariant(_))
        ));
    }

    #[test]
    fn test_resolution_independent_of_input_order() {
        let text = "4567 8901 2345 6789 and 2345 6789 0123";
        let mut candidates = vec![
            candidate(0, 19, EntityType::CreditDebitNo),
            candidate(0, 14, EntityType::AadharNum),
            candidate(24, 38, EntityType::AadharNum),
            candidate(5, 17, EntityType::PhoneNumber),
        ];
        let forward = resolver().resolve(text, candidates.clone()).unwrap();
        candidates.reverse();
        let backward = resolver().resolve(text, candidates).unwrap();
        assert_eq!(forward, backward);
    }
}
