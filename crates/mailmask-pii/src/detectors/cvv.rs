//! Contextual CVV detection
//!
//! A CVV is a bare 3-4 digit number, so it is only reported when it follows
//! a CVV keyword within a bounded window. Spans already claimed by other
//! detectors (dates, card numbers, ...) are skipped.

use regex::Regex;

use crate::{Candidate, ContextualDetector, Result, Span};
use mailmask_core::EntityType;

/// Keyword-anchored bounded-window CVV detector
pub struct CvvDetector {
    keyword: Regex,
    token: Regex,
    /// Tokens inspected after each keyword
    window_tokens: usize,
    /// Characters inspected after each keyword
    window_chars: usize,
}

impl CvvDetector {
    pub fn new(window_tokens: usize, window_chars: usize) -> Result<Self> {
        Ok(Self {
            keyword: Regex::new(
                r"(?i)\b(?:cvv2?|cvc2?|cid|csc|security\s+code|card\s+verification(?:\s+(?:value|code))?|verification\s+code)\b",
            )?,
            token: Regex::new(r"[\p{L}\p{N}]+")?,
            window_tokens,
            window_chars,
        })
    }

    /// First eligible token in the window after a keyword ending at `from`
    fn scan_window(&self, text: &str, from: usize, claimed: &[Span]) -> Option<Span> {
        let window_end = text[from..]
            .char_indices()
            .nth(self.window_chars)
            .map(|(i, _)| from + i)
            .unwrap_or(text.len());

        // Claimed tokens do not use up the window
        self.token
            .find_iter(&text[from..window_end])
            .map(|m| Span::new(from + m.start(), from + m.end()))
            .filter(|span| !claimed.iter().any(|c| c.overlaps(span)))
            .take(self.window_tokens)
            .find(|span| {
                let token = &text[span.start..span.end];
                (3..=4).contains(&token.len())
                    && token.bytes().all(|b| b.is_ascii_digit())
                    && !is_glued(text, *span)
            })
    }
}

/// True when the token continues a longer number (truncated by the window,
/// or joined to another digit group like a date or card segment)
fn is_glued(text: &str, span: Span) -> bool {
    let joins = |c: char| matches!(c, '/' | '-' | '.');

    let mut after = text[span.end..].chars();
    match after.next() {
        Some(c) if c.is_ascii_digit() => return true,
        Some(c) if joins(c) && after.next().is_some_and(|d| d.is_ascii_digit()) => return true,
        _ => {}
    }

    let mut before = text[..span.start].chars().rev();
    match before.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some(c) if joins(c) => before.next().is_some_and(|d| d.is_ascii_digit()),
        _ => false,
    }
}

impl ContextualDetector for CvvDetector {
    fn name(&self) -> &'static str {
        "cvv"
    }

    fn detect(&self, text: &str, claimed: &[Span]) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<Candidate> = Vec::new();

        for keyword in self.keyword.find_iter(text) {
            let Some(span) = self.scan_window(text, keyword.end(), claimed) else {
                continue;
            };
            // "CVV (security code) 123" reaches the same token twice
            if candidates.iter().any(|c| c.span == span) {
                continue;
            }
            candidates.push(Candidate::new(span, EntityType::CvvNo, self.name(), 0.9));
        }

        Ok(candidates)
    }
}
