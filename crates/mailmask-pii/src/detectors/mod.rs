//! Entity detectors
//!
//! - Generic: email addresses and cue-based person names
//! - Pattern: Aadhar, card, expiry, date of birth and phone numbers
//! - Contextual: CVV codes found near a keyword

mod cvv;
mod generic;
mod pattern;

pub use cvv::CvvDetector;
pub use generic::GenericDetector;
pub use pattern::{luhn_valid, PatternDetector};

/// True when `[start, end)` is not glued to a longer digit run
///
/// A run is glued when the neighbouring char is a digit, or a separator
/// from `separators` directly followed (or preceded) by a digit.
pub(crate) fn is_isolated_digit_run(
    text: &str,
    start: usize,
    end: usize,
    separators: &[char],
) -> bool {
    let mut before = text[..start].chars().rev();
    match before.next() {
        Some(c) if c.is_ascii_digit() => return false,
        Some(c) if separators.contains(&c) => {
            if before.next().is_some_and(|d| d.is_ascii_digit()) {
                return false;
            }
        }
        _ => {}
    }

    let mut after = text[end..].chars();
    match after.next() {
        Some(c) if c.is_ascii_digit() => return false,
        Some(c) if separators.contains(&c) => {
            if after.next().is_some_and(|d| d.is_ascii_digit()) {
                return false;
            }
        }
        _ => {}
    }

    true
}

/// Count ASCII digits in a matched string
pub(crate) fn digit_count(s: &str) -> usize {
    s.bytes().filter(u8::is_ascii_digit).count()
}

/// True when every non-digit char in `s` is the same separator
pub(crate) fn has_consistent_separators(s: &str) -> bool {
    let mut separators = s.chars().filter(|c| !c.is_ascii_digit());
    match separators.next() {
        Some(first) => separators.all(|c| c == first),
        None => true,
    }
}
