//! Input normalization
//!
//! Email bodies often arrive as HTML fragments with ragged whitespace.
//! Detection runs on the cleaned text, so reported positions refer to it.

use std::borrow::Cow;

use regex::Regex;

use crate::Result;

/// Strips HTML tags and collapses whitespace
pub struct TextNormalizer {
    tags: Regex,
    whitespace: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tags: Regex::new(r"<[^>]+>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Remove tags, collapse each whitespace run to one space and trim
    pub fn clean<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let without_tags = self.tags.replace_all(text, "");
        let collapsed = self.whitespace.replace_all(&without_tags, " ");
        let trimmed = collapsed.trim();

        if trimmed == text {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(trimmed.to_string())
        }
    }
}
