//! Placeholder masking
//!
//! Rebuilds the text in a single left-to-right pass over the resolved
//! entities. All offsets come from the original text; the output string
//! is never edited in place.

use serde::{Deserialize, Serialize};

use crate::resolver::verify;
use crate::{PiiError, ResolvedEntity, Result, Span};
use mailmask_core::EntityType;

/// One masked entity, positioned in the original (unmasked) text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedEntity {
    /// Byte range in the original text
    #[serde(skip)]
    pub span: Span,
    /// `[start, end)` character offsets in the original text
    pub position: [usize; 2],
    pub classification: EntityType,
    /// Original substring
    pub entity: String,
}

/// Result of masking one text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedOutput {
    pub original_text: String,
    pub masked_text: String,
    pub entities: Vec<MaskedEntity>,
}

impl MaskedOutput {
    /// Output for a text with nothing to mask
    pub fn unchanged(text: &str) -> Self {
        Self {
            original_text: text.to_string(),
            masked_text: text.to_string(),
            entities: Vec::new(),
        }
    }
}

/// Replace every resolved span with its `[type]` placeholder
///
/// `resolved` must be sorted and pairwise disjoint; anything else is
/// rejected as a resolver fault.
pub fn mask(text: &str, resolved: &[ResolvedEntity]) -> Result<MaskedOutput> {
    verify(text, resolved)?;

    let mut masked_text = String::with_capacity(text.len());
    let mut entities = Vec::with_capacity(resolved.len());
    // byte and char position of the end of the last copied segment
    let mut cursor = 0;
    let mut char_cursor = 0;

    for entity in resolved {
        let Span { start, end } = entity.span;

        let gap = &text[cursor..start];
        let value = &text[start..end];
        let char_start = char_cursor + gap.chars().count();
        let char_end = char_start + value.chars().count();

        masked_text.push_str(gap);
        masked_text.push_str(&entity.entity_type.placeholder());

        entities.push(MaskedEntity {
            span: entity.span,
            position: [char_start, char_end],
            classification: entity.entity_type,
            entity: value.to_string(),
        });

        cursor = end;
        char_cursor = char_end;
    }
    masked_text.push_str(&text[cursor..]);

    Ok(MaskedOutput {
        original_text: text.to_string(),
        masked_text,
        entities,
    })
}

/// Put the original values back into a masked text
///
/// Uses the entities' character positions, so literal placeholder-like
/// text elsewhere in the body is left alone.
pub fn unmask(masked_text: &str, entities: &[MaskedEntity]) -> Result<String> {
    // byte offset of every char boundary in the masked text
    let boundaries: Vec<usize> = masked_text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(masked_text.len()))
        .collect();

    let mut restored = String::with_capacity(masked_text.len());
    let mut cursor = 0;
    // masked length minus original length of everything restored so far
    let mut shift: isize = 0;
    let mut previous_end = 0;

    for entity in entities {
        let [start, end] = entity.position;
        if start < previous_end || end < start {
            return Err(PiiError::Reconstruction(format!(
                "entity positions {start}..{end} are out of order"
            )));
        }

        let placeholder = entity.classification.placeholder();
        let masked_start = start as isize + shift;
        let byte_start = usize::try_from(masked_start)
            .ok()
            .and_then(|i| boundaries.get(i).copied())
            .ok_or_else(|| {
                PiiError::Reconstruction(format!("position {start} is outside the masked text"))
            })?;

        if !masked_text[byte_start..].starts_with(&placeholder) {
            return Err(PiiError::Reconstruction(format!(
                "expected {placeholder} at character {masked_start}"
            )));
        }

        restored.push_str(&masked_text[cursor..byte_start]);
        restored.push_str(&entity.entity);
        cursor = byte_start + placeholder.len();

        shift += placeholder.chars().count() as isize - (end - start) as isize;
        previous_end = end;
    }
    restored.push_str(&masked_text[cursor..]);

    Ok(restored)
}
