//! Generic detector for free-form entities (email addresses, person names)

use std::collections::HashSet;

use regex::Regex;

use crate::{Candidate, Detector, Result, Span};
use mailmask_core::EntityType;

/// Capitalised words that never start or continue a person name
const NAME_STOP_WORDS: &[&str] = &[
    "I", "The", "Team", "Support", "Customer", "Service", "Services", "Please", "Urgent",
    "Sir", "Madam", "Hi", "Hello", "All", "Regards", "Thanks", "Thank", "Writing", "Unable",
    "Not", "Having", "Facing", "Sorry", "Here", "Happy", "Glad", "Ticket", "Admin", "Manager",
    "Department", "Help", "Desk", "Helpdesk", "Your", "Our", "My", "This", "Is", "And",
];

/// Lowercase words that may follow a self-introduction ("this is Ravi from billing")
const INTRODUCTION_FOLLOWERS: &[&str] = &["from", "with", "at", "here", "and", "of", "in"];

/// Email addresses plus names introduced by a conversational cue
pub struct GenericDetector {
    email: Regex,
    name_cue: Regex,
    word: Regex,
    stop_words: HashSet<&'static str>,
}

impl GenericDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            email: Regex::new(
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}\b",
            )?,
            name_cue: Regex::new(
                r"(?i:\b(?P<cue>my\s+name\s+is|this\s+is|i\s+am|i'm|name\s*:|dear|(?:regards|thanks|thank\s+you|sincerely|cheers|best)\s*,))\s*(?:(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+)?(?P<name>\p{Lu}[\p{L}'-]*(?:[ \t]+\p{Lu}[\p{L}'-]*){0,2})",
            )?,
            word: Regex::new(r"\S+")?,
            stop_words: NAME_STOP_WORDS.iter().copied().collect(),
        })
    }

    fn extract_emails(&self, text: &str) -> Vec<Candidate> {
        self.email
            .find_iter(text)
            .map(|m| Candidate::new(Span::from(m), EntityType::Email, self.name(), 0.95))
            .collect()
    }

    fn extract_names(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for caps in self.name_cue.captures_iter(text) {
            let (Some(cue), Some(name)) = (caps.name("cue"), caps.name("name")) else {
                continue;
            };

            // Keep leading words up to the first stop word
            let mut end = None;
            let mut stopped = false;
            for word in self.word.find_iter(name.as_str()) {
                if self.stop_words.contains(word.as_str()) {
                    stopped = true;
                    break;
                }
                end = Some(name.start() + word.end());
            }

            let Some(end) = end else {
                continue;
            };

            // "this is Outlook crashing" names a product, not a person
            if is_weak_cue(cue.as_str()) && !stopped && !ends_introduction(&text[end..]) {
                continue;
            }

            candidates.push(Candidate::new(
                Span::new(name.start(), end),
                EntityType::FullName,
                self.name(),
                cue_score(cue.as_str()),
            ));
        }

        candidates
    }
}

/// Confidence by how strongly the cue implies a name follows
fn cue_score(cue: &str) -> f32 {
    let cue = cue.to_lowercase();
    if cue.starts_with("my") || cue.starts_with("name") {
        0.85
    } else if cue.ends_with(',') {
        0.75
    } else {
        0.6
    }
}

/// Cues that also introduce things other than people
fn is_weak_cue(cue: &str) -> bool {
    let cue = cue.to_lowercase();
    cue.starts_with("this") || cue.starts_with('i')
}

/// True when the name is followed by the end of the clause or an introducer word
fn ends_introduction(rest: &str) -> bool {
    let rest = rest.trim_start_matches([' ', '\t']);
    match rest.chars().next() {
        None => true,
        Some(c) if !c.is_alphanumeric() => true,
        Some(_) => {
            let next: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();
            INTRODUCTION_FOLLOWERS.contains(&next.as_str())
        }
    }
}

impl Detector for GenericDetector {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn detect(&self, text: &str) -> Result<Vec<Candidate>> {
        let mut candidates = self.extract_emails(text);
        candidates.extend(self.extract_names(text));
        Ok(candidates)
    }
}
