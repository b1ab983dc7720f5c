//! Footnote markers and definitions.
//!
//! A reference such as `See note[1].` reserves the next footnote id for
//! label `1`; the definition line `[1] This is a footnote.` later claims that
//! id and leaves the text flow. Ids come from one counter per document.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::html;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([0-9]+)\]|〔([0-9０-９]+)〕|［([0-9０-９]+)］|【注([0-9０-９]+)】|([①-⑳])")
        .expect("valid footnote marker regex")
});

/// A footnote body taken out of the text flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footnote {
    pub id: usize,
    pub body: String,
}

/// Result of running one line through the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Display HTML; empty for a definition.
    pub line: String,
    pub footnote: Option<Footnote>,
}

/// Per-document footnote state.
#[derive(Debug, Clone, Default)]
pub struct FootnoteExtractor {
    counter: usize,
    pending: HashMap<String, usize>,
}

impl FootnoteExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of footnote ids handed out so far.
    pub fn counter(&self) -> usize {
        self.counter
    }

    fn next_id(&mut self) -> usize {
        let id = self.counter;
        self.counter += 1;
        id
    }

    /// Convert markers in `line` to reference anchors, or take a definition
    /// line out of the flow.
    pub fn extract(&mut self, line: &str) -> Extracted {
        if let Some((label, body)) = split_definition(line) {
            let id = match self.pending.remove(&label) {
                Some(id) => id,
                None => self.next_id(),
            };
            return Extracted {
                line: String::new(),
                footnote: Some(Footnote {
                    id,
                    body: body.to_string(),
                }),
            };
        }

        Extracted {
            line: self.link(line),
            footnote: None,
        }
    }

    /// Escape `text` and turn its markers into reference anchors. A label
    /// seen for the first time reserves the next id for its definition.
    pub fn link(&mut self, text: &str) -> String {
        // Markers contain no characters that escaping touches.
        let escaped = html::escape(text);
        if !MARKER.is_match(&escaped) {
            return escaped;
        }
        MARKER
            .replace_all(&escaped, |caps: &Captures| {
                let marker = &caps[0];
                let label = label_of(caps);
                let id = match self.pending.get(&label) {
                    Some(&id) => id,
                    None => {
                        let id = self.next_id();
                        self.pending.insert(label, id);
                        id
                    }
                };
                html::footnote_ref(id, marker)
            })
            .into_owned()
    }
}

/// Whether the line defines a footnote (marker first, text after).
pub fn is_definition(line: &str) -> bool {
    split_definition(line).is_some()
}

fn split_definition(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    let caps = MARKER.captures(line)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 {
        return None;
    }
    let body = line[whole.end()..].trim();
    if body.is_empty() {
        return None;
    }
    Some((label_of(&caps), body))
}

/// Normalize a marker to its number in ASCII digits.
fn label_of(caps: &Captures) -> String {
    let raw = (1..=4)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string());
    match raw {
        Some(digits) => digits
            .chars()
            .map(|c| match c {
                '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
                c => c,
            })
            .collect(),
        None => caps
            .get(5)
            .and_then(|m| m.as_str().chars().next())
            .map(|c| (c as u32 - '①' as u32 + 1).to_string())
            .unwrap_or_default(),
    }
}
