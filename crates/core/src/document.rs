use std::collections::HashMap;
use std::ops::Range;

use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConsistencyError;
use crate::metadata::BookMetadata;

/// One line of the document, rendered to HTML. Title-page and end-page
/// lines are flagged; every other line comes from the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalLine {
    /// Absolute line index, counting title-page lines.
    pub index: usize,
    pub html: String,
    /// Characters (Eastern text) or words (Western text).
    #[serde(skip)]
    pub measure: usize,
    pub is_title: bool,
    pub is_title_page_line: bool,
    pub is_end_page_line: bool,
}

/// A detected chapter heading.
///
/// Serialized as `[text, lineIndex, shortTitle, isCustomOnly]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, usize, String, bool)")]
pub struct TitleEntry {
    pub text: String,
    pub line: usize,
    pub short_title: String,
    pub is_custom_only: bool,
}

impl From<(String, usize, String, bool)> for TitleEntry {
    fn from((text, line, short_title, is_custom_only): (String, usize, String, bool)) -> Self {
        Self {
            text,
            line,
            short_title,
            is_custom_only,
        }
    }
}

impl Serialize for TitleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.text)?;
        tuple.serialize_element(&self.line)?;
        tuple.serialize_element(&self.short_title)?;
        tuple.serialize_element(&self.is_custom_only)?;
        tuple.end()
    }
}

/// Line index to position in the title list. Entries are kept in line
/// order; lookups go through a separate hash map.
///
/// Serialized as a JSON object `{ "<lineIndex>": position }` in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleIndex {
    entries: Vec<(usize, usize)>,
    lookup: HashMap<usize, usize>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a title line. Lines arrive in document order; an existing key
    /// is left untouched and reported as `false`.
    pub fn insert(&mut self, line: usize, position: usize) -> bool {
        if self.contains(line) {
            return false;
        }
        let at = self.entries.partition_point(|&(l, _)| l < line);
        self.entries.insert(at, (line, position));
        self.lookup.insert(line, position);
        true
    }

    pub fn position(&self, line: usize) -> Option<usize> {
        self.lookup.get(&line).copied()
    }

    pub fn contains(&self, line: usize) -> bool {
        self.lookup.contains_key(&line)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(line, position)` pairs in line order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().copied()
    }

    /// Check the index against the title list it describes.
    pub fn verify(&self, titles: &[TitleEntry]) -> Result<(), ConsistencyError> {
        if titles.len() != self.len() {
            return Err(ConsistencyError::TitleIndexMismatch {
                titles: titles.len(),
                index_keys: self.len(),
            });
        }
        match titles.iter().find(|t| self.position(t.line).is_none()) {
            Some(missing) => Err(ConsistencyError::MissingIndexEntry { line: missing.line }),
            None => Ok(()),
        }
    }
}

impl Serialize for TitleIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (line, position) in self.iter() {
            map.serialize_entry(&line.to_string(), &position)?;
        }
        map.end()
    }
}

/// Strictly increasing first-line indices of pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageBreakList(Vec<usize>);

impl PageBreakList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: usize) -> Result<(), ConsistencyError> {
        if let Some(&previous) = self.0.last() {
            if line <= previous {
                return Err(ConsistencyError::PageBreakOrder {
                    previous,
                    next: line,
                });
            }
        }
        self.0.push(line);
        Ok(())
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Breaks falling in `range`.
    pub fn within(&self, range: Range<usize>) -> Vec<usize> {
        self.0.iter().copied().filter(|b| range.contains(b)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FootnoteEntry {
    pub id: usize,
    pub html: String,
}

/// Output of one processing phase. Titles, footnotes and page breaks are
/// the ones this phase added; the consumer appends them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    pub html_lines: Vec<String>,
    pub titles: Vec<TitleEntry>,
    pub titles_index: TitleIndex,
    /// Footnote ids handed out so far in the document.
    pub footnote_counter: usize,
    pub footnotes: Vec<String>,
    pub page_breaks: Vec<usize>,
    /// Absolute index of `html_lines[0]`.
    pub start_line: usize,
    pub is_final: bool,
}

/// The whole processed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedBook {
    pub metadata: BookMetadata,
    pub title_page_lines: Vec<String>,
    pub html_lines: Vec<String>,
    pub end_page_line: Option<String>,
    pub titles: Vec<TitleEntry>,
    pub titles_index: TitleIndex,
    pub footnotes: Vec<FootnoteEntry>,
    pub page_breaks: PageBreakList,
}

impl ProcessedBook {
    pub fn line_count(&self) -> usize {
        self.title_page_lines.len() + self.html_lines.len() + usize::from(self.end_page_line.is_some())
    }

    /// Line ranges of each page.
    pub fn pages(&self) -> Vec<Range<usize>> {
        let breaks = self.page_breaks.as_slice();
        let total = self.line_count();
        breaks
            .iter()
            .enumerate()
            .map(|(i, &start)| start..breaks.get(i + 1).copied().unwrap_or(total))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(line: usize) -> TitleEntry {
        TitleEntry {
            text: format!("Chapter {line}"),
            line,
            short_title: format!("Chapter {line}"),
            is_custom_only: false,
        }
    }

    #[test]
    fn title_entry_is_a_tuple() {
        let json = serde_json::to_string(&entry(4)).unwrap();
        assert_eq!(json, r#"["Chapter 4",4,"Chapter 4",false]"#);
        let back: TitleEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry(4));
    }

    #[test]
    fn title_index_keeps_line_order() {
        let mut index = TitleIndex::new();
        assert!(index.insert(10, 1));
        assert!(index.insert(2, 0));
        assert!(!index.insert(10, 5));
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![(2, 0), (10, 1)]);
        assert_eq!(index.position(10), Some(1));
        assert_eq!(serde_json::to_string(&index).unwrap(), r#"{"2":0,"10":1}"#);
    }

    #[test]
    fn verify_detects_mismatch() {
        let mut index = TitleIndex::new();
        index.insert(0, 0);
        assert!(index.verify(&[entry(0)]).is_ok());
        assert_eq!(
            index.verify(&[entry(0), entry(3)]),
            Err(ConsistencyError::TitleIndexMismatch { titles: 2, index_keys: 1 })
        );
        assert_eq!(
            index.verify(&[entry(7)]),
            Err(ConsistencyError::MissingIndexEntry { line: 7 })
        );
    }

    #[test]
    fn page_breaks_must_increase() {
        let mut breaks = PageBreakList::new();
        breaks.push(0).unwrap();
        breaks.push(5).unwrap();
        assert_eq!(
            breaks.push(5),
            Err(ConsistencyError::PageBreakOrder { previous: 5, next: 5 })
        );
        assert_eq!(breaks.within(1..10), vec![5]);
    }
}
