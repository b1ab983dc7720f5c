//! Book name and author guessed from the file name.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::encoding::EncodingGuess;

static BRACKETED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|【[^】]*】|（[^）]*）").expect("valid tag regex")
});

/// Ordered filename conventions; the first match wins.
static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^《(?P<name>[^》]+)》.*?(?:作者|著)\s*[:：]?\s*(?P<author>.+)$",
        r"^《(?P<name>[^》]+)》",
        r"^(?P<name>.+?)\s*作者\s*[:：]\s*(?P<author>.+)$",
        r"^(?P<name>.+?)\s+(?i:by)\s+(?P<author>.+)$",
        r"^(?P<author>.+?)\s+-\s+(?P<name>.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid file name regex"))
    .collect()
});

/// Metadata reported once detection has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub book_name: String,
    pub author: String,
    /// Recognizes the book name as a standalone line.
    pub book_name_regex: String,
    /// Recognizes the author credit as a standalone line; empty without an
    /// author.
    pub author_regex: String,
    pub encoding: String,
    pub is_eastern: bool,
}

impl BookMetadata {
    pub fn from_file_name(file_name: &str, guess: &EncodingGuess) -> Self {
        let (book_name, author) = split_file_name(file_name);
        Self {
            book_name_regex: book_name_regex(&book_name),
            author_regex: author_regex(&author),
            book_name,
            author,
            encoding: guess.name().to_string(),
            is_eastern: guess.is_eastern,
        }
    }
}

/// Guess `(book name, author)` from a file name; the author may be empty.
pub fn split_file_name(file_name: &str) -> (String, String) {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let stem = stem.trim();

    let stripped = BRACKETED_TAG.replace_all(stem, "");
    let cleaned = match stripped.trim() {
        "" => stem,
        s => s,
    };

    for pattern in NAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(cleaned) {
            let name = caps.name("name").map_or("", |m| m.as_str().trim());
            let author = caps.name("author").map_or("", |m| m.as_str().trim());
            if !name.is_empty() {
                return (name.to_string(), author.to_string());
            }
        }
    }
    (cleaned.to_string(), String::new())
}

fn book_name_regex(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    format!(r"^\s*《?\s*{}\s*》?\s*$", regex::escape(name))
}

fn author_regex(author: &str) -> String {
    if author.is_empty() {
        return String::new();
    }
    format!(
        r"^\s*(?:(?:作者|著|(?i:by|author))\s*[:：]?\s*)?{}\s*(?:著)?\s*$",
        regex::escape(author)
    )
}

/// Compiled standalone-line matchers for the book name and author.
#[derive(Debug, Clone, Default)]
pub struct MetadataLines {
    patterns: Vec<Regex>,
}

impl MetadataLines {
    pub fn new(meta: &BookMetadata) -> Result<Self, regex::Error> {
        let patterns = [&meta.book_name_regex, &meta.author_regex]
            .into_iter()
            .filter(|source| !source.is_empty())
            .map(|source| Regex::new(source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(line))
    }

    /// Drop name/author lines among the first `window` lines; the generated
    /// title page replaces them. Returns how many were removed.
    pub fn strip_leading(&self, lines: &mut Vec<String>, window: usize) -> usize {
        if self.patterns.is_empty() {
            return 0;
        }
        let before = lines.len();
        let mut position = 0;
        lines.retain(|line| {
            position += 1;
            position > window || !self.matches(line)
        });
        before - lines.len()
    }
}
