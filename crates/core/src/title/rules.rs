//! Title rules: a fixed library of heading conventions plus one rule
//! inferred per document, all evaluated through [`TitleRule::attempt`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::numerals::{NumeralKind, ANY_NUMBER, EN_NUMBER_WORDS};

/// Nesting level of a heading, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleLevel {
    Volume,
    Chapter,
    Special,
    Custom,
}

/// A successful match of one rule against one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    /// The whole title text.
    pub title: String,
    /// Non-empty `prefix` / `body` captures, outermost first.
    pub groups: Vec<String>,
    /// All non-empty named captures (`prefix`, `number`, `body`).
    pub named: BTreeMap<&'static str, String>,
    /// Matched only by the rule inferred for this document.
    pub is_custom_only: bool,
    pub level: TitleLevel,
    pub rule: String,
}

impl TitleMatch {
    /// The innermost title content: the body when present, else the whole
    /// title.
    pub fn deepest(&self) -> &str {
        self.groups
            .iter()
            .rev()
            .find(|g| !g.is_empty())
            .map(String::as_str)
            .unwrap_or(&self.title)
    }

    pub fn body(&self) -> Option<&str> {
        self.named.get("body").map(String::as_str)
    }
}

/// One of the fixed heading conventions.
#[derive(Debug)]
pub struct BuiltInRule {
    pub name: &'static str,
    pub level: TitleLevel,
    regex: Regex,
}

/// A rule learned from the document's first chunk.
#[derive(Debug, Clone)]
pub struct InferredRule {
    regex: Regex,
    /// Literal text preceding the number, e.g. `Section ` or `【`.
    pub literal: String,
    pub kind: NumeralKind,
    /// Punctuation following the number, e.g. `、` or `】`.
    pub delimiter: String,
    pub occurrences: usize,
    pub confidence: f64,
}

impl InferredRule {
    pub fn new(
        literal: &str,
        kind: NumeralKind,
        delimiter: &str,
        occurrences: usize,
        confidence: f64,
    ) -> Result<Self, regex::Error> {
        let source = format!(
            r"^(?P<prefix>{}\s*(?P<number>{}){})(?:\s*(?P<body>.+?))?\s*$",
            regex::escape(literal.trim_end()),
            kind.regex_class(),
            regex::escape(delimiter),
        );
        Ok(Self {
            regex: Regex::new(&source)?,
            literal: literal.to_string(),
            kind,
            delimiter: delimiter.to_string(),
            occurrences,
            confidence,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

#[derive(Debug, Clone)]
pub enum TitleRule {
    BuiltIn(&'static BuiltInRule),
    Inferred(InferredRule),
}

impl TitleRule {
    pub fn name(&self) -> &str {
        match self {
            TitleRule::BuiltIn(rule) => rule.name,
            TitleRule::Inferred(_) => "inferred",
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            TitleRule::BuiltIn(rule) => rule.regex.as_str(),
            TitleRule::Inferred(rule) => rule.pattern(),
        }
    }

    /// Match `line` (already trimmed) against this rule.
    pub fn attempt(&self, line: &str) -> Option<TitleMatch> {
        let (regex, level, is_custom_only) = match self {
            TitleRule::BuiltIn(rule) => (&rule.regex, rule.level, false),
            TitleRule::Inferred(rule) => (&rule.regex, TitleLevel::Custom, true),
        };
        let caps = regex.captures(line)?;

        let mut named = BTreeMap::new();
        for name in ["prefix", "number", "body"] {
            if let Some(m) = caps.name(name) {
                let text = m.as_str().trim();
                if !text.is_empty() {
                    named.insert(name, text.to_string());
                }
            }
        }
        let groups = ["prefix", "body"]
            .iter()
            .filter_map(|name| named.get(name).cloned())
            .collect();

        Some(TitleMatch {
            title: line.to_string(),
            groups,
            named,
            is_custom_only,
            level,
            rule: self.name().to_string(),
        })
    }
}

const ZH_SEP: &str = r"[\s:：、.．·\-—]";
const EN_SEP: &str = r"(?:\s*[:.\-—]\s*|\s+)";

fn zh_rule(name: &'static str, level: TitleLevel, prefix: &str, sep_required: bool) -> BuiltInRule {
    let quantifier = if sep_required { "+" } else { "*" };
    let source = format!(r"^(?P<prefix>{prefix})(?:{ZH_SEP}{quantifier}(?P<body>.+?))?\s*$");
    built(name, level, &source)
}

fn built(name: &'static str, level: TitleLevel, source: &str) -> BuiltInRule {
    BuiltInRule {
        name,
        level,
        regex: Regex::new(source).expect("valid built-in title regex"),
    }
}

static BUILT_IN_RULES: LazyLock<Vec<BuiltInRule>> = LazyLock::new(|| {
    let en_number = format!(r"\d+|[IVXLCDM]+|{EN_NUMBER_WORDS}");
    vec![
        zh_rule(
            "volume-zh",
            TitleLevel::Volume,
            &format!(r"第\s*(?P<number>{ANY_NUMBER})\s*[卷部集篇]"),
            false,
        ),
        zh_rule(
            "volume-zh-leading",
            TitleLevel::Volume,
            &format!(r"卷\s*(?P<number>{ANY_NUMBER})"),
            false,
        ),
        built(
            "volume-en",
            TitleLevel::Volume,
            &format!(
                r"^(?P<prefix>(?i:volume|vol\.|book|part)\s+(?P<number>{en_number})\b)(?:{EN_SEP}(?P<body>.+?))?\s*$"
            ),
        ),
        zh_rule(
            "chapter-zh",
            TitleLevel::Chapter,
            &format!(r"第\s*(?P<number>{ANY_NUMBER})\s*[章回节话]"),
            false,
        ),
        built(
            "chapter-en",
            TitleLevel::Chapter,
            &format!(
                r"^(?P<prefix>(?i:chapter|ch\.)\s*(?P<number>{en_number})\b)(?:{EN_SEP}(?P<body>.+?))?\s*$"
            ),
        ),
        zh_rule(
            "special-zh",
            TitleLevel::Special,
            &format!(r"序章|序言|序|楔子|引子|前言|尾声|后记|终章|番外(?:\s*(?P<number>{ANY_NUMBER}))?"),
            true,
        ),
        built(
            "special-en",
            TitleLevel::Special,
            r"^(?P<prefix>(?i:prologue|epilogue|preface|foreword|afterword|introduction|interlude))(?:\s*[:.\-—]\s*(?P<body>.+?))?\s*$",
        ),
    ]
});

/// The fixed rules, in priority order.
pub fn built_in_rules() -> impl Iterator<Item = TitleRule> {
    BUILT_IN_RULES.iter().map(TitleRule::BuiltIn)
}

/// First built-in rule matching `line`.
pub fn match_built_in(line: &str) -> Option<TitleMatch> {
    built_in_rules().find_map(|rule| rule.attempt(line))
}
