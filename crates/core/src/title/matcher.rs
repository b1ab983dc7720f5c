use std::collections::HashSet;

use super::rules::{self, TitleMatch, TitleRule};

/// Lines longer than this are never titles.
pub const DEFAULT_MAX_TITLE_CHARS: usize = 50;

/// Matches lines against the built-in rules, then the document's inferred
/// rule. Once production matching has started the rule set must not
/// change, so the inferred rule can be installed only once.
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    custom: Option<TitleRule>,
    custom_locked: bool,
    max_title_chars: usize,
}

impl Default for TitleMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TITLE_CHARS)
    }
}

impl TitleMatcher {
    pub fn new(max_title_chars: usize) -> Self {
        Self {
            custom: None,
            custom_locked: false,
            max_title_chars,
        }
    }

    /// Install the rule inferred for this document. Returns false (and
    /// keeps the current rules) if a rule was already installed or
    /// installation was closed by [`TitleMatcher::lock`].
    pub fn install_custom(&mut self, rule: TitleRule) -> bool {
        if self.custom_locked {
            tracing::warn!(pattern = rule.pattern(), "ignoring custom title rule after matching began");
            return false;
        }
        tracing::debug!(pattern = rule.pattern(), "installed custom title rule");
        self.custom = Some(rule);
        self.custom_locked = true;
        true
    }

    /// Close custom-rule installation.
    pub fn lock(&mut self) {
        self.custom_locked = true;
    }

    pub fn custom_rule(&self) -> Option<&TitleRule> {
        self.custom.as_ref()
    }

    /// Match a trimmed line. `None` means the line is not a title.
    pub fn match_title(&self, line: &str) -> Option<TitleMatch> {
        let line = line.trim();
        if line.is_empty() || !self.is_plausible(line) {
            return None;
        }
        self.match_unguarded(line)
    }

    fn match_unguarded(&self, line: &str) -> Option<TitleMatch> {
        rules::match_built_in(line).or_else(|| self.custom.as_ref()?.attempt(line))
    }

    /// Length and punctuation guards every title must pass.
    pub fn is_plausible(&self, line: &str) -> bool {
        if line.chars().count() > self.max_title_chars {
            return false;
        }
        if line.contains('。') {
            return false;
        }
        !line.ends_with(['，', ',', '；', ';'])
    }

    /// Reduce a (possibly nested) title to its innermost body, e.g.
    /// `Volume 1 Chapter 3: The Awakening` to `The Awakening`.
    ///
    /// Candidates never grow, so the walk ends; the result is a fixed point
    /// of this function.
    pub fn shortest_title(&self, title: &str) -> String {
        let mut candidate = title.trim().to_string();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(candidate.clone());

        loop {
            let next = match self.match_unguarded(&candidate) {
                Some(m) => m.deepest().to_string(),
                None => match self.match_suffix(&candidate) {
                    Some(m) => m.deepest().to_string(),
                    None => return candidate,
                },
            };
            if !seen.insert(next.clone()) {
                return next;
            }
            candidate = next;
        }
    }

    /// Test progressively shorter whitespace-separated suffixes.
    fn match_suffix(&self, candidate: &str) -> Option<TitleMatch> {
        let mut rest = candidate;
        loop {
            let cut = rest.find(char::is_whitespace)?;
            rest = rest[cut..].trim_start();
            if rest.is_empty() {
                return None;
            }
            if let Some(m) = self.match_unguarded(rest) {
                return Some(m);
            }
        }
    }
}
