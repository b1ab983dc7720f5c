//! Learn a document-specific heading convention from its first chunk.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::matcher::TitleMatcher;
use super::numerals::NumeralKind;
use super::rules::InferredRule;
use crate::footnote;

const MAX_LITERAL_CHARS: usize = 8;
const NUMBER_WINDOW: usize = 10;
const MAX_DELIMITER_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    pub enabled: bool,
    /// Lines examined from the start of the document.
    pub sample_lines: usize,
    pub min_occurrences: usize,
    /// Upper bound on matching lines per sampled line; numbered lists in
    /// prose are denser than headings.
    pub max_density: f64,
    /// Fraction of consecutive occurrences whose number increases.
    pub min_confidence: f64,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_lines: 2000,
            min_occurrences: 3,
            max_density: 0.3,
            min_confidence: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Signature {
    literal: String,
    kind: NumeralKind,
    delimiter: String,
}

/// Look for one consistent numbering convention the built-in rules miss.
pub fn infer_rule(
    lines: &[String],
    matcher: &TitleMatcher,
    options: &InferenceOptions,
) -> Option<InferredRule> {
    if !options.enabled {
        return None;
    }
    let sample = &lines[..lines.len().min(options.sample_lines)];
    if sample.is_empty() {
        return None;
    }

    let mut seen: HashMap<Signature, Vec<Option<u64>>> = HashMap::new();
    for line in sample {
        if !matcher.is_plausible(line)
            || matcher.match_title(line).is_some()
            || footnote::is_definition(line)
        {
            continue;
        }
        if let Some((signature, value)) = signature_of(line) {
            seen.entry(signature).or_default().push(value);
        }
    }

    let mut best: Option<(Signature, usize, f64)> = None;
    for (signature, values) in seen {
        let occurrences = values.len();
        if occurrences < options.min_occurrences {
            continue;
        }
        let density = occurrences as f64 / sample.len() as f64;
        if density > options.max_density {
            tracing::debug!(?signature, density, "title candidate too dense");
            continue;
        }
        let confidence = increasing_ratio(&values);
        if confidence < options.min_confidence {
            continue;
        }
        let better = match &best {
            None => true,
            Some((_, n, c)) => occurrences > *n || (occurrences == *n && confidence > *c),
        };
        if better {
            best = Some((signature, occurrences, confidence));
        }
    }

    let (signature, occurrences, confidence) = best?;
    match InferredRule::new(
        &signature.literal,
        signature.kind,
        &signature.delimiter,
        occurrences,
        confidence,
    ) {
        Ok(rule) => {
            tracing::info!(pattern = rule.pattern(), occurrences, confidence, "inferred title rule");
            Some(rule)
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding inferred title rule");
            None
        }
    }
}

/// Literal prefix, numeral run and trailing punctuation of a line.
fn signature_of(line: &str) -> Option<(Signature, Option<u64>)> {
    let chars: Vec<char> = line.chars().collect();
    let start = chars
        .iter()
        .take(NUMBER_WINDOW)
        .position(|&c| NumeralKind::of(c).is_some())?;
    let kind = NumeralKind::of(chars[start])?;
    let end = start
        + chars[start..]
            .iter()
            .take_while(|&&c| kind.accepts(c))
            .count();

    // Roman numerals must stand alone, not open a word ("CHAPTER", "Mr").
    if kind == NumeralKind::Roman
        && (chars.get(end).is_some_and(|c| c.is_alphabetic())
            || start > 0 && chars[start - 1].is_alphabetic())
    {
        return None;
    }

    let literal: String = chars[..start].iter().collect::<String>().trim_end().to_string();
    if literal.chars().count() > MAX_LITERAL_CHARS {
        return None;
    }
    let delimiter: String = chars[end..]
        .iter()
        .take_while(|&&c| is_delimiter(c))
        .take(MAX_DELIMITER_CHARS)
        .collect();
    if literal.is_empty() && delimiter.is_empty() {
        return None;
    }

    let digits: String = chars[start..end].iter().collect();
    Some((Signature { literal, kind, delimiter }, kind.value(&digits)))
}

fn is_delimiter(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

fn increasing_ratio(values: &[Option<u64>]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let increasing = values
        .windows(2)
        .filter(|pair| matches!(pair, [Some(a), Some(b)] if b > a))
        .count();
    increasing as f64 / (values.len() - 1) as f64
}
