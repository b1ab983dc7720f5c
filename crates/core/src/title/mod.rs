//! Chapter title detection: built-in rules, per-document inference and
//! shortest-title reduction.

pub mod infer;
pub mod matcher;
pub mod numerals;
pub mod rules;

pub use infer::{infer_rule, InferenceOptions};
pub use matcher::{TitleMatcher, DEFAULT_MAX_TITLE_CHARS};
pub use numerals::NumeralKind;
pub use rules::{built_in_rules, InferredRule, TitleLevel, TitleMatch, TitleRule};
