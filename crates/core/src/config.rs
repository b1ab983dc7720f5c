//! Config file parsing for `~/.config/textpager/config.toml`.
//!
//! Use `processing_options_from_config` to turn the loaded config into the
//! options a [`ProcessingSession`](crate::session::ProcessingSession) takes.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paginate::PaginationOptions;
use crate::session::{ProcessingOptions, DEFAULT_INITIAL_CHUNK_SIZE, DEFAULT_OVERLAP_RATIO};
use crate::title::{InferenceOptions, DEFAULT_MAX_TITLE_CHARS};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub pagination: PaginationOptions,
    #[serde(default)]
    pub titles: TitlesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Bytes decoded in the first phase.
    pub initial_chunk_size: u64,
    /// Share of the first chunk's lines re-paginated with the remainder.
    pub overlap_ratio: f64,
    pub detection_sample_size: usize,
    /// Encoding label that bypasses detection.
    pub encoding: Option<String>,
    pub strict_decoding: bool,
    pub normalize_unicode: bool,
    pub title_page: bool,
    pub strip_metadata_lines: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            initial_chunk_size: DEFAULT_INITIAL_CHUNK_SIZE,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            detection_sample_size: crate::encoding::DEFAULT_SAMPLE_SIZE,
            encoding: None,
            strict_decoding: false,
            normalize_unicode: true,
            title_page: true,
            strip_metadata_lines: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlesConfig {
    pub max_title_chars: usize,
    pub inference: InferenceOptions,
}

impl Default for TitlesConfig {
    fn default() -> Self {
        Self {
            max_title_chars: DEFAULT_MAX_TITLE_CHARS,
            inference: InferenceOptions::default(),
        }
    }
}

/// Load config from the default path (`~/.config/textpager/config.toml`).
/// A missing or unreadable file yields the defaults.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            AppConfig::default()
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("textpager");
        p.push("config.toml");
        p
    })
}

/// Build session options from the full app config.
pub fn processing_options_from_config(cfg: &AppConfig) -> ProcessingOptions {
    let p = &cfg.processing;
    ProcessingOptions {
        initial_chunk_size: p.initial_chunk_size,
        overlap_ratio: p.overlap_ratio,
        detection_sample_size: p.detection_sample_size,
        encoding: p.encoding.clone(),
        strict_decoding: p.strict_decoding,
        normalize_unicode: p.normalize_unicode,
        title_page: p.title_page,
        strip_metadata_lines: p.strip_metadata_lines,
        pagination: cfg.pagination.clone(),
        max_title_chars: cfg.titles.max_title_chars,
        inference: cfg.titles.inference.clone(),
    }
}

impl AppConfig {
    /// Set one value by its dotted key, e.g. `pagination.eastern_page_size`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["processing", sub] => {
                let p = &mut self.processing;
                match *sub {
                    "initial_chunk_size" => p.initial_chunk_size = parse(key, value)?,
                    "overlap_ratio" => p.overlap_ratio = parse_ratio(key, value)?,
                    "detection_sample_size" => p.detection_sample_size = parse(key, value)?,
                    "encoding" => {
                        p.encoding = match value {
                            "" | "auto" => None,
                            label => Some(label.to_string()),
                        }
                    }
                    "strict_decoding" => p.strict_decoding = parse(key, value)?,
                    "normalize_unicode" => p.normalize_unicode = parse(key, value)?,
                    "title_page" => p.title_page = parse(key, value)?,
                    "strip_metadata_lines" => p.strip_metadata_lines = parse(key, value)?,
                    _ => return Err(ConfigError::UnknownKey(key.to_string())),
                }
            }
            ["pagination", sub] => {
                let p = &mut self.pagination;
                match *sub {
                    "eastern_page_size" => p.eastern_page_size = parse(key, value)?,
                    "western_page_size" => p.western_page_size = parse(key, value)?,
                    "page_break_on_title" => p.page_break_on_title = parse(key, value)?,
                    _ => return Err(ConfigError::UnknownKey(key.to_string())),
                }
            }
            ["titles", "max_title_chars"] => self.titles.max_title_chars = parse(key, value)?,
            ["titles", "inference", sub] => {
                let i = &mut self.titles.inference;
                match *sub {
                    "enabled" => i.enabled = parse(key, value)?,
                    "sample_lines" => i.sample_lines = parse(key, value)?,
                    "min_occurrences" => i.min_occurrences = parse(key, value)?,
                    "max_density" => i.max_density = parse_ratio(key, value)?,
                    "min_confidence" => i.min_confidence = parse_ratio(key, value)?,
                    _ => return Err(ConfigError::UnknownKey(key.to_string())),
                }
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_ratio(key: &str, value: &str) -> Result<f64, ConfigError> {
    let ratio: f64 = parse(key, value)?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
