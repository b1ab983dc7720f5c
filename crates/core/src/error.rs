/// Top-level error type. All public pipeline entry points return this.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Encoding detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Unknown encoding label: {0}")]
    UnknownLabel(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed {encoding} input at byte {offset}")]
    Malformed { encoding: String, offset: u64 },

    #[error("Decoded text exceeds addressable size for {encoding}")]
    TooLarge { encoding: String },
}

/// Internal invariants of a document's merged state. Any of these aborts
/// the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("{titles} titles but {index_keys} title index entries")]
    TitleIndexMismatch { titles: usize, index_keys: usize },

    #[error("Title at line {line} has no title index entry")]
    MissingIndexEntry { line: usize },

    #[error("Page break {next} does not follow committed break {previous}")]
    PageBreakOrder { previous: usize, next: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Operation '{operation}' is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Session aborted after an earlier failure: {0}")]
    Aborted(String),

    #[error("Operation '{0}' is disabled by the processing options")]
    Disabled(&'static str),

    #[error("Operation '{0}' has already run")]
    AlreadyDone(&'static str),
}

/// Transport-level failures of the background worker, reported separately
/// from processing errors carried in a response.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("No async runtime available to start the worker")]
    NoRuntime,

    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Worker dropped request {0} without replying")]
    ReplyDropped(u64),

    #[error("Reply for request {received} arrived while waiting for {expected}")]
    MismatchedReply { expected: u64, received: u64 },

    #[error("Worker returned an unexpected response to '{0}'")]
    UnexpectedResponse(&'static str),

    #[error("Worker reported failure in '{operation}': {message}")]
    Remote { operation: String, message: String },

    #[error("Worker thread failed: {0}")]
    Join(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
