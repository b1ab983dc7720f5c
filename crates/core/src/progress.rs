//! Progress reporting for document processing.

/// Event emitted as a session consumes its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub operation: String,
    /// Bytes consumed so far.
    pub current: u64,
    /// Source length in bytes.
    pub total: Option<u64>,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.current as f64 / total as f64),
            None => None,
        }
    }
}

/// Receives progress updates. Closures taking a [`ProgressEvent`] qualify.
pub trait ProgressHandler: Send {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressHandler for F
where
    F: Fn(ProgressEvent) + Send,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Emit a progress event if a handler is provided.
pub fn emit_progress(
    handler: Option<&dyn ProgressHandler>,
    operation: &str,
    current: u64,
    total: Option<u64>,
    message: Option<&str>,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            operation: operation.to_string(),
            current,
            total,
            message: message.map(|s| s.to_string()),
        });
    }
}
