//! Turn large plain-text books into paginated, chapter-indexed HTML lines,
//! one chunk at a time.

pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod footnote;
pub mod html;
pub mod metadata;
pub mod paginate;
pub mod progress;
pub mod segment;
pub mod session;
pub mod source;
pub mod title;
pub mod worker;

pub mod prelude {
    pub use crate::document::*;
    pub use crate::error::*;
    pub use crate::metadata::BookMetadata;
    pub use crate::session::{ProcessingOptions, ProcessingSession, SessionState};
    pub use crate::source::{ByteSource, FileSource, MemorySource};
    pub use crate::worker::{process_in_background, Request, Response, Worker};
}
