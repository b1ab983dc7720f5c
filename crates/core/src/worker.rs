//! Run a [`ProcessingSession`] on a blocking thread and talk to it with
//! request/response messages.
//!
//! Each request carries an id and its own reply channel; the reply echoes
//! the id. Requests are handled one at a time, in order. A session that
//! fails reports it as [`Response::Error`]; transport problems are
//! [`WorkerError`]s.

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::document::{ChunkPayload, ProcessedBook};
use crate::error::WorkerError;
use crate::metadata::BookMetadata;
use crate::session::ProcessingSession;
use crate::source::ByteSource;

/// Requests queued before the caller is made to wait.
const REQUEST_QUEUE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    DetectMetadata,
    ProcessInitialChunk,
    ProcessRemainingContent,
    GenerateTitlePage,
    GenerateEndPage,
    AssembleBook,
}

impl Request {
    pub fn operation(self) -> &'static str {
        match self {
            Request::DetectMetadata => "detectMetadata",
            Request::ProcessInitialChunk => "processInitialChunk",
            Request::ProcessRemainingContent => "processRemainingContent",
            Request::GenerateTitlePage => "generateTitlePage",
            Request::GenerateEndPage => "generateEndPage",
            Request::AssembleBook => "assembleBook",
        }
    }
}

/// Outcome of one request, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    MetadataProcessed(BookMetadata),
    InitialChunkProcessed(ChunkPayload),
    RemainingContentProcessed(ChunkPayload),
    TitlePageGenerated {
        #[serde(rename = "titlePageLines")]
        title_page_lines: Vec<String>,
    },
    EndPageGenerated {
        #[serde(rename = "endPageLine")]
        end_page_line: String,
    },
    BookAssembled {
        book: Box<ProcessedBook>,
    },
    Error {
        error: String,
        operation: String,
    },
}

/// Run one request against a session.
pub fn dispatch<S: ByteSource>(session: &mut ProcessingSession<S>, request: Request) -> Response {
    let result = match request {
        Request::DetectMetadata => session.detect_metadata().map(Response::MetadataProcessed),
        Request::ProcessInitialChunk => session
            .process_initial_chunk()
            .map(Response::InitialChunkProcessed),
        Request::ProcessRemainingContent => session
            .process_remaining_content()
            .map(Response::RemainingContentProcessed),
        Request::GenerateTitlePage => session
            .generate_title_page()
            .map(|title_page_lines| Response::TitlePageGenerated { title_page_lines }),
        Request::GenerateEndPage => session
            .generate_end_page()
            .map(|end_page_line| Response::EndPageGenerated { end_page_line }),
        Request::AssembleBook => session.assemble().map(|book| Response::BookAssembled {
            book: Box::new(book),
        }),
    };
    result.unwrap_or_else(|e| Response::Error {
        error: e.to_string(),
        operation: request.operation().to_string(),
    })
}

struct Envelope {
    id: u64,
    request: Request,
    reply: oneshot::Sender<(u64, Response)>,
}

/// Handle to a session running in the background.
pub struct Worker {
    requests: Option<mpsc::Sender<Envelope>>,
    next_id: u64,
    task: Option<JoinHandle<()>>,
}

impl Worker {
    /// Move `session` onto a blocking thread of the current tokio runtime.
    pub fn spawn<S: ByteSource + 'static>(session: ProcessingSession<S>) -> Result<Self, WorkerError> {
        let runtime = Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        let (tx, mut rx) = mpsc::channel::<Envelope>(REQUEST_QUEUE);

        let task = runtime.spawn_blocking(move || {
            let mut session = session;
            while let Some(envelope) = rx.blocking_recv() {
                tracing::debug!(id = envelope.id, operation = envelope.request.operation(), "worker request");
                let response = dispatch(&mut session, envelope.request);
                if envelope.reply.send((envelope.id, response)).is_err() {
                    tracing::debug!(id = envelope.id, "caller stopped waiting for reply");
                }
            }
            tracing::debug!("worker stopped");
        });

        Ok(Self {
            requests: Some(tx),
            next_id: 1,
            task: Some(task),
        })
    }

    /// Send a request and wait for its reply.
    pub async fn call(&mut self, request: Request) -> Result<Response, WorkerError> {
        let id = self.next_id;
        self.next_id += 1;
        let requests = self.requests.as_ref().ok_or(WorkerError::ChannelClosed)?;
        let (reply, receiver) = oneshot::channel();
        requests
            .send(Envelope { id, request, reply })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        let (received, response) = receiver.await.map_err(|_| WorkerError::ReplyDropped(id))?;
        if received != id {
            return Err(WorkerError::MismatchedReply { expected: id, received });
        }
        Ok(response)
    }

    pub async fn detect_metadata(&mut self) -> Result<BookMetadata, WorkerError> {
        match self.call(Request::DetectMetadata).await? {
            Response::MetadataProcessed(meta) => Ok(meta),
            other => Err(unexpected(Request::DetectMetadata, other)),
        }
    }

    pub async fn process_initial_chunk(&mut self) -> Result<ChunkPayload, WorkerError> {
        match self.call(Request::ProcessInitialChunk).await? {
            Response::InitialChunkProcessed(payload) => Ok(payload),
            other => Err(unexpected(Request::ProcessInitialChunk, other)),
        }
    }

    pub async fn process_remaining_content(&mut self) -> Result<ChunkPayload, WorkerError> {
        match self.call(Request::ProcessRemainingContent).await? {
            Response::RemainingContentProcessed(payload) => Ok(payload),
            other => Err(unexpected(Request::ProcessRemainingContent, other)),
        }
    }

    pub async fn generate_title_page(&mut self) -> Result<Vec<String>, WorkerError> {
        match self.call(Request::GenerateTitlePage).await? {
            Response::TitlePageGenerated { title_page_lines } => Ok(title_page_lines),
            other => Err(unexpected(Request::GenerateTitlePage, other)),
        }
    }

    pub async fn generate_end_page(&mut self) -> Result<String, WorkerError> {
        match self.call(Request::GenerateEndPage).await? {
            Response::EndPageGenerated { end_page_line } => Ok(end_page_line),
            other => Err(unexpected(Request::GenerateEndPage, other)),
        }
    }

    pub async fn assemble(&mut self) -> Result<ProcessedBook, WorkerError> {
        match self.call(Request::AssembleBook).await? {
            Response::BookAssembled { book } => Ok(*book),
            other => Err(unexpected(Request::AssembleBook, other)),
        }
    }

    /// Close the request channel and wait for the session thread to exit.
    pub async fn shutdown(mut self) -> Result<(), WorkerError> {
        self.requests = None;
        match self.task.take() {
            Some(task) => task.await.map_err(|e| WorkerError::Join(e.to_string())),
            None => Ok(()),
        }
    }

    /// Stop without waiting. The session is dropped once the request in
    /// progress, if any, finishes.
    pub fn cancel(mut self) {
        self.requests = None;
        self.task = None;
    }
}

fn unexpected(request: Request, response: Response) -> WorkerError {
    match response {
        Response::Error { error, operation } => WorkerError::Remote {
            operation,
            message: error,
        },
        _ => WorkerError::UnexpectedResponse(request.operation()),
    }
}

/// Drive every phase of `session` on a worker and return the assembled
/// book.
pub async fn process_in_background<S: ByteSource + 'static>(
    session: ProcessingSession<S>,
) -> Result<ProcessedBook, WorkerError> {
    let title_page = session.options().title_page;
    let mut worker = Worker::spawn(session)?;

    worker.detect_metadata().await?;
    let first = worker.process_initial_chunk().await?;
    if !first.is_final {
        worker.process_remaining_content().await?;
    }
    if title_page {
        worker.generate_title_page().await?;
    }
    worker.generate_end_page().await?;
    let book = worker.assemble().await?;
    worker.shutdown().await?;
    Ok(book)
}
