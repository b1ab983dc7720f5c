//! Per-document processing: detection, the initial chunk, the remainder
//! of the file, and the generated title and end pages.
//!
//! The file is processed in two phases. The initial chunk (1 MiB by
//! default) is decoded up to its last complete line and paginated; the
//! breaks inside its trailing overlap stay tentative. The remainder is then
//! decoded in one piece and paginated together with the overlap, so pages
//! near the seam are decided with text from both sides.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{
    ChunkPayload, FootnoteEntry, LogicalLine, PageBreakList, ProcessedBook, TitleEntry, TitleIndex,
};
use crate::encoding::{self, DecodeMode, EncodingGuess};
use crate::error::{PipelineError, SessionError};
use crate::footnote::FootnoteExtractor;
use crate::html;
use crate::metadata::{BookMetadata, MetadataLines};
use crate::paginate::{self, Carry, PageMetrics, PaginationOptions, Window};
use crate::progress::{emit_progress, ProgressHandler};
use crate::segment::segment;
use crate::source::ByteSource;
use crate::title::{infer_rule, InferenceOptions, TitleMatcher, TitleRule, DEFAULT_MAX_TITLE_CHARS};

pub const DEFAULT_INITIAL_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.2;

/// Leading lines checked for a repeated book name or author credit.
const METADATA_LINE_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub initial_chunk_size: u64,
    pub overlap_ratio: f64,
    pub detection_sample_size: usize,
    /// Encoding label that bypasses detection.
    pub encoding: Option<String>,
    pub strict_decoding: bool,
    pub normalize_unicode: bool,
    /// Prepend a generated title page; content then starts at line 2 (3
    /// with an author).
    pub title_page: bool,
    pub strip_metadata_lines: bool,
    pub pagination: PaginationOptions,
    pub max_title_chars: usize,
    pub inference: InferenceOptions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            initial_chunk_size: DEFAULT_INITIAL_CHUNK_SIZE,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            detection_sample_size: encoding::DEFAULT_SAMPLE_SIZE,
            encoding: None,
            strict_decoding: false,
            normalize_unicode: true,
            title_page: true,
            strip_metadata_lines: true,
            pagination: PaginationOptions::default(),
            max_title_chars: DEFAULT_MAX_TITLE_CHARS,
            inference: InferenceOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DetectingEncoding,
    /// Metadata is known; the initial chunk is next.
    ExtractingMetadata,
    ProcessingInitialChunk,
    /// The initial chunk is merged; the remainder is next.
    ProcessingRemainingContent,
    Complete,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tail of the previous chunk, re-paginated with the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrevChunkInfo {
    /// Absolute index of `lines[0]`.
    pub start: usize,
    pub lines: Vec<LogicalLine>,
    pub titles: Vec<TitleEntry>,
    /// Committed breaks inside the overlap.
    pub committed_breaks: Vec<usize>,
    /// Breaks the first pass placed inside the overlap without committing
    /// them.
    pub tentative_breaks: Vec<usize>,
    /// The page open when the overlap starts.
    pub carry: Carry,
}

impl PrevChunkInfo {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Lines, titles and footnotes built from one chunk before merging.
#[derive(Debug, Default)]
struct ChunkLines {
    lines: Vec<LogicalLine>,
    titles: Vec<TitleEntry>,
    footnotes: Vec<FootnoteEntry>,
}

/// State of one document from detection to assembly. Every counter lives
/// here, so documents processed side by side never interact.
pub struct ProcessingSession<S: ByteSource> {
    source: S,
    options: ProcessingOptions,
    state: SessionState,
    failure: Option<String>,
    guess: EncodingGuess,
    metadata: Option<BookMetadata>,
    metadata_lines: MetadataLines,
    matcher: TitleMatcher,
    footnotes: FootnoteExtractor,
    lines: Vec<LogicalLine>,
    titles: Vec<TitleEntry>,
    titles_index: TitleIndex,
    footnote_entries: Vec<FootnoteEntry>,
    page_breaks: PageBreakList,
    /// Absolute index of the first content line.
    content_start: usize,
    /// Absolute index the next content line receives.
    next_line: usize,
    /// Byte offset where the remaining content starts.
    resume_at: u64,
    prev_chunk: Option<PrevChunkInfo>,
    title_page: Option<Vec<LogicalLine>>,
    end_page: Option<LogicalLine>,
    progress: Option<Box<dyn ProgressHandler>>,
}

impl<S: ByteSource> ProcessingSession<S> {
    pub fn new(source: S, options: ProcessingOptions) -> Self {
        let matcher = TitleMatcher::new(options.max_title_chars);
        Self {
            source,
            options,
            state: SessionState::Idle,
            failure: None,
            guess: EncodingGuess::fallback(),
            metadata: None,
            metadata_lines: MetadataLines::default(),
            matcher,
            footnotes: FootnoteExtractor::new(),
            lines: Vec::new(),
            titles: Vec::new(),
            titles_index: TitleIndex::new(),
            footnote_entries: Vec::new(),
            page_breaks: PageBreakList::new(),
            content_start: 0,
            next_line: 0,
            resume_at: 0,
            prev_chunk: None,
            title_page: None,
            end_page: None,
            progress: None,
        }
    }

    pub fn with_progress(mut self, handler: impl ProgressHandler + 'static) -> Self {
        self.progress = Some(Box::new(handler));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn metadata(&self) -> Option<&BookMetadata> {
        self.metadata.as_ref()
    }

    pub fn prev_chunk_info(&self) -> Option<&PrevChunkInfo> {
        self.prev_chunk.as_ref()
    }

    pub fn titles(&self) -> &[TitleEntry] {
        &self.titles
    }

    pub fn page_breaks(&self) -> &[usize] {
        self.page_breaks.as_slice()
    }

    /// The title rule inferred from the first chunk, if any.
    pub fn custom_rule(&self) -> Option<&TitleRule> {
        self.matcher.custom_rule()
    }

    pub fn has_remaining_content(&self) -> bool {
        self.state == SessionState::ProcessingRemainingContent
    }

    fn guard(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if self.state == SessionState::Failed {
            let reason = self.failure.clone().unwrap_or_default();
            return Err(SessionError::Aborted(reason));
        }
        if !allowed.contains(&self.state) {
            return Err(SessionError::InvalidState {
                operation,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, operation: &str, err: PipelineError) -> PipelineError {
        tracing::error!(operation, error = %err, "document processing failed");
        self.state = SessionState::Failed;
        self.failure = Some(err.to_string());
        err
    }

    /// Detect encoding and script, and derive book name and author from
    /// the file name.
    pub fn detect_metadata(&mut self) -> Result<BookMetadata, PipelineError> {
        self.guard("detectMetadata", &[SessionState::Idle])?;
        self.state = SessionState::DetectingEncoding;

        let len = self.source.len();
        let sample_size = self.options.detection_sample_size.max(1);
        let head_len = len.min(sample_size as u64);
        let head = match self.source.read_range(0..head_len) {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(error = %e, "could not read detection sample");
                Vec::new()
            }
        };
        let sample = encoding::detection_sample(&head, sample_size);
        self.guess = match encoding::resolve(&sample, self.options.encoding.as_deref()) {
            Ok(guess) => guess,
            Err(e) => {
                tracing::warn!(error = %e, "encoding detection failed, using UTF-8");
                EncodingGuess::fallback()
            }
        };
        if self.guess.defaulted {
            tracing::warn!(source = self.source.name(), "empty detection sample, using UTF-8");
        }

        self.state = SessionState::ExtractingMetadata;
        let metadata = BookMetadata::from_file_name(self.source.name(), &self.guess);
        self.metadata_lines = match MetadataLines::new(&metadata) {
            Ok(lines) => lines,
            Err(e) => return Err(self.fail("detectMetadata", e.into())),
        };
        tracing::info!(
            encoding = %metadata.encoding,
            eastern = metadata.is_eastern,
            book = %metadata.book_name,
            author = %metadata.author,
            "metadata detected"
        );
        emit_progress(self.progress.as_deref(), "detect", head_len, Some(len), None);
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Decode, segment and paginate the first chunk.
    pub fn process_initial_chunk(&mut self) -> Result<ChunkPayload, PipelineError> {
        self.guard("processInitialChunk", &[SessionState::ExtractingMetadata])?;
        self.state = SessionState::ProcessingInitialChunk;
        match self.initial_chunk() {
            Ok(payload) => Ok(payload),
            Err(e) => Err(self.fail("processInitialChunk", e)),
        }
    }

    fn initial_chunk(&mut self) -> Result<ChunkPayload, PipelineError> {
        let len = self.source.len();
        let mut end = len.min(self.options.initial_chunk_size.max(1));
        let mut bytes = self.source.read_range(0..end)?;
        let mut is_last = end >= len;

        if !is_last {
            match encoding::last_line_boundary(&bytes, self.guess.encoding) {
                Some(boundary) => self.resume_at = boundary as u64,
                None => {
                    tracing::warn!(end, "no line break in the initial chunk, reading the whole file");
                    end = len;
                    bytes = self.source.read_range(0..end)?;
                    is_last = true;
                }
            }
        }
        tracing::debug!(bytes = bytes.len(), is_last, resume_at = self.resume_at, "initial chunk");

        let mode = DecodeMode {
            strict: self.options.strict_decoding,
            sniff_bom: true,
            last: is_last,
        };
        let text = self.decode(&bytes, mode, 0)?;
        let mut raw_lines = segment(&text, !is_last);

        if self.options.strip_metadata_lines {
            let removed = self.metadata_lines.strip_leading(&mut raw_lines, METADATA_LINE_WINDOW);
            if removed > 0 {
                tracing::debug!(removed, "dropped leading name/author lines");
            }
        }

        // The inferred rule must be in place before any line is matched.
        if let Some(rule) = infer_rule(&raw_lines, &self.matcher, &self.options.inference) {
            self.matcher.install_custom(TitleRule::Inferred(rule));
        }
        self.matcher.lock();

        if self.options.title_page {
            let author = self.metadata.as_ref().map_or("", |m| m.author.as_str());
            self.content_start = html::title_page_len(author);
            self.page_breaks.push(0)?;
        }
        self.next_line = self.content_start;

        let start_line = self.next_line;
        let chunk = self.build_lines(raw_lines);
        let metrics: Vec<PageMetrics> = chunk.lines.iter().map(metrics_of).collect();
        let forced = [start_line];
        let breaks = paginate::paginate(&Window {
            start: start_line,
            lines: &metrics,
            forced: &forced,
            carry: Carry::default(),
            target: self.target(),
            page_break_on_title: self.options.pagination.page_break_on_title,
        });

        let overlap_len = if is_last {
            0
        } else {
            overlap_len(chunk.lines.len(), self.options.overlap_ratio)
        };
        let overlap_start = start_line + chunk.lines.len() - overlap_len;
        // Breaks inside the overlap are decided again with the next chunk.
        let (committed, tentative): (Vec<usize>, Vec<usize>) = breaks
            .into_iter()
            .partition(|&b| is_last || b < overlap_start || b == start_line);

        let payload = self.merge(chunk, committed, start_line, is_last)?;
        if self.page_breaks.is_empty() {
            self.page_breaks.push(0)?;
        }

        if is_last {
            self.state = SessionState::Complete;
            tracing::info!(lines = self.lines.len(), titles = self.titles.len(), "document complete");
        } else {
            self.prev_chunk = Some(self.capture_overlap(overlap_start, tentative));
            self.state = SessionState::ProcessingRemainingContent;
            tracing::info!(lines = payload.html_lines.len(), overlap = overlap_len, "initial chunk processed");
        }
        emit_progress(self.progress.as_deref(), "initial", end.min(len), Some(len), None);
        Ok(payload)
    }

    /// Decode and paginate everything after the initial chunk, together
    /// with the overlap kept from it.
    pub fn process_remaining_content(&mut self) -> Result<ChunkPayload, PipelineError> {
        self.guard("processRemainingContent", &[SessionState::ProcessingRemainingContent])?;
        match self.remaining_content() {
            Ok(payload) => Ok(payload),
            Err(e) => Err(self.fail("processRemainingContent", e)),
        }
    }

    fn remaining_content(&mut self) -> Result<ChunkPayload, PipelineError> {
        let len = self.source.len();
        let start = self.resume_at;
        let bytes = self.source.read_range(start..len)?;
        tracing::debug!(start, end = len, "remaining content");

        let mode = DecodeMode {
            strict: self.options.strict_decoding,
            sniff_bom: false,
            last: true,
        };
        let text = self.decode(&bytes, mode, start)?;
        let raw_lines = segment(&text, false);

        let start_line = self.next_line;
        let chunk = self.build_lines(raw_lines);
        let prev = self.prev_chunk.take().unwrap_or_else(|| PrevChunkInfo {
            start: start_line,
            ..PrevChunkInfo::default()
        });

        let metrics: Vec<PageMetrics> = prev
            .lines
            .iter()
            .chain(chunk.lines.iter())
            .map(metrics_of)
            .collect();
        let breaks = paginate::paginate(&Window {
            start: prev.start,
            lines: &metrics,
            forced: &prev.committed_breaks,
            carry: prev.carry,
            target: self.target(),
            page_break_on_title: self.options.pagination.page_break_on_title,
        });
        let settled: Vec<usize> = breaks
            .iter()
            .copied()
            .filter(|b| (prev.start..start_line).contains(b) && !prev.committed_breaks.contains(b))
            .collect();
        if settled != prev.tentative_breaks {
            tracing::debug!(
                tentative = ?prev.tentative_breaks,
                settled = ?settled,
                overlap_start = prev.start,
                "overlap breaks revised"
            );
        }

        let payload = self.merge(chunk, breaks, start_line, true)?;
        self.state = SessionState::Complete;
        tracing::info!(
            lines = payload.html_lines.len(),
            overlap = prev.lines.len(),
            pages = self.page_breaks.len(),
            "remaining content processed"
        );
        emit_progress(self.progress.as_deref(), "remaining", len, Some(len), None);
        Ok(payload)
    }

    /// Heading lines for the book name and author, numbered from line 0.
    pub fn generate_title_page(&mut self) -> Result<Vec<String>, PipelineError> {
        self.guard(
            "generateTitlePage",
            &[
                SessionState::ExtractingMetadata,
                SessionState::ProcessingRemainingContent,
                SessionState::Complete,
            ],
        )?;
        if !self.options.title_page {
            return Err(SessionError::Disabled("generateTitlePage").into());
        }
        if self.title_page.is_some() {
            return Err(SessionError::AlreadyDone("generateTitlePage").into());
        }
        let (name, author) = self
            .metadata
            .as_ref()
            .map_or(("", ""), |m| (m.book_name.as_str(), m.author.as_str()));
        let lines = html::title_page(name, author);
        self.title_page = Some(
            lines
                .iter()
                .enumerate()
                .map(|(index, html)| LogicalLine {
                    index,
                    html: html.clone(),
                    measure: 0,
                    is_title: false,
                    is_title_page_line: true,
                    is_end_page_line: false,
                })
                .collect(),
        );
        Ok(lines)
    }

    /// The closing ornament, placed after every content line.
    pub fn generate_end_page(&mut self) -> Result<String, PipelineError> {
        self.guard("generateEndPage", &[SessionState::Complete])?;
        if self.end_page.is_some() {
            return Err(SessionError::AlreadyDone("generateEndPage").into());
        }
        let line = html::end_page(self.next_line);
        self.end_page = Some(LogicalLine {
            index: self.next_line,
            html: line.clone(),
            measure: 0,
            is_title: false,
            is_title_page_line: false,
            is_end_page_line: true,
        });
        Ok(line)
    }

    /// Every line in display order: title page, content, end page.
    pub fn lines(&self) -> impl Iterator<Item = &LogicalLine> + '_ {
        self.title_page
            .iter()
            .flatten()
            .chain(self.lines.iter())
            .chain(self.end_page.iter())
    }

    /// The whole document as processed so far.
    pub fn assemble(&self) -> Result<ProcessedBook, PipelineError> {
        self.guard("assembleBook", &[SessionState::Complete])?;
        let metadata = self
            .metadata
            .clone()
            .unwrap_or_else(|| BookMetadata::from_file_name(self.source.name(), &self.guess));
        let mut book = ProcessedBook {
            metadata,
            title_page_lines: Vec::new(),
            html_lines: Vec::with_capacity(self.lines.len()),
            end_page_line: None,
            titles: self.titles.clone(),
            titles_index: self.titles_index.clone(),
            footnotes: self.footnote_entries.clone(),
            page_breaks: self.page_breaks.clone(),
        };
        for line in self.lines() {
            if line.is_title_page_line {
                book.title_page_lines.push(line.html.clone());
            } else if line.is_end_page_line {
                book.end_page_line = Some(line.html.clone());
            } else {
                book.html_lines.push(line.html.clone());
            }
        }
        Ok(book)
    }

    /// Run every phase in order and assemble the result.
    pub fn run_to_completion(&mut self) -> Result<ProcessedBook, PipelineError> {
        self.detect_metadata()?;
        self.process_initial_chunk()?;
        if self.has_remaining_content() {
            self.process_remaining_content()?;
        }
        if self.options.title_page {
            self.generate_title_page()?;
        }
        self.generate_end_page()?;
        self.assemble()
    }

    fn target(&self) -> usize {
        self.options.pagination.target(self.guess.is_eastern)
    }

    fn decode(&self, bytes: &[u8], mode: DecodeMode, offset: u64) -> Result<String, PipelineError> {
        let text = encoding::decode_chunk(bytes, self.guess.encoding, mode, offset)?;
        Ok(if self.options.normalize_unicode {
            encoding::normalize_text(text)
        } else {
            text
        })
    }

    /// Match titles, pull out footnotes and render each line.
    fn build_lines(&mut self, raw_lines: Vec<String>) -> ChunkLines {
        let is_eastern = self.guess.is_eastern;
        let mut chunk = ChunkLines::default();

        for raw in raw_lines {
            if let Some(m) = self.matcher.match_title(&raw) {
                let index = self.next_line;
                self.next_line += 1;
                chunk.titles.push(TitleEntry {
                    short_title: self.matcher.shortest_title(&m.title),
                    text: m.title.clone(),
                    line: index,
                    is_custom_only: m.is_custom_only,
                });
                chunk.lines.push(LogicalLine {
                    index,
                    html: html::title(index, &self.footnotes.link(&m.title), m.level),
                    measure: paginate::measure(&raw, is_eastern),
                    is_title: true,
                    is_title_page_line: false,
                    is_end_page_line: false,
                });
                continue;
            }

            let extracted = self.footnotes.extract(&raw);
            if let Some(note) = extracted.footnote {
                chunk.footnotes.push(FootnoteEntry {
                    id: note.id,
                    html: html::footnote_item(note.id, &note.body),
                });
                continue;
            }
            let index = self.next_line;
            self.next_line += 1;
            chunk.lines.push(LogicalLine {
                index,
                html: html::paragraph(index, &extracted.line),
                measure: paginate::measure(&raw, is_eastern),
                is_title: false,
                is_title_page_line: false,
                is_end_page_line: false,
            });
        }
        chunk
    }

    /// Append a chunk to the document and check the title index.
    fn merge(
        &mut self,
        chunk: ChunkLines,
        breaks: Vec<usize>,
        start_line: usize,
        is_final: bool,
    ) -> Result<ChunkPayload, PipelineError> {
        let mut new_breaks = Vec::new();
        for b in breaks {
            if self.page_breaks.last().map_or(true, |last| b > last) {
                self.page_breaks.push(b)?;
                new_breaks.push(b);
            }
        }

        let mut chunk_index = TitleIndex::new();
        for title in &chunk.titles {
            let position = self.titles.len();
            self.titles_index.insert(title.line, position);
            chunk_index.insert(title.line, position);
            self.titles.push(title.clone());
        }
        self.titles_index.verify(&self.titles)?;

        let payload = ChunkPayload {
            html_lines: chunk.lines.iter().map(|l| l.html.clone()).collect(),
            titles: chunk.titles,
            titles_index: chunk_index,
            footnote_counter: self.footnotes.counter(),
            footnotes: chunk.footnotes.iter().map(|f| f.html.clone()).collect(),
            page_breaks: new_breaks,
            start_line,
            is_final,
        };
        self.lines.extend(chunk.lines);
        self.footnote_entries.extend(chunk.footnotes);
        Ok(payload)
    }

    /// Keep the tail of the merged lines for the next pagination window.
    fn capture_overlap(&self, overlap_start: usize, tentative_breaks: Vec<usize>) -> PrevChunkInfo {
        let from = overlap_start - self.content_start;
        let lines = self.lines[from..].to_vec();
        let titles = self
            .titles
            .iter()
            .filter(|t| t.line >= overlap_start)
            .cloned()
            .collect();
        let mut committed_breaks = self.page_breaks.within(overlap_start..self.next_line);
        // A first chunk without content lines never reached the content start.
        if self.page_breaks.last().map_or(true, |last| last < self.content_start) {
            committed_breaks.insert(0, self.content_start);
        }
        let page_start = self
            .page_breaks
            .as_slice()
            .iter()
            .rev()
            .copied()
            .find(|&b| b < overlap_start)
            .unwrap_or(self.content_start)
            .max(self.content_start);
        let open_page: Vec<PageMetrics> = self.lines[page_start - self.content_start..from]
            .iter()
            .map(metrics_of)
            .collect();

        PrevChunkInfo {
            start: overlap_start,
            lines,
            titles,
            committed_breaks,
            tentative_breaks,
            carry: Carry::of_page(&open_page),
        }
    }
}

fn metrics_of(line: &LogicalLine) -> PageMetrics {
    PageMetrics {
        size: line.measure,
        is_title: line.is_title,
    }
}

/// Lines kept from a chunk of `count` lines: `ceil(ratio × count)`.
pub fn overlap_len(count: usize, ratio: f64) -> usize {
    let ratio = ratio.clamp(0.0, 1.0);
    ((count as f64 * ratio).ceil() as usize).min(count)
}
