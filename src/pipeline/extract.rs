//! The extractor: pages, paragraphs, tables and running statistics.
//!
//! The document-level functions ([`parse_pages`], [`parse_range`]) work on
//! any [`PageSource`], which keeps them testable without pdfium. [`Extractor`]
//! binds them to a validated file on disk.
//!
//! A page whose extraction fails is replaced by an empty page and recorded in
//! [`DocumentRecord::page_errors`]; only a document that cannot be opened at
//! all is an error.

use super::input::{self, ResolvedInput};
use super::source::{self, PageSource, RawPage};
use super::words::WordToken;
use crate::error::Pdf2TextError;
use crate::output::{DocumentMetadata, DocumentRecord, Page, PartialDocument, Table};
use crate::progress::ProgressCallback;
use std::path::Path;
use tracing::{info, warn};

/// Tokens whose tops differ by less than this belong to the same paragraph.
pub const LINE_THRESHOLD: f32 = 10.0;

/// A validated PDF plus the password to open it with.
#[derive(Debug)]
pub struct Extractor {
    input: ResolvedInput,
    password: Option<String>,
}

impl Extractor {
    /// Validate `path` and prepare to extract it.
    ///
    /// # Errors
    /// Missing file, non-`.pdf` extension, size above `max_size_mb`, or a
    /// file that does not start with `%PDF`.
    pub fn new(
        path: impl AsRef<Path>,
        password: Option<String>,
        max_size_mb: u64,
    ) -> Result<Self, Pdf2TextError> {
        let input = input::resolve_local(path, max_size_mb)?;
        Ok(Self::from_resolved(input, password))
    }

    pub fn from_resolved(input: ResolvedInput, password: Option<String>) -> Self {
        Self { input, password }
    }

    pub fn path(&self) -> &Path {
        self.input.path()
    }

    /// Whether the file is encrypted. Never fails; unreadable files answer `false`.
    pub fn check_encryption(&self) -> bool {
        source::is_encrypted(self.path())
    }

    /// Read document properties.
    ///
    /// Returns an empty [`DocumentMetadata`] when the file is encrypted and
    /// no password was supplied, or when it cannot be opened. An empty value
    /// means "unavailable", not "absent".
    pub fn extract_metadata(&self) -> DocumentMetadata {
        if self.password.is_none() && self.check_encryption() {
            warn!("{} is encrypted but no password was provided", self.path().display());
            return DocumentMetadata::default();
        }
        match source::with_pdfium_source(self.path(), self.password.as_deref(), |s| s.metadata()) {
            Ok(metadata) => {
                info!("Extracted metadata: {} pages", metadata.page_count);
                metadata
            }
            Err(e) => {
                warn!("Metadata unavailable for {}: {}", self.path().display(), e);
                DocumentMetadata::default()
            }
        }
    }

    /// Extract every page.
    ///
    /// # Errors
    /// Only when the document cannot be opened: see
    /// [`source::with_pdfium_source`].
    pub fn parse(
        &self,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<DocumentRecord, Pdf2TextError> {
        source::with_pdfium_source(self.path(), self.password.as_deref(), |s| {
            parse_pages(s, s.metadata(), progress)
        })
    }

    /// Extract the 1-indexed inclusive range `start..=end`, clipped to the
    /// document's page count.
    pub fn extract_page_range(
        &self,
        start: usize,
        end: usize,
    ) -> Result<PartialDocument, Pdf2TextError> {
        source::with_pdfium_source(self.path(), self.password.as_deref(), |s| {
            parse_range(s, start, end)
        })?
    }
}

/// Walk every page of `source` in order and fold it into a record.
pub fn parse_pages(
    source: &dyn PageSource,
    metadata: DocumentMetadata,
    progress: Option<&dyn ProgressCallback>,
) -> DocumentRecord {
    let total = source.page_count();
    info!("Starting to parse {} pages", total);
    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }

    let mut doc = DocumentRecord::new(metadata);
    for index in 0..total {
        let page_number = index + 1;
        match source.read_page(index) {
            Ok(raw) => doc.push_page(build_page(page_number, raw)),
            Err(e) => {
                warn!("{} (continuing with an empty page)", e);
                if let Some(cb) = progress {
                    cb.on_page_error(page_number, total, &e.to_string());
                }
                doc.push_failed_page(e);
            }
        }
        if let Some(cb) = progress {
            cb.on_page_complete(page_number, total);
        }
    }

    info!(
        "Parsed {} pages: {} words, {} paragraphs, {} tables",
        doc.statistics.total_pages,
        doc.statistics.total_words,
        doc.statistics.total_paragraphs,
        doc.statistics.total_tables
    );
    if let Some(cb) = progress {
        cb.on_extraction_complete(&doc.statistics);
    }
    doc
}

/// Extract the 1-indexed inclusive range `start..=end` of `source`.
///
/// `end` is clipped to the page count. A `start` past the last page or an
/// `end` before `start` yields an empty result.
///
/// # Errors
/// [`Pdf2TextError::PageOutOfRange`] when `start` is 0.
pub fn parse_range(
    source: &dyn PageSource,
    start: usize,
    end: usize,
) -> Result<PartialDocument, Pdf2TextError> {
    let total = source.page_count();
    if start == 0 {
        return Err(Pdf2TextError::PageOutOfRange { page: start, total });
    }

    let mut partial = PartialDocument::default();
    for page_number in start..=end.min(total) {
        let page = match source.read_page(page_number - 1) {
            Ok(raw) => build_page(page_number, raw),
            Err(e) => {
                warn!("{} (continuing with an empty page)", e);
                partial.page_errors.push(e);
                Page::empty(page_number)
            }
        };
        partial.text.push_str(&page.text);
        partial.text.push_str("\n\n");
        partial.tables.extend(page.tables.iter().cloned());
        partial.pages.push(page);
    }
    Ok(partial)
}

/// Turn a raw page into a [`Page`].
pub fn build_page(page_number: usize, raw: RawPage) -> Page {
    let paragraphs = group_paragraphs(&raw.words);
    let tables = raw
        .tables
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| !cells.is_empty())
        .map(|(i, cells)| Table::from_cells(page_number, i + 1, cells))
        .collect();

    Page {
        page_number,
        text: raw.text,
        paragraphs,
        word_count: raw.words.len(),
        width: raw.width,
        height: raw.height,
        tables,
    }
}

/// Join consecutive tokens into paragraphs.
///
/// A token stays in the current paragraph when its top lies within
/// [`LINE_THRESHOLD`] of the previous token's top; otherwise the paragraph is
/// flushed and a new one starts.
pub fn group_paragraphs(words: &[WordToken]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut last_top: Option<f32> = None;

    for word in words {
        let same_line = last_top.map_or(true, |y| (word.top - y).abs() < LINE_THRESHOLD);
        if !same_line && !current.is_empty() {
            paragraphs.push(current.join(" "));
            current.clear();
        }
        current.push(&word.text);
        last_top = Some(word.top);
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}
