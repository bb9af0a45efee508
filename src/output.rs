//! Output types: the document record handed from stage to stage.
//!
//! A [`DocumentRecord`] is produced by the extractor, rebuilt by the
//! normaliser and, optionally, by the summariser. Each stage takes the record
//! by value and returns a new one, so a caller can keep the before/after
//! snapshots side by side.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Document-level properties read from the PDF info dictionary.
///
/// An all-empty value (see [`DocumentMetadata::is_empty`]) means "metadata
/// unavailable", e.g. an encrypted file opened without a password. It does not
/// mean the document has no metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    /// Number of pages reported by the document.
    pub page_count: usize,
    /// Whether the file carries an encryption dictionary.
    pub is_encrypted: bool,
}

impl DocumentMetadata {
    /// `true` when nothing could be read from the document.
    pub fn is_empty(&self) -> bool {
        self.page_count == 0
            && self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.creator.is_none()
            && self.producer.is_none()
            && self.creation_date.is_none()
    }
}

/// A table detected on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// 1-indexed page the table was found on.
    pub page_number: usize,
    /// 1-indexed position of the table on its page.
    pub table_number: usize,
    /// 1-indexed position of the table in [`DocumentRecord::all_tables`].
    pub document_table_number: usize,
    /// Row-major cells. Never contains missing cells; rows may be ragged.
    pub data: Vec<Vec<String>>,
    pub rows: usize,
    /// Column count of the first row.
    pub columns: usize,
}

impl Table {
    /// Build a table from detector output, trimming every cell and
    /// substituting the empty string for missing cells.
    pub fn from_cells(
        page_number: usize,
        table_number: usize,
        cells: Vec<Vec<Option<String>>>,
    ) -> Self {
        let data: Vec<Vec<String>> = cells
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(|c| c.trim().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self::with_data(page_number, table_number, data)
    }

    /// Build a table around already-clean cell data.
    pub fn with_data(page_number: usize, table_number: usize, data: Vec<Vec<String>>) -> Self {
        let rows = data.len();
        let columns = data.first().map(Vec::len).unwrap_or(0);
        Self {
            page_number,
            table_number,
            document_table_number: 0,
            data,
            rows,
            columns,
        }
    }

    /// Replace the cell data, recomputing the shape counters.
    pub fn map_data(self, data: Vec<Vec<String>>) -> Self {
        let mut table = Self::with_data(self.page_number, self.table_number, data);
        table.document_table_number = self.document_table_number;
        table
    }
}

/// One page of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed, matches the source page order.
    pub page_number: usize,
    pub text: String,
    pub paragraphs: Vec<String>,
    pub word_count: usize,
    pub width: f32,
    pub height: f32,
    pub tables: Vec<Table>,
}

impl Page {
    /// The stand-in for a page whose extraction failed.
    pub fn empty(page_number: usize) -> Self {
        Self {
            page_number,
            text: String::new(),
            paragraphs: Vec::new(),
            word_count: 0,
            width: 0.0,
            height: 0.0,
            tables: Vec::new(),
        }
    }
}

/// Aggregate counters, always equal to the sums over [`DocumentRecord::pages`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_pages: usize,
    pub total_words: usize,
    pub total_tables: usize,
    pub total_paragraphs: usize,
}

impl Statistics {
    /// Recompute the counters from scratch.
    pub fn from_pages(pages: &[Page]) -> Self {
        pages.iter().fold(Self::default(), |mut stats, page| {
            stats.record(page);
            stats
        })
    }

    fn record(&mut self, page: &Page) {
        self.total_pages += 1;
        self.total_words += page.word_count;
        self.total_tables += page.tables.len();
        self.total_paragraphs += page.paragraphs.len();
    }
}

/// The full extraction result for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub metadata: DocumentMetadata,
    pub pages: Vec<Page>,
    /// Page texts in order, each followed by a blank line.
    pub all_text: String,
    /// Every table of every page, in page order.
    pub all_tables: Vec<Table>,
    pub statistics: Statistics,
    /// Pages that were degraded to empty records.
    pub page_errors: Vec<PageError>,
}

impl DocumentRecord {
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Fold one page into the record, numbering its tables in the flattened
    /// collection and updating the statistics incrementally.
    pub(crate) fn push_page(&mut self, mut page: Page) {
        for table in &mut page.tables {
            table.document_table_number = self.all_tables.len() + 1;
            self.all_tables.push(table.clone());
        }
        self.all_text.push_str(&page.text);
        self.all_text.push_str("\n\n");
        self.statistics.record(&page);
        self.pages.push(page);
    }

    /// Record a page that failed and was replaced by [`Page::empty`].
    pub(crate) fn push_failed_page(&mut self, error: PageError) {
        let page = Page::empty(error.page());
        self.page_errors.push(error);
        self.push_page(page);
    }

    /// Same record with the full text replaced, e.g. by a summary.
    pub fn with_text(self, all_text: String) -> Self {
        Self { all_text, ..self }
    }

    /// `true` when the statistics match the page sequence and page numbers
    /// run contiguously from 1.
    pub fn is_consistent(&self) -> bool {
        let numbered = self
            .pages
            .iter()
            .enumerate()
            .all(|(i, page)| page.page_number == i + 1);
        numbered
            && self.statistics == Statistics::from_pages(&self.pages)
            && self.all_tables.len() == self.statistics.total_tables
    }
}

/// Result of extracting a page range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDocument {
    pub pages: Vec<Page>,
    pub text: String,
    pub tables: Vec<Table>,
    pub page_errors: Vec<PageError>,
}

/// What a summarisation worker produced for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The completion endpoint's answer.
    Summary(String),
    /// Truncated source text used because the chunk failed.
    Fallback(String),
}

impl ChunkOutcome {
    pub fn text(&self) -> &str {
        match self {
            ChunkOutcome::Summary(s) | ChunkOutcome::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ChunkOutcome::Fallback(_))
    }
}

/// A paragraph-aligned slice of text summarised as one unit.
///
/// `index` and `text` never change after creation; `result` is written once
/// by the collector for that index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryChunk {
    pub index: usize,
    pub text: String,
    pub result: Option<ChunkOutcome>,
}

impl SummaryChunk {
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            text,
            result: None,
        }
    }
}
