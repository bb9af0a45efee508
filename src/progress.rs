//! Progress-callback trait for extraction and summarisation events.
//!
//! Inject an [`Arc<dyn ProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`].
//!
//! Page events fire synchronously on the extraction thread, one page at a
//! time, so a slow implementation stalls extraction. Chunk events fire from
//! the summarisation collector as chunks complete, in completion order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2text::{ProgressCallback, ProcessingConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ProgressCallback for Printer {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         eprintln!("page {page_num}/{total_pages}");
//!     }
//! }
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Statistics;
use std::sync::Arc;

/// Called by the pipeline as it processes pages and summary chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProgressCallback: Send + Sync {
    /// Called once the page count is known, before the first page.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page, including pages degraded to an empty record.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number just finished
    /// * `total_pages`: pages that will be processed in this run
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called before `on_page_complete` when a page failed and was replaced
    /// by an empty record.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page.
    fn on_extraction_complete(&self, statistics: &Statistics) {
        let _ = statistics;
    }

    /// Called when the summariser fans out over `total_chunks` chunks.
    fn on_summary_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called after each chunk finishes, successfully or with a fallback.
    ///
    /// `completed` counts finished chunks, not chunk indices.
    fn on_chunk_complete(&self, completed: usize, total_chunks: usize) {
        let _ = (completed, total_chunks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type SharedProgress = Arc<dyn ProgressCallback>;
