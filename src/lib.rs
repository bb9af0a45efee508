//! # edgequake-pdf2text
//!
//! Extract, normalise and summarise PDF documents.
//!
//! Pages come out of pdfium's text layer as positioned glyphs, are snapped
//! into word tokens, grouped into paragraphs by vertical position and scanned
//! for column-aligned tables. The resulting [`DocumentRecord`] can then be
//! cleaned by a deterministic normaliser and, optionally, summarised by an
//! LLM in paragraph-aligned chunks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path / bytes: extension, size, %PDF magic
//!  ├─ 2. Extract    pages → words → paragraphs + tables (spawn_blocking)
//!  ├─ 3. Normalise  artifacts, NFC, hyphenation, symbols, whitespace, headers
//!  └─ 4. Summarise  chunk → bounded fan-out → reassemble → (re-summarise)
//! ```
//!
//! A page that fails to extract becomes an empty page and is recorded in
//! [`DocumentRecord::page_errors`]; a cleaning step that fails leaves the text
//! unchanged; a chunk whose summary fails contributes a truncated copy of its
//! source. Only input problems and terminal API failures are errors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2text::{process, ProcessingConfig, SummaryLength};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Completer auto-detected from DEEPSEEK_API_KEY / OPENAI_API_KEY / …
//!     let config = ProcessingConfig::builder()
//!         .summary(SummaryLength::Medium)
//!         .build()?;
//!     let doc = process("report.pdf", &config).await?;
//!     println!("{}", doc.all_text);
//!     eprintln!("{} pages, {} words, {} tables",
//!         doc.statistics.total_pages,
//!         doc.statistics.total_words,
//!         doc.statistics.total_tables);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2text` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2text = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CleanOptions, OptimizationKind, ProcessingConfig, ProcessingConfigBuilder, SummaryLength,
};
pub use convert::{
    extract, extract_from_bytes, extract_page_range, inspect, optimize_text, process,
    process_sync, resolve_completer, summarize_document, summarize_text,
};
pub use error::{CleanError, CompletionError, PageError, Pdf2TextError};
pub use output::{
    ChunkOutcome, DocumentMetadata, DocumentRecord, Page, PartialDocument, Statistics,
    SummaryChunk, Table,
};
pub use pipeline::llm::{Completer, CompletionRequest, HttpCompleter, ProviderCompleter};
pub use pipeline::source::{PageSource, RawPage};
pub use pipeline::summarize::Summarizer;
pub use progress::{NoopProgressCallback, ProgressCallback, SharedProgress};
