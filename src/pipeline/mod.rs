//! Pipeline stages for PDF extraction, normalisation and summarisation.
//!
//! Each submodule implements exactly one transformation step. Stages hand a
//! [`crate::output::DocumentRecord`] to the next by value; none mutates a
//! record another stage still holds.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ extract ──▶ normalize ──▶ summarize
//! (path)    (pdfium)   (pages)     (cleanup)     (LLM, optional)
//!            │  ▲
//!            ▼  │
//!      words ──▶ tables
//! ```
//!
//! 1. [`input`]: validate a local path or write uploaded bytes to a temp file
//! 2. [`source`]: open the document and yield positioned text per page
//! 3. [`words`]: snap glyphs into word tokens
//! 4. [`tables`]: find column-aligned runs of words
//! 5. [`extract`]: fold pages into a record with paragraphs and statistics
//! 6. [`normalize`]: deterministic text cleanup; each step falls back on failure
//! 7. [`llm`]: completion calls with retry/backoff; the only network I/O
//! 8. [`summarize`]: chunked, bounded-concurrency summarisation

pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod source;
pub mod summarize;
pub mod tables;
pub mod words;
