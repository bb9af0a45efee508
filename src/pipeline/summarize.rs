//! Summarisation and text optimisation over a [`Completer`].
//!
//! ## Flow
//!
//! ```text
//!            ≤ chunk_size
//! text ──┬──────────────────▶ direct ─────────────────────────▶ summary
//!        │ > chunk_size                                        ▲
//!        └──▶ split ──▶ fan-out (≤ concurrency) ──▶ reassemble ┤
//!                                                   │ > chunk_size, >1 chunk
//!                                                   └──▶ summarise again
//! ```
//!
//! Chunks are paragraph-aligned: the text is split on blank lines and
//! paragraphs are packed greedily, so no paragraph is ever cut. When there is
//! more than one chunk every chunk is summarised at [`SummaryLength::Short`];
//! the caller's length only applies to the final pass.
//!
//! Chunk results are written into a slot per index and joined in index
//! order, never completion order. A chunk whose call fails contributes the
//! first 500 characters of its own text followed by `...`.

use super::llm::{complete_with_retry, Completer, CompletionRequest, RetryPolicy};
use crate::config::{OptimizationKind, ProcessingConfig, SummaryLength};
use crate::error::Pdf2TextError;
use crate::output::{ChunkOutcome, DocumentRecord, SummaryChunk, Table};
use crate::progress::SharedProgress;
use crate::prompts;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Characters of source text kept when a chunk falls back.
pub const FALLBACK_CHARS: usize = 500;

/// Cells at most this long (trimmed) are left alone by [`Summarizer::optimize_table`].
const MIN_OPTIMIZED_CELL_CHARS: usize = 10;

/// How a text will be summarised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Direct,
    FanOut(Vec<SummaryChunk>),
}

/// Decide between a direct call and a chunked fan-out.
pub fn plan(text: &str, chunk_size: usize) -> Plan {
    if text.chars().count() <= chunk_size {
        Plan::Direct
    } else {
        Plan::FanOut(split_into_chunks(text, chunk_size))
    }
}

/// Pack blank-line-separated paragraphs into chunks of at most `chunk_size`
/// characters (separators not counted). A paragraph longer than `chunk_size`
/// becomes a chunk of its own.
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<SummaryChunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for paragraph in text.split("\n\n") {
        let size = paragraph.chars().count();
        if current_size + size > chunk_size && !current.is_empty() {
            chunks.push(SummaryChunk::new(chunks.len(), current.join("\n\n")));
            current.clear();
            current_size = 0;
        }
        current.push(paragraph);
        current_size += size;
    }
    if !current.is_empty() {
        chunks.push(SummaryChunk::new(chunks.len(), current.join("\n\n")));
    }
    chunks
}

/// The stand-in for a chunk whose summary failed.
pub fn truncated_fallback(text: &str) -> String {
    let mut out: String = text.chars().take(FALLBACK_CHARS).collect();
    out.push_str("...");
    out
}

/// Summarises and optimises text with one completer and one retry policy.
pub struct Summarizer {
    completer: Arc<dyn Completer>,
    policy: RetryPolicy,
    model: String,
    temperature: f32,
    chunk_size: usize,
    concurrency: usize,
    custom_instructions: Option<String>,
    progress: Option<SharedProgress>,
}

impl Summarizer {
    pub fn new(completer: Arc<dyn Completer>, config: &ProcessingConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| completer.default_model().to_string());
        Self {
            policy: RetryPolicy::from_config(config),
            model,
            temperature: config.temperature,
            chunk_size: config.chunk_size.max(1),
            concurrency: config.concurrency.max(1),
            custom_instructions: config.custom_instructions.clone(),
            progress: config.progress_callback.clone(),
            completer,
        }
    }

    /// Summarise `text` at the requested length, chunking when it is longer
    /// than the chunk size.
    ///
    /// # Errors
    /// Only from a direct (unchunked) call; chunk failures fall back to
    /// truncated source text.
    pub async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String, Pdf2TextError> {
        match plan(text, self.chunk_size) {
            Plan::Direct => self.summarize_direct(text, length).await,
            Plan::FanOut(chunks) => {
                let total = chunks.len();
                info!("Split text into {} chunks for summarisation", total);
                let chunks = self.summarize_chunks(chunks, length).await;
                let combined = chunks
                    .iter()
                    .map(|c| c.result.as_ref().map(ChunkOutcome::text).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\n\n");

                if total > 1 && combined.chars().count() > self.chunk_size {
                    info!("Generating final summary from {} chunk summaries", total);
                    match self.summarize_direct(&combined, length).await {
                        Ok(summary) => Ok(summary),
                        Err(e) => {
                            warn!("Final summary failed, returning chunk summaries: {}", e);
                            Ok(combined)
                        }
                    }
                } else {
                    Ok(combined)
                }
            }
        }
    }

    /// One summary call, no chunking.
    pub async fn summarize_direct(
        &self,
        text: &str,
        length: SummaryLength,
    ) -> Result<String, Pdf2TextError> {
        let request = CompletionRequest::new(
            self.model.as_str(),
            prompts::summary_prompt(length, self.custom_instructions.as_deref()),
            text,
            self.temperature,
            length.max_tokens(),
        );
        debug!("Summarising {} chars at {:?} length", text.chars().count(), length);
        complete_with_retry(self.completer.as_ref(), &request, &self.policy).await
    }

    /// Summarise every chunk with at most `concurrency` calls in flight and
    /// return the chunks with their results filled in.
    pub async fn summarize_chunks(
        &self,
        chunks: Vec<SummaryChunk>,
        length: SummaryLength,
    ) -> Vec<SummaryChunk> {
        let total = chunks.len();
        let chunk_length = if total > 1 { SummaryLength::Short } else { length };
        if let Some(cb) = &self.progress {
            cb.on_summary_start(total);
        }

        let mut slots: Vec<Option<ChunkOutcome>> = vec![None; total];
        let mut completed = 0;
        {
            let mut pending = stream::iter(chunks.iter().map(|chunk| async move {
                let result = self.summarize_direct(&chunk.text, chunk_length).await;
                (chunk.index, result)
            }))
            .buffer_unordered(self.concurrency);

            while let Some((index, result)) = pending.next().await {
                let outcome = match result {
                    Ok(summary) => ChunkOutcome::Summary(summary),
                    Err(e) => {
                        warn!("Chunk {} failed, using truncated source: {}", index, e);
                        ChunkOutcome::Fallback(truncated_fallback(&chunks[index].text))
                    }
                };
                slots[index] = Some(outcome);
                completed += 1;
                if let Some(cb) = &self.progress {
                    cb.on_chunk_complete(completed, total);
                }
            }
        }

        chunks
            .into_iter()
            .zip(slots)
            .map(|(chunk, result)| SummaryChunk { result, ..chunk })
            .collect()
    }

    /// Replace the document's full text with its summary, keeping every
    /// structural field.
    pub async fn summarize_document(
        &self,
        doc: DocumentRecord,
        length: SummaryLength,
    ) -> Result<DocumentRecord, Pdf2TextError> {
        let summary = self.summarize(&doc.all_text, length).await?;
        Ok(doc.with_text(summary))
    }

    /// Rewrite `text` for grammar, clarity or terminology. Returns the
    /// original text when the call fails.
    pub async fn optimize_text(&self, text: &str, kind: OptimizationKind) -> String {
        let request = CompletionRequest::new(
            self.model.as_str(),
            prompts::optimization_prompt(kind, self.custom_instructions.as_deref()),
            text,
            self.temperature,
            prompts::OPTIMIZE_MAX_TOKENS,
        );
        match complete_with_retry(self.completer.as_ref(), &request, &self.policy).await {
            Ok(optimized) => optimized,
            Err(e) => {
                warn!("Text optimisation failed, keeping original: {}", e);
                text.to_string()
            }
        }
    }

    /// Grammar-optimise the longer cells of a table, keeping its shape.
    pub async fn optimize_table(&self, table: Table) -> Table {
        let mut data = Vec::with_capacity(table.data.len());
        for row in &table.data {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                if cell.trim().chars().count() > MIN_OPTIMIZED_CELL_CHARS {
                    cells.push(self.optimize_text(cell, OptimizationKind::Grammar).await);
                } else {
                    cells.push(cell.clone());
                }
            }
            data.push(cells);
        }
        table.map_data(data)
    }
}
