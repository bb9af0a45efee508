//! Async entry points wiring the pipeline stages together.
//!
//! Extraction runs pdfium, which blocks, so every extraction entry point
//! moves it onto `spawn_blocking`. Normalisation is cheap and runs inline.
//! Summarisation is the only stage that needs a [`Completer`]; it is
//! resolved lazily so extraction-only runs never need an API key.

use crate::config::{OptimizationKind, ProcessingConfig, SummaryLength, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::Pdf2TextError;
use crate::output::{DocumentMetadata, DocumentRecord, PartialDocument};
use crate::pipeline::extract::Extractor;
use crate::pipeline::llm::{Completer, HttpCompleter, ProviderCompleter};
use crate::pipeline::summarize::Summarizer;
use crate::pipeline::{input, normalize};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Model used with a named provider when none is configured.
const PROVIDER_FALLBACK_MODEL: &str = "gpt-4.1-nano";

/// Extract a PDF into a [`DocumentRecord`] without normalising it.
///
/// # Errors
/// Input errors (missing file, wrong extension, too large, not a PDF,
/// password problems, corrupt document). Individual page failures are not
/// errors; see [`DocumentRecord::page_errors`].
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    let extractor = Extractor::new(path, config.password.clone(), config.max_file_size_mb)?;
    run_extraction(extractor, config).await
}

/// Extract a PDF held in memory.
///
/// `bytes` are written to a managed temporary directory that is removed when
/// extraction finishes. `file_name` must end in `.pdf`.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2text::{extract_from_bytes, ProcessingConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("report.pdf")?;
/// let doc = extract_from_bytes(&bytes, "report.pdf", &ProcessingConfig::default()).await?;
/// println!("{} pages", doc.statistics.total_pages);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    let resolved = input::resolve_bytes(bytes, file_name, config.max_file_size_mb)?;
    let extractor = Extractor::from_resolved(resolved, config.password.clone());
    run_extraction(extractor, config).await
}

/// Extract the 1-indexed inclusive page range `start..=end`.
///
/// `end` past the last page is clipped; a `start` past it yields an empty
/// result.
///
/// # Errors
/// Input errors, or [`Pdf2TextError::PageOutOfRange`] when `start` is 0.
pub async fn extract_page_range(
    path: impl AsRef<Path>,
    start: usize,
    end: usize,
    config: &ProcessingConfig,
) -> Result<PartialDocument, Pdf2TextError> {
    let extractor = Extractor::new(path, config.password.clone(), config.max_file_size_mb)?;
    tokio::task::spawn_blocking(move || extractor.extract_page_range(start, end))
        .await
        .map_err(|e| Pdf2TextError::Internal(format!("Extraction task panicked: {e}")))?
}

/// Read metadata and encryption status without extracting any page.
///
/// Does not require a completer or API key. An encrypted file opened
/// without a password yields metadata that is empty apart from
/// `is_encrypted`.
pub async fn inspect(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<DocumentMetadata, Pdf2TextError> {
    let extractor = Extractor::new(path, config.password.clone(), config.max_file_size_mb)?;
    tokio::task::spawn_blocking(move || {
        let mut metadata = extractor.extract_metadata();
        metadata.is_encrypted = extractor.check_encryption();
        metadata
    })
    .await
    .map_err(|e| Pdf2TextError::Internal(format!("Inspection task panicked: {e}")))
}

/// Extract, normalise (when `config.normalize`) and summarise (when
/// `config.summary` is set) a PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Input errors from extraction, completer resolution failures, and
/// terminal completion errors from a direct (unchunked) summary.
pub async fn process(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    let total_start = Instant::now();
    let path = path.as_ref();
    info!("Processing {}", path.display());

    // ── Step 1: Extract ──────────────────────────────────────────────────
    let doc = extract(path, config).await?;

    // ── Step 2: Normalise ────────────────────────────────────────────────
    let doc = if config.normalize {
        let clean_start = Instant::now();
        let doc = normalize::preprocess_document(doc, &config.clean);
        debug!("Normalised in {}ms", clean_start.elapsed().as_millis());
        doc
    } else {
        doc
    };

    // ── Step 3: Summarise ────────────────────────────────────────────────
    let doc = match config.summary {
        Some(length) => summarize_document(doc, length, config).await?,
        None => doc,
    };

    info!(
        "Processing complete: {} pages, {}ms total",
        doc.statistics.total_pages,
        total_start.elapsed().as_millis()
    );
    Ok(doc)
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(path, config))
}

/// Summarise arbitrary text with the configured completer.
pub async fn summarize_text(
    text: &str,
    length: SummaryLength,
    config: &ProcessingConfig,
) -> Result<String, Pdf2TextError> {
    let completer = resolve_completer(config)?;
    Summarizer::new(completer, config).summarize(text, length).await
}

/// Replace `doc.all_text` with its summary, keeping pages, tables,
/// metadata and statistics unchanged.
pub async fn summarize_document(
    doc: DocumentRecord,
    length: SummaryLength,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    let completer = resolve_completer(config)?;
    Summarizer::new(completer, config)
        .summarize_document(doc, length)
        .await
}

/// Rewrite text with the configured completer. A failed call returns the
/// original text; only completer resolution can fail.
pub async fn optimize_text(
    text: &str,
    kind: OptimizationKind,
    config: &ProcessingConfig,
) -> Result<String, Pdf2TextError> {
    let completer = resolve_completer(config)?;
    Ok(Summarizer::new(completer, config).optimize_text(text, kind).await)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_extraction(
    extractor: Extractor,
    config: &ProcessingConfig,
) -> Result<DocumentRecord, Pdf2TextError> {
    let progress = config.progress_callback.clone();
    let start = Instant::now();
    let doc = tokio::task::spawn_blocking(move || extractor.parse(progress.as_deref()))
        .await
        .map_err(|e| Pdf2TextError::Internal(format!("Extraction task panicked: {e}")))??;
    info!(
        "Extracted {} pages in {}ms ({} degraded)",
        doc.statistics.total_pages,
        start.elapsed().as_millis(),
        doc.page_errors.len()
    );
    Ok(doc)
}

fn create_named_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn Completer>, Pdf2TextError> {
    let provider: Arc<dyn LLMProvider> = ProviderFactory::create_llm_provider(provider_name, model)
        .map_err(|e| Pdf2TextError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        })?;
    Ok(Arc::new(ProviderCompleter::new(provider, provider_name, model)))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the completer, from most-specific to least-specific.
///
/// 1. **Pre-built completer** (`config.completer`): used as-is. Tests and
///    callers with their own middleware go here.
///
/// 2. **Named provider** (`config.provider_name`): built through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    API key from the environment.
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`):
///    both set means the execution environment chose a provider and model.
///
/// 4. **DeepSeek-compatible HTTP endpoint**: when `config.api_key` or
///    `DEEPSEEK_API_KEY` is set. `DEEPSEEK_BASE_URL` and `PDF2TEXT_MODEL`
///    override the endpoint and model.
///
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_completer(config: &ProcessingConfig) -> Result<Arc<dyn Completer>, Pdf2TextError> {
    // 1) Caller-provided completer takes priority
    if let Some(ref completer) = config.completer {
        return Ok(Arc::clone(completer));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(PROVIDER_FALLBACK_MODEL);
        return create_named_provider(name, model);
    }

    // 3) EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_named_provider(&prov, &model);
    }

    // 4) DeepSeek over HTTP when a key is known
    if let Some(api_key) = config.api_key.clone().or_else(|| non_empty_env("DEEPSEEK_API_KEY")) {
        let base_url = config
            .base_url
            .clone()
            .or_else(|| non_empty_env("DEEPSEEK_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = config
            .model
            .clone()
            .or_else(|| non_empty_env("PDF2TEXT_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        debug!("Using HTTP completer at {} with model {}", base_url, model);
        let completer = HttpCompleter::new(
            base_url,
            api_key,
            model,
            Duration::from_secs(config.api_timeout_secs),
        )?;
        return Ok(Arc::new(completer));
    }

    // 5) Auto-detect
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2TextError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No completion provider could be auto-detected from environment.\n\
                Set DEEPSEEK_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or name a provider.\n\
                Error: {}",
                e
            ),
        })?;
    let model = config.model.clone().unwrap_or_else(|| "auto".to_string());
    Ok(Arc::new(ProviderCompleter::new(llm_provider, "auto", model)))
}
