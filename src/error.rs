//! Error types for the edgequake-pdf2text library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Pdf2TextError`]: **Fatal**: the operation cannot proceed at all
//!   (missing file, wrong password, provider not configured, retries
//!   exhausted). Returned as `Err(Pdf2TextError)` from the public entry points.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed to extract. The page
//!   is replaced by an empty record and the error is kept in
//!   [`crate::output::DocumentRecord::page_errors`].
//!
//! * [`CompletionError`]: one failed attempt against the completion endpoint.
//!   The retry layer in [`crate::pipeline::llm`] classifies it as terminal or
//!   retryable; callers only ever see the resulting [`Pdf2TextError`].

use edgequake_llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2text library.
#[derive(Debug, Error)]
pub enum Pdf2TextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file does not carry a `.pdf` extension.
    #[error("File must be a PDF: '{path}' (extension {extension:?})")]
    UnsupportedExtension { path: PathBuf, extension: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file is larger than the configured limit.
    #[error("File '{path}' is {size_mb:.2} MB, above the {limit_mb} MB limit")]
    FileTooLarge {
        path: PathBuf,
        size_mb: f64,
        limit_mb: u64,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Requested page range does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion endpoint rejected the credentials; never retried.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The completion endpoint reported a rate limit or exhausted quota; never retried.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
        detail: String,
    },

    /// Every attempt failed with a retryable error.
    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TextError {
    /// `true` for errors caused by the input document itself rather than by
    /// configuration, the network, or the runtime.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Pdf2TextError::FileNotFound { .. }
                | Pdf2TextError::PermissionDenied { .. }
                | Pdf2TextError::UnsupportedExtension { .. }
                | Pdf2TextError::NotAPdf { .. }
                | Pdf2TextError::FileTooLarge { .. }
                | Pdf2TextError::CorruptPdf { .. }
                | Pdf2TextError::PasswordRequired { .. }
                | Pdf2TextError::WrongPassword { .. }
        )
    }
}

/// A non-fatal error for a single page.
///
/// The page is still present in the document, with empty text, no
/// paragraphs, no tables and a zero word count.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// pdfium could not load the page object.
    #[error("Page {page}: could not be loaded: {detail}")]
    LoadFailed { page: usize, detail: String },

    /// The page loaded but its text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::LoadFailed { page, .. } | PageError::TextFailed { page, .. } => *page,
        }
    }
}

/// Outcome of one failed request to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    /// HTTP 401/403 or an equivalent provider message.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP 429 or an exhausted quota.
    #[error("rate limited: {detail}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        detail: String,
    },

    /// The call did not complete within the per-call timeout.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or provider-side failure without a status code.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered but the body had no usable completion.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Terminal errors are surfaced immediately and never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompletionError::Auth(_) | CompletionError::RateLimited { .. }
        )
    }

    /// Classify a provider error message that carries no structured status.
    ///
    /// Status codes only count as whole tokens: `HTTP 401` is an auth
    /// failure, `4013 tokens` is not.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let has_status = |codes: &[&str]| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| codes.contains(&token))
        };
        if has_status(&["401", "403"])
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
            || lower.contains("authentication")
        {
            CompletionError::Auth(message)
        } else if has_status(&["429"])
            || lower.contains("rate limit")
            || lower.contains("ratelimit")
            || lower.contains("quota")
        {
            CompletionError::RateLimited {
                retry_after_secs: None,
                detail: message,
            }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            CompletionError::Timeout { elapsed_ms: 0 }
        } else {
            CompletionError::Transport(message)
        }
    }

    /// Convert a terminal error into the fatal error surfaced to callers.
    pub(crate) fn into_fatal(self, provider: &str) -> Pdf2TextError {
        match self {
            CompletionError::Auth(detail) => Pdf2TextError::AuthError {
                provider: provider.to_string(),
                detail,
            },
            CompletionError::RateLimited {
                retry_after_secs,
                detail,
            } => Pdf2TextError::RateLimitExceeded {
                provider: provider.to_string(),
                retry_after_secs,
                detail,
            },
            other => Pdf2TextError::RetriesExhausted {
                attempts: 1,
                last_error: other.to_string(),
            },
        }
    }
}

impl From<LlmError> for CompletionError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::AuthError(detail) => CompletionError::Auth(detail),
            LlmError::RateLimited(detail) => CompletionError::RateLimited {
                retry_after_secs: None,
                detail,
            },
            LlmError::Timeout => CompletionError::Timeout { elapsed_ms: 0 },
            LlmError::NetworkError(detail) => CompletionError::Transport(detail),
            LlmError::SerializationError(e) => CompletionError::InvalidResponse(e.to_string()),
            other => CompletionError::from_message(other.to_string()),
        }
    }
}

/// A normalisation step could not run; the caller keeps the pre-step text.
#[derive(Debug, Clone, Error)]
pub enum CleanError {
    /// A cleaning pattern failed to compile.
    #[error("cleaning pattern for '{step}' is invalid: {detail}")]
    Pattern { step: &'static str, detail: String },
}
