//! Configuration types for PDF extraction, normalisation and summarisation.
//!
//! All behaviour is controlled through [`ProcessingConfig`], built via its
//! [`ProcessingConfigBuilder`]. The defaults mirror the values the pipeline
//! was tuned with: 5 000-character summary chunks, three concurrent chunk
//! calls, three attempts per call with a 2 s linear back-off and a 30 s
//! per-call timeout.

use crate::error::Pdf2TextError;
use crate::pipeline::llm::Completer;
use crate::progress::SharedProgress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default DeepSeek-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Default model for the HTTP completer.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Configuration for one processing run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2text::{ProcessingConfig, SummaryLength};
///
/// let config = ProcessingConfig::builder()
///     .summary(SummaryLength::Short)
///     .concurrency(4)
///     .chunk_size(8_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Largest accepted input file in megabytes. Default: 50.
    pub max_file_size_mb: u64,

    /// Run the normaliser over the extracted record. Default: true.
    pub normalize: bool,

    /// Which normalisation steps run.
    pub clean: CleanOptions,

    /// Summarise the full text at this length. Default: None (no summary).
    pub summary: Option<SummaryLength>,

    /// Texts longer than this many characters are summarised chunk by chunk.
    /// Default: 5000.
    pub chunk_size: usize,

    /// Maximum concurrent chunk calls. Default: 3.
    pub concurrency: usize,

    /// Attempts per completion call, including the first. Default: 3.
    pub max_attempts: u32,

    /// Base retry delay in milliseconds. Default: 2000.
    ///
    /// Timeouts wait `base × attempt`; unclassified failures wait twice that.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Model identifier. If None, the completer's default is used.
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed completer. Takes precedence over everything else.
    pub completer: Option<Arc<dyn Completer>>,

    /// API key for the HTTP completer. Falls back to `DEEPSEEK_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL for the HTTP completer. Falls back to `DEEPSEEK_BASE_URL`.
    pub base_url: Option<String>,

    /// Extra instructions appended to every system prompt.
    pub custom_instructions: Option<String>,

    /// Optional progress callback.
    pub progress_callback: Option<SharedProgress>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            password: None,
            max_file_size_mb: 50,
            normalize: true,
            clean: CleanOptions::default(),
            summary: None,
            chunk_size: 5000,
            concurrency: 3,
            max_attempts: 3,
            retry_backoff_ms: 2000,
            api_timeout_secs: 30,
            temperature: 0.3,
            model: None,
            provider_name: None,
            completer: None,
            api_key: None,
            base_url: None,
            custom_instructions: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("normalize", &self.normalize)
            .field("clean", &self.clean)
            .field("summary", &self.summary)
            .field("chunk_size", &self.chunk_size)
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("temperature", &self.temperature)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("completer", &self.completer.as_ref().map(|c| c.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn normalize(mut self, v: bool) -> Self {
        self.config.normalize = v;
        self
    }

    pub fn clean(mut self, options: CleanOptions) -> Self {
        self.config.clean = options;
        self
    }

    pub fn summary(mut self, length: SummaryLength) -> Self {
        self.config.summary = Some(length);
        self
    }

    pub fn chunk_size(mut self, chars: usize) -> Self {
        self.config.chunk_size = chars;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.config.completer = Some(completer);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn custom_instructions(mut self, text: impl Into<String>) -> Self {
        self.config.custom_instructions = Some(text.into());
        self
    }

    pub fn progress_callback(mut self, cb: SharedProgress) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, Pdf2TextError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "Chunk size must be ≥ 1 character".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "Max attempts must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_file_size_mb == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "Max file size must be ≥ 1 MB".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Normalisation options ────────────────────────────────────────────────

/// Independently togglable normalisation steps.
///
/// Enabled steps always run in field order; see
/// [`crate::pipeline::normalize::clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Strip form-feed, carriage-return and NUL characters.
    pub remove_artifacts: bool,
    /// NFC-normalise and drop characters that cannot round-trip.
    pub normalize_encoding: bool,
    /// Rejoin words split by a hyphen at a line break.
    pub fix_broken_words: bool,
    /// Remove characters outside the word/CJK/punctuation whitelist.
    pub remove_special_chars: bool,
    /// Collapse horizontal whitespace and blank-line runs, trim lines.
    pub normalize_whitespace: bool,
    /// Drop page-number lines and short lines at the ends of the text.
    pub remove_headers_footers: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_artifacts: true,
            normalize_encoding: true,
            fix_broken_words: true,
            remove_special_chars: true,
            normalize_whitespace: true,
            remove_headers_footers: false,
        }
    }
}

impl CleanOptions {
    /// These options as applied to table cells: never special-character
    /// filtering or header/footer removal.
    pub fn for_table_cells(&self) -> Self {
        Self {
            remove_special_chars: false,
            remove_headers_footers: false,
            ..*self
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target length of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    /// 100–200 words.
    Short,
    /// 300–500 words. (default)
    #[default]
    Medium,
    /// 500–800 words.
    Long,
}

impl SummaryLength {
    /// Output-token budget for a summary of this length.
    pub fn max_tokens(self) -> usize {
        match self {
            SummaryLength::Short => 1000,
            SummaryLength::Medium => 2000,
            SummaryLength::Long => 3000,
        }
    }
}

impl std::str::FromStr for SummaryLength {
    type Err = Pdf2TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(SummaryLength::Short),
            "medium" => Ok(SummaryLength::Medium),
            "long" => Ok(SummaryLength::Long),
            other => Err(Pdf2TextError::InvalidConfig(format!(
                "Unknown summary length '{other}' (expected short, medium or long)"
            ))),
        }
    }
}

/// Kind of text optimisation requested from the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationKind {
    /// Grammar, readability and flow. (default)
    #[default]
    General,
    /// Grammar, spelling and punctuation only.
    Grammar,
    /// Clarity, coherence and transitions.
    Semantic,
    /// Consistent technical terminology.
    Terminology,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let c = ProcessingConfig::default();
        assert_eq!(c.chunk_size, 5000);
        assert_eq!(c.concurrency, 3);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff_ms, 2000);
        assert_eq!(c.api_timeout_secs, 30);
        assert_eq!(c.max_file_size_mb, 50);
        assert!(c.normalize);
        assert!(c.summary.is_none());
        assert!(!c.clean.remove_headers_footers);
    }

    #[test]
    fn builder_clamps_concurrency_and_temperature() {
        let c = ProcessingConfig::builder()
            .concurrency(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = ProcessingConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(err, Pdf2TextError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        assert!(ProcessingConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = ProcessingConfig::builder()
            .password("hunter2")
            .api_key("sk-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("sk-secret"));
    }

    #[test]
    fn summary_length_parsing_and_budgets() {
        assert_eq!("SHORT".parse::<SummaryLength>().unwrap(), SummaryLength::Short);
        assert_eq!("long".parse::<SummaryLength>().unwrap(), SummaryLength::Long);
        assert!("tiny".parse::<SummaryLength>().is_err());
        assert!(SummaryLength::Short.max_tokens() < SummaryLength::Medium.max_tokens());
        assert!(SummaryLength::Medium.max_tokens() < SummaryLength::Long.max_tokens());
    }

    #[test]
    fn table_cell_options_skip_special_chars() {
        let o = CleanOptions::default().for_table_cells();
        assert!(!o.remove_special_chars);
        assert!(!o.remove_headers_footers);
        assert!(o.remove_artifacts && o.normalize_encoding && o.fix_broken_words);
        assert!(o.normalize_whitespace);
    }

    #[test]
    fn table_cell_options_follow_disabled_steps() {
        let caller = CleanOptions {
            normalize_encoding: false,
            normalize_whitespace: false,
            remove_headers_footers: true,
            ..CleanOptions::default()
        };
        let o = caller.for_table_cells();
        assert!(!o.normalize_encoding && !o.normalize_whitespace);
        assert!(!o.remove_headers_footers && !o.remove_special_chars);
        assert!(o.remove_artifacts && o.fix_broken_words);
    }
}
