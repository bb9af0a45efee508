//! CLI binary for edgequake-pdf2text.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProcessingConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2text::pipeline::normalize;
use edgequake_pdf2text::{
    extract_page_range, inspect, optimize_text, process, summarize_text, CleanOptions,
    DocumentRecord, OptimizationKind, ProcessingConfig, ProgressCallback, SharedProgress,
    Statistics, SummaryLength,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
         ⏱ {{elapsed_precise}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar reused for both phases: pages during extraction, chunks during
/// summarisation.
struct CliProgress {
    bar: ProgressBar,
    page_errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            page_errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_style(bar_style("pages"));
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg)
        ));
    }

    fn on_extraction_complete(&self, statistics: &Statistics) {
        let failed = self.page_errors.load(Ordering::SeqCst);
        self.bar.println(format!(
            "{} {} pages extracted{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&statistics.total_pages.to_string()),
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} empty after errors)", red(&failed.to_string()))
            }
        ));
    }

    fn on_summary_start(&self, total_chunks: usize) {
        self.bar.set_length(total_chunks as u64);
        self.bar.set_position(0);
        self.bar.set_style(bar_style("chunks"));
        self.bar.set_prefix("Summarising");
        self.bar.reset_eta();
    }

    fn on_chunk_complete(&self, completed: usize, _total_chunks: usize) {
        self.bar.set_position(completed as u64);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and clean text (stdout)
  pdf2text report.pdf

  # Pages 3 to 7 only
  pdf2text --pages 3-7 report.pdf

  # Full record as JSON (pages, paragraphs, tables, statistics)
  pdf2text --json report.pdf -o report.json

  # Medium-length summary via DeepSeek
  DEEPSEEK_API_KEY=sk-... pdf2text --summarize medium report.pdf

  # Summary via any edgequake-llm provider
  pdf2text --summarize short --provider openai --model gpt-4.1-mini report.pdf

  # Inspect metadata (no API key needed)
  pdf2text --inspect-only report.pdf

ENVIRONMENT VARIABLES:
  DEEPSEEK_API_KEY        Key for the default DeepSeek-compatible endpoint
  DEEPSEEK_BASE_URL       Override the endpoint base URL
  PDF2TEXT_MODEL          Model for the HTTP endpoint (default: deepseek-chat)
  EDGEQUAKE_LLM_PROVIDER  Provider for edgequake-llm (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Model for that provider
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY
                          Picked up by provider auto-detection
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  RUST_LOG                Log filter (overrides -v / -q)

  PDFium (~30 MB) is downloaded automatically on first run and cached.
"#;

/// Extract, clean and summarise text from PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2text",
    version,
    about = "Extract, clean and summarise text from PDF documents",
    long_about = "Extract text, paragraphs and tables from a PDF's text layer, clean the result \
with a deterministic normaliser and optionally summarise it with an LLM (DeepSeek by default, or \
any provider supported by edgequake-llm).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file.
    input: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "PDF2TEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TEXT_PASSWORD")]
    password: Option<String>,

    /// Page range: 5 or 3-7 (1-indexed, inclusive; end is clipped).
    #[arg(long, env = "PDF2TEXT_PAGES")]
    pages: Option<String>,

    /// Skip normalisation entirely.
    #[arg(long, env = "PDF2TEXT_NO_CLEAN")]
    no_clean: bool,

    /// Keep special characters (skip the symbol filter).
    #[arg(long, env = "PDF2TEXT_SPECIAL_CHARS")]
    special_chars: bool,

    /// Drop page-number lines and short lines at the start/end of the text.
    #[arg(long, env = "PDF2TEXT_STRIP_HEADERS")]
    strip_headers: bool,

    /// Summarise the extracted text.
    #[arg(long, env = "PDF2TEXT_SUMMARIZE", value_enum)]
    summarize: Option<LengthArg>,

    /// Rewrite the final text with the LLM.
    #[arg(long, env = "PDF2TEXT_OPTIMIZE", value_enum)]
    optimize: Option<OptimizeArg>,

    /// Extra instructions appended to every LLM system prompt.
    #[arg(long, env = "PDF2TEXT_INSTRUCTIONS")]
    instructions: Option<String>,

    /// Texts longer than this many characters are summarised in chunks.
    #[arg(long, env = "PDF2TEXT_CHUNK_SIZE", default_value_t = 5000)]
    chunk_size: usize,

    /// Maximum concurrent chunk calls.
    #[arg(short, long, env = "PDF2TEXT_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDF2TEXT_PROVIDER")]
    provider: Option<String>,

    /// Model ID (default: deepseek-chat for the HTTP endpoint).
    #[arg(long, env = "PDF2TEXT_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TEXT_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Attempts per LLM call, including the first.
    #[arg(long, env = "PDF2TEXT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2TEXT_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Largest accepted input in megabytes.
    #[arg(long, env = "PDF2TEXT_MAX_FILE_SIZE_MB", default_value_t = 50)]
    max_file_size: u64,

    /// Output the structured record as JSON instead of plain text.
    #[arg(long, env = "PDF2TEXT_JSON")]
    json: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LengthArg {
    Short,
    Medium,
    Long,
}

impl From<LengthArg> for SummaryLength {
    fn from(v: LengthArg) -> Self {
        match v {
            LengthArg::Short => SummaryLength::Short,
            LengthArg::Medium => SummaryLength::Medium,
            LengthArg::Long => SummaryLength::Long,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OptimizeArg {
    General,
    Grammar,
    Semantic,
    Terminology,
}

impl From<OptimizeArg> for OptimizationKind {
    fn from(v: OptimizeArg) -> Self {
        match v {
            OptimizeArg::General => OptimizationKind::General,
            OptimizeArg::Grammar => OptimizationKind::Grammar,
            OptimizeArg::Semantic => OptimizationKind::Semantic,
            OptimizeArg::Terminology => OptimizationKind::Terminology,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers INFO-level feedback, so library logs drop to
    // warnings while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    ensure_pdfium(cli.quiet)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref d) = meta.creation_date {
                println!("Created:      {}", d);
            }
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgress::new);
    let config = build_config(&cli, progress.clone().map(|p| p as SharedProgress))?;
    let start = Instant::now();

    // ── Run ──────────────────────────────────────────────────────────────
    let result = match cli.pages.as_deref() {
        Some(pages) => {
            let (first, last) = parse_pages(pages)?;
            run_range(&cli, &config, first, last).await
        }
        None => run_document(&cli, &config).await,
    };
    if let Some(ref p) = progress {
        p.finish();
    }
    let (body, stats) = result?;

    // ── Write ────────────────────────────────────────────────────────────
    match cli.output {
        Some(ref path) => write_atomic(path, &body).await?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}  {} pages  {} words  {} paragraphs  {} tables  {}",
            green("✔"),
            stats.total_pages,
            stats.total_words,
            stats.total_paragraphs,
            stats.total_tables,
            dim(&format!("{}ms", start.elapsed().as_millis())),
        );
        if let Some(ref path) = cli.output {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Whole-document run: returns the rendered body and the statistics.
async fn run_document(cli: &Cli, config: &ProcessingConfig) -> Result<(String, Statistics)> {
    let doc = process(&cli.input, config)
        .await
        .context("Processing failed")?;
    let doc = match cli.optimize {
        Some(kind) => {
            let text = optimize_text(&doc.all_text, kind.into(), config)
                .await
                .context("Optimisation failed")?;
            doc.with_text(text)
        }
        None => doc,
    };
    let stats = doc.statistics;
    Ok((render(cli, &doc)?, stats))
}

/// Page-range run: the partial text gets the same cleaning and LLM passes
/// as a whole document.
async fn run_range(
    cli: &Cli,
    config: &ProcessingConfig,
    first: usize,
    last: usize,
) -> Result<(String, Statistics)> {
    let mut partial = extract_page_range(&cli.input, first, last, config)
        .await
        .with_context(|| format!("Failed to extract pages {first}-{last}"))?;

    if config.normalize {
        partial = normalize::preprocess_partial(partial, &config.clean);
    }
    if let Some(length) = config.summary {
        partial.text = summarize_text(&partial.text, length, config)
            .await
            .context("Summarisation failed")?;
    }
    if let Some(kind) = cli.optimize {
        partial.text = optimize_text(&partial.text, kind.into(), config)
            .await
            .context("Optimisation failed")?;
    }

    let stats = Statistics::from_pages(&partial.pages);
    let body = if cli.json {
        serde_json::to_string_pretty(&partial).context("Failed to serialise output")?
    } else {
        partial.text.clone()
    };
    Ok((body, stats))
}

fn render(cli: &Cli, doc: &DocumentRecord) -> Result<String> {
    if cli.json {
        serde_json::to_string_pretty(doc).context("Failed to serialise output")
    } else {
        Ok(doc.all_text.clone())
    }
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli, progress: Option<SharedProgress>) -> Result<ProcessingConfig> {
    let clean = CleanOptions {
        remove_special_chars: !cli.special_chars,
        remove_headers_footers: cli.strip_headers,
        ..CleanOptions::default()
    };

    let mut builder = ProcessingConfig::builder()
        .max_file_size_mb(cli.max_file_size)
        .normalize(!cli.no_clean)
        .clean(clean)
        .chunk_size(cli.chunk_size)
        .concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.api_timeout)
        .temperature(cli.temperature);

    if let Some(length) = cli.summarize {
        builder = builder.summary(length.into());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref text) = cli.instructions {
        builder = builder.custom_instructions(text.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into a 1-indexed inclusive range.
fn parse_pages(s: &str) -> Result<(usize, usize)> {
    let s = s.trim();
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (
            start.trim().parse::<usize>().context("Invalid start page in range")?,
            end.trim().parse::<usize>().context("Invalid end page in range")?,
        ),
        None => {
            let page = s.parse::<usize>().context("Invalid page number")?;
            (page, page)
        }
    };

    if start < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
    }
    if start > end {
        anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
    }
    Ok((start, end))
}

/// Download pdfium on first run; later runs only check the cache.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Write to a temp sibling, then rename, so a failed run never leaves a
/// partial file behind.
async fn write_atomic(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, body)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
