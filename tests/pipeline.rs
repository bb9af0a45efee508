//! Integration tests for the extraction → normalisation → summarisation
//! pipeline, driven through the public API.
//!
//! No pdfium and no network: pages come from an in-memory [`PageSource`] and
//! completions from scripted [`Completer`]s.

use async_trait::async_trait;
use edgequake_pdf2text::pipeline::extract::{parse_pages, parse_range};
use edgequake_pdf2text::pipeline::llm::{complete_with_retry, RetryPolicy};
use edgequake_pdf2text::pipeline::normalize::{clean, preprocess_document, preprocess_partial};
use edgequake_pdf2text::pipeline::summarize::split_into_chunks;
use edgequake_pdf2text::pipeline::words::WordToken;
use edgequake_pdf2text::{
    ChunkOutcome, CleanOptions, Completer, CompletionError, CompletionRequest, DocumentMetadata,
    PageError, PageSource, Pdf2TextError, ProcessingConfig, ProgressCallback, RawPage,
    Statistics, SummaryLength, Summarizer,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct MemorySource(Vec<Result<RawPage, PageError>>);

impl PageSource for MemorySource {
    fn page_count(&self) -> usize {
        self.0.len()
    }

    fn read_page(&self, index: usize) -> Result<RawPage, PageError> {
        self.0[index].clone()
    }
}

fn token(text: &str, left: f32, top: f32) -> WordToken {
    WordToken::new(text, left, top, left + 30.0, top + 9.0)
}

fn page(text: &str, words: Vec<WordToken>) -> RawPage {
    RawPage {
        text: text.to_string(),
        words,
        tables: Vec::new(),
        width: 595.0,
        height: 842.0,
    }
}

/// Answers `ok-X` for text starting with `X`; fails for letters in `fail`.
struct ByFirstLetter {
    fail: Vec<char>,
    calls: AtomicU32,
}

impl ByFirstLetter {
    fn failing(fail: &[char]) -> Arc<Self> {
        Arc::new(Self {
            fail: fail.to_vec(),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Completer for ByFirstLetter {
    fn name(&self) -> &str {
        "by-first-letter"
    }

    fn default_model(&self) -> &str {
        "letter-1"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = request.user_text().chars().next().unwrap_or('?');
        if self.fail.contains(&first) {
            Err(CompletionError::Http {
                status: 500,
                body: "upstream exploded".into(),
            })
        } else {
            Ok(format!("ok-{first}"))
        }
    }
}

fn fast_config(completer: Arc<dyn Completer>, chunk_size: usize) -> ProcessingConfig {
    ProcessingConfig::builder()
        .completer(completer)
        .chunk_size(chunk_size)
        .max_attempts(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[test]
fn test_two_page_document_with_failing_second_page() {
    let source = MemorySource(vec![
        Ok(page(
            "Alpha beta gamma",
            vec![
                token("Alpha", 10.0, 100.0),
                token("beta", 50.0, 100.0),
                token("gamma", 90.0, 100.0),
            ],
        )),
        Err(PageError::TextFailed {
            page: 2,
            detail: "content stream truncated".into(),
        }),
    ]);

    let doc = parse_pages(&source, DocumentMetadata::default(), None);

    assert_eq!(doc.statistics.total_pages, 2);
    assert_eq!(doc.pages[0].paragraphs, vec!["Alpha beta gamma"]);
    assert_eq!(doc.pages[1].page_number, 2);
    assert!(doc.pages[1].text.is_empty());
    assert!(doc.pages[1].paragraphs.is_empty());
    assert_eq!(doc.pages[1].word_count, 0);
    assert_eq!(doc.page_errors.len(), 1);
    assert_eq!(doc.page_errors[0].page(), 2);
}

#[test]
fn test_statistics_equal_per_page_sums() {
    let mut with_table = page(
        "Name Qty",
        vec![token("Name", 10.0, 50.0), token("Qty", 200.0, 50.0), token("Widget", 10.0, 80.0)],
    );
    with_table.tables = vec![vec![
        vec![Some("Name".into()), Some("Qty".into())],
        vec![Some("Widget".into()), None],
    ]];
    let source = MemorySource(vec![
        Ok(page("one", vec![token("one", 10.0, 10.0)])),
        Ok(with_table),
        Ok(page("", Vec::new())),
    ]);

    let doc = parse_pages(&source, DocumentMetadata::default(), None);
    let by_hand = Statistics {
        total_pages: 3,
        total_words: doc.pages.iter().map(|p| p.word_count).sum(),
        total_tables: doc.pages.iter().map(|p| p.tables.len()).sum(),
        total_paragraphs: doc.pages.iter().map(|p| p.paragraphs.len()).sum(),
    };
    assert_eq!(doc.statistics, by_hand);
    assert_eq!(doc.statistics.total_tables, 1);
    assert_eq!(doc.all_tables.len(), 1);
    assert_eq!(doc.all_tables[0].data[1], vec!["Widget".to_string(), String::new()]);
    assert!(doc.is_consistent());
}

#[test]
fn test_progress_events_follow_page_order() {
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);
    impl ProgressCallback for Log {
        fn on_extraction_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_page_complete(&self, page: usize, total: usize) {
            self.0.lock().unwrap().push(format!("page {page}/{total}"));
        }
        fn on_page_error(&self, page: usize, _total: usize, _error: &str) {
            self.0.lock().unwrap().push(format!("error {page}"));
        }
        fn on_extraction_complete(&self, stats: &Statistics) {
            self.0.lock().unwrap().push(format!("done {}", stats.total_pages));
        }
    }

    let source = MemorySource(vec![
        Ok(page("a", Vec::new())),
        Err(PageError::LoadFailed {
            page: 2,
            detail: "bad object".into(),
        }),
    ]);
    let log = Log::default();
    parse_pages(&source, DocumentMetadata::default(), Some(&log));

    assert_eq!(
        *log.0.lock().unwrap(),
        vec!["start 2", "page 1/2", "error 2", "page 2/2", "done 2"]
    );
}

#[test]
fn test_page_range_never_fails_on_large_end() {
    let source = MemorySource(vec![Ok(page("p1", Vec::new())), Ok(page("p2", Vec::new()))]);
    let partial = parse_range(&source, 1, 1_000).unwrap();
    assert_eq!(partial.pages.len(), 2);

    assert!(parse_range(&source, 3, 4).unwrap().pages.is_empty());
    assert!(matches!(
        parse_range(&source, 0, 4),
        Err(Pdf2TextError::PageOutOfRange { page: 0, total: 2 })
    ));
}

// ── Normalisation ────────────────────────────────────────────────────────────

#[test]
fn test_normalised_range_has_no_raw_copy() {
    let source = MemorySource(vec![
        Ok(page("cover", Vec::new())),
        Ok(page("Intro-\nduction   ★ text\r\n", vec![token("Intro-", 10.0, 10.0)])),
    ]);
    let partial = parse_range(&source, 2, 2).unwrap();
    let cleaned = preprocess_partial(partial, &CleanOptions::default());

    assert_eq!(cleaned.text, "Introduction text");
    assert_eq!(cleaned.pages[0].text, cleaned.text);
    assert_eq!(cleaned.pages[0].paragraphs, vec!["Intro-"]);
    assert_eq!(preprocess_partial(cleaned.clone(), &CleanOptions::default()), cleaned);
}

#[test]
fn test_normalised_document_is_a_fixed_point() {
    let source = MemorySource(vec![
        Ok(page(
            "Intro-\nduction\r\n\n\n\nThe   quick\u{000C} fox ☺ jumps.\n\n12\n",
            vec![token("Intro-", 10.0, 10.0)],
        )),
        Ok(page("caf\u{0065}\u{0301} au lait\t\ttable", Vec::new())),
    ]);
    let doc = parse_pages(&source, DocumentMetadata::default(), None);
    let options = CleanOptions {
        remove_headers_footers: true,
        ..CleanOptions::default()
    };

    let once = preprocess_document(doc, &options);
    let twice = preprocess_document(once.clone(), &options);
    assert_eq!(once, twice);
    assert!(once.pages[0].text.contains("Introduction"));
    assert!(once.pages[1].text.contains("café"));
    assert_eq!(once.statistics, twice.statistics);
}

#[test]
fn test_blank_text_survives_every_step_unchanged_or_empty() {
    let all = CleanOptions {
        remove_headers_footers: true,
        ..CleanOptions::default()
    };
    for input in ["", "   ", "\n\n\t"] {
        let out = clean(input, &all);
        assert!(out.trim().is_empty(), "{input:?} -> {out:?}");
    }
}

// ── Summarisation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_chunk_contributes_its_truncated_source() {
    let paragraphs: Vec<String> = ['A', 'B', 'C'].iter().map(|c| c.to_string().repeat(550)).collect();
    let text = paragraphs.join("\n\n");

    let chunks = split_into_chunks(&text, 600);
    assert_eq!(chunks.len(), 3);

    let completer = ByFirstLetter::failing(&['B']);
    let config = fast_config(completer.clone(), 600);
    let summarizer = Summarizer::new(completer.clone(), &config);

    let done = summarizer.summarize_chunks(chunks, SummaryLength::Medium).await;
    let expected_fallback = format!("{}...", &paragraphs[1][..500]);
    assert_eq!(done[1].result, Some(ChunkOutcome::Fallback(expected_fallback.clone())));
    assert!(done[1].result.as_ref().is_some_and(ChunkOutcome::is_fallback));

    let summary = summarizer.summarize(&text, SummaryLength::Medium).await.unwrap();
    assert_eq!(summary, format!("ok-A\n\n{expected_fallback}\n\nok-C"));
}

#[tokio::test]
async fn test_document_summary_keeps_structure() {
    let source = MemorySource(vec![
        Ok(page("First page.", vec![token("First", 10.0, 10.0), token("page.", 50.0, 10.0)])),
        Ok(page("Second page.", vec![token("Second", 10.0, 10.0)])),
    ]);
    let doc = preprocess_document(
        parse_pages(&source, DocumentMetadata::default(), None),
        &CleanOptions::default(),
    );

    let completer = ByFirstLetter::failing(&[]);
    let config = fast_config(completer.clone(), 5000);
    let summarised = Summarizer::new(completer, &config)
        .summarize_document(doc.clone(), SummaryLength::Short)
        .await
        .unwrap();

    assert_eq!(summarised.all_text, "ok-F");
    assert_eq!(summarised.pages, doc.pages);
    assert_eq!(summarised.all_tables, doc.all_tables);
    assert_eq!(summarised.statistics, doc.statistics);
    assert_eq!(summarised.metadata, doc.metadata);
}

#[tokio::test]
async fn test_direct_summary_exhausts_retries() {
    let completer = ByFirstLetter::failing(&['X']);
    let config = fast_config(completer.clone(), 5000);
    let err = Summarizer::new(completer.clone(), &config)
        .summarize("X marks the spot", SummaryLength::Short)
        .await
        .unwrap_err();

    assert!(matches!(err, Pdf2TextError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(completer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_is_attempted_exactly_once() {
    struct Limited(AtomicU32);

    #[async_trait]
    impl Completer for Limited {
        fn name(&self) -> &str {
            "limited"
        }
        fn default_model(&self) -> &str {
            "m"
        }
        async fn complete(&self, _r: &CompletionRequest) -> Result<String, CompletionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CompletionError::RateLimited {
                retry_after_secs: Some(30),
                detail: "slow down".into(),
            })
        }
    }

    let completer = Limited(AtomicU32::new(0));
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        timeout: Duration::from_secs(1),
    };
    let request = CompletionRequest::new("m", "system", "hello", 0.3, 100);
    let err = complete_with_retry(&completer, &request, &policy).await.unwrap_err();

    assert!(matches!(err, Pdf2TextError::RateLimitExceeded { .. }));
    assert_eq!(completer.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_blank_document_text_is_never_sent() {
    let completer = ByFirstLetter::failing(&[]);
    let config = fast_config(completer.clone(), 10);
    let out = Summarizer::new(completer.clone(), &config)
        .summarize("  \n\n  ", SummaryLength::Long)
        .await
        .unwrap();

    assert_eq!(out, "  \n\n  ");
    assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
}
