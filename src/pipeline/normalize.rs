//! Text normalisation: deterministic cleanup of extracted PDF text.
//!
//! [`clean`] applies up to six steps in a fixed order; each is toggled by a
//! field of [`CleanOptions`]:
//!
//! 1. Strip form-feed, carriage-return and NUL characters
//! 2. NFC-normalise, drop replacement characters and noncharacters
//! 3. Rejoin words hyphenated across a line break
//! 4. Remove characters outside the word/CJK/punctuation whitelist
//! 5. Collapse horizontal whitespace, trim lines, cap blank-line runs at one
//! 6. Drop page-number lines and short lines at the ends of the text
//!
//! Order matters: hyphen repair needs the `\r` gone, and whitespace
//! collapsing must see the gaps left by character filtering.
//!
//! Steps 3 and 4 delete characters, which can leave a base letter next to a
//! combining mark or a hyphen next to a line break. When those steps are on,
//! hyphen repair runs again after filtering and the text is recomposed
//! before whitespace collapsing.
//!
//! Every step returns `Result<String, CleanError>`. A failing step is
//! skipped: the caller keeps the text it had before that step and logs a
//! warning. With the default options `clean(clean(x)) == clean(x)`.

use crate::config::CleanOptions;
use crate::error::CleanError;
use crate::output::{DocumentRecord, Page, PartialDocument, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

type Step = fn(&str) -> Result<String, CleanError>;

/// Clean `text` with the enabled steps.
pub fn clean(text: &str, options: &CleanOptions) -> String {
    if text.is_empty() {
        return String::new();
    }

    let rejoin_after_filter = options.fix_broken_words && options.remove_special_chars;
    let steps: [(bool, &'static str, Step); 8] = [
        (options.remove_artifacts, "artifacts", remove_artifacts),
        (options.normalize_encoding, "encoding", normalize_encoding),
        (options.fix_broken_words, "broken-words", fix_broken_words),
        (options.remove_special_chars, "special-chars", remove_special_chars),
        (rejoin_after_filter, "broken-words", fix_broken_words),
        (options.normalize_encoding, "recompose", recompose),
        (options.normalize_whitespace, "whitespace", normalize_whitespace),
        (options.remove_headers_footers, "headers-footers", remove_headers_footers),
    ];

    let mut out = text.to_string();
    for (enabled, name, step) in steps {
        if enabled {
            out = apply(name, step, out);
        }
    }
    out
}

/// Run one step, keeping the input when it fails.
fn apply(name: &str, step: Step, text: String) -> String {
    match step(&text) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            warn!("Skipping normalisation step '{}': {}", name, e);
            text
        }
    }
}

/// Clean every cell of a table, preserving its shape (ragged rows included).
///
/// Cells get the steps enabled in `options` except special-character
/// filtering and header/footer removal, which never apply to cells.
pub fn clean_table(data: &[Vec<String>], options: &CleanOptions) -> Vec<Vec<String>> {
    let options = options.for_table_cells();
    data.iter()
        .map(|row| row.iter().map(|cell| clean(cell, &options)).collect())
        .collect()
}

fn clean_tables(tables: Vec<Table>, options: &CleanOptions) -> Vec<Table> {
    tables
        .into_iter()
        .map(|t| {
            let data = clean_table(&t.data, options);
            t.map_data(data)
        })
        .collect()
}

fn clean_page(page: Page, options: &CleanOptions) -> Page {
    Page {
        text: clean(&page.text, options),
        paragraphs: page.paragraphs.iter().map(|p| clean(p, options)).collect(),
        tables: clean_tables(page.tables, options),
        ..page
    }
}

/// Rebuild a document with every text field cleaned.
///
/// Covers the full text, every page text and paragraph, and both the per-page
/// and the flattened table collections. Structure and statistics are
/// unchanged.
pub fn preprocess_document(doc: DocumentRecord, options: &CleanOptions) -> DocumentRecord {
    debug!("Normalising document: {} pages", doc.pages.len());
    DocumentRecord {
        all_text: clean(&doc.all_text, options),
        pages: doc.pages.into_iter().map(|p| clean_page(p, options)).collect(),
        all_tables: clean_tables(doc.all_tables, options),
        ..doc
    }
}

/// [`preprocess_document`] for a page range: the combined text, every page
/// and the range's tables are cleaned together.
pub fn preprocess_partial(partial: PartialDocument, options: &CleanOptions) -> PartialDocument {
    debug!("Normalising page range: {} pages", partial.pages.len());
    PartialDocument {
        text: clean(&partial.text, options),
        pages: partial.pages.into_iter().map(|p| clean_page(p, options)).collect(),
        tables: clean_tables(partial.tables, options),
        ..partial
    }
}

fn compiled<'a>(
    step: &'static str,
    re: &'a Lazy<Result<Regex, regex::Error>>,
) -> Result<&'a Regex, CleanError> {
    (**re).as_ref().map_err(|e| CleanError::Pattern {
        step,
        detail: e.to_string(),
    })
}

// ── Step 1: PDF artifacts ────────────────────────────────────────────────────

/// Remove form-feed, carriage-return and NUL characters.
pub fn remove_artifacts(text: &str) -> Result<String, CleanError> {
    Ok(text
        .chars()
        .filter(|c| !matches!(c, '\u{000C}' | '\r' | '\0'))
        .collect())
}

// ── Step 2: Encoding ─────────────────────────────────────────────────────────

/// NFC-normalise and drop characters that carry no text: U+FFFD left behind
/// by failed decoding, and Unicode noncharacters.
pub fn normalize_encoding(text: &str) -> Result<String, CleanError> {
    Ok(text
        .nfc()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER && !is_noncharacter(c))
        .collect())
}

/// NFC-compose without filtering.
pub fn recompose(text: &str) -> Result<String, CleanError> {
    Ok(text.nfc().collect())
}

fn is_noncharacter(c: char) -> bool {
    let cp = c as u32;
    (0xFDD0..=0xFDEF).contains(&cp) || (cp & 0xFFFE) == 0xFFFE
}

// ── Step 3: Broken words ─────────────────────────────────────────────────────

static RE_BROKEN_WORD: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"-\s*\n\s*"));

/// Rejoin `infor-\nmation` into `information`.
pub fn fix_broken_words(text: &str) -> Result<String, CleanError> {
    let re = compiled("broken-words", &RE_BROKEN_WORD)?;
    Ok(re.replace_all(text, "").into_owned())
}

// ── Step 4: Special characters ───────────────────────────────────────────────

static RE_SPECIAL_CHARS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r#"[^\w\s\x{4e00}-\x{9fff}.,!?;:()\[\]{}\-'"/@\#$%\&*+=<>|\\\~`]"#)
});

/// Keep word characters, whitespace, CJK ideographs and common punctuation.
pub fn remove_special_chars(text: &str) -> Result<String, CleanError> {
    let re = compiled("special-chars", &RE_SPECIAL_CHARS)?;
    Ok(re.replace_all(text, "").into_owned())
}

// ── Step 5: Whitespace ───────────────────────────────────────────────────────

static RE_HORIZONTAL_SPACE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[^\S\n]+"));
static RE_BLANK_RUNS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"\n{3,}"));

/// One space between words, trimmed lines, at most one blank line in a row.
pub fn normalize_whitespace(text: &str) -> Result<String, CleanError> {
    let spaces = compiled("whitespace", &RE_HORIZONTAL_SPACE)?;
    let blanks = compiled("whitespace", &RE_BLANK_RUNS)?;

    let collapsed = spaces.replace_all(text, " ");
    let trimmed: Vec<&str> = collapsed.split('\n').map(str::trim).collect();
    let joined = trimmed.join("\n");
    Ok(blanks.replace_all(&joined, "\n\n").trim().to_string())
}

// ── Step 6: Headers and footers ──────────────────────────────────────────────

/// Drop numeric-only lines anywhere, and lines shorter than five characters
/// at the start or end of the text.
///
/// This works on the ends of the whole text, not per page: on a merged
/// document only the first page's header and the last page's footer go.
pub fn remove_headers_footers(text: &str) -> Result<String, CleanError> {
    let blanks = compiled("headers-footers", &RE_BLANK_RUNS)?;
    let is_short = |line: &str| line.trim().chars().count() < 5;
    let is_page_number =
        |line: &str| !line.trim().is_empty() && line.trim().chars().all(|c| c.is_ascii_digit());

    let mut kept: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if is_page_number(line) || (kept.is_empty() && is_short(line)) {
            continue;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|line| is_short(line)) {
        kept.pop();
    }

    Ok(blanks.replace_all(&kept.join("\n"), "\n\n").into_owned())
}
