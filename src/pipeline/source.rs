//! Page sources: where the extractor gets positioned text from.
//!
//! [`PageSource`] is the seam between the extractor and pdfium. The pdfium
//! implementation lives inside [`with_pdfium_source`] because a
//! `PdfDocument` borrows the `Pdfium` binding it was loaded with; tests use
//! an in-memory source instead.
//!
//! All pdfium calls are blocking. Callers on an async runtime wrap them in
//! `tokio::task::spawn_blocking`.

use super::tables::{detect_tables, CellGrid, TableDetectorConfig};
use super::words::{group_words, Glyph, Tolerance, WordToken};
use crate::error::{PageError, Pdf2TextError};
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Everything the extractor needs from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    /// Full text in the text layer's own order.
    pub text: String,
    /// Word tokens in reading order.
    pub words: Vec<WordToken>,
    /// Detected tables, top to bottom.
    pub tables: Vec<CellGrid>,
    pub width: f32,
    pub height: f32,
}

/// A document that yields pages by 0-based index.
pub trait PageSource {
    /// Total page count, known before the first page is read.
    fn page_count(&self) -> usize;

    /// Read one page. Errors are per page and never poison the source.
    fn read_page(&self, index: usize) -> Result<RawPage, PageError>;
}

/// [`PageSource`] over an open pdfium document.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    tolerance: Tolerance,
    tables: TableDetectorConfig,
    encrypted: bool,
}

impl<'a> PdfiumSource<'a> {
    /// Document properties from the info dictionary.
    pub fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata
                .get(tag)
                .map(|t| t.value().trim().to_string())
                .filter(|v| !v.is_empty())
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            page_count: self.page_count(),
            is_encrypted: self.encrypted,
        }
    }

    #[allow(deprecated)]
    fn glyphs(page: &PdfPage<'_>, text: &PdfPageText<'_>) -> Vec<Glyph> {
        let height = page.height().value;
        text.chars()
            .iter()
            .filter_map(|c| {
                let ch = c.unicode_char()?;
                let bounds = c.loose_bounds().ok()?;
                // pdfium measures from the bottom edge; flip to top-down.
                Some(Glyph {
                    ch,
                    left: bounds.left.value,
                    top: height - bounds.top.value,
                    right: bounds.right.value,
                    bottom: height - bounds.bottom.value,
                })
            })
            .collect()
    }
}

impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn read_page(&self, index: usize) -> Result<RawPage, PageError> {
        let page_number = index + 1;
        let pages = self.document.pages();
        let page = pages.get(index as u16).map_err(|e| PageError::LoadFailed {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

        let text = page.text().map_err(|e| PageError::TextFailed {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

        let glyphs = Self::glyphs(&page, &text);
        let words = group_words(&glyphs, self.tolerance);
        let tables = detect_tables(&words, &self.tables);
        debug!(
            "Page {}: {} glyphs, {} words, {} tables",
            page_number,
            glyphs.len(),
            words.len(),
            tables.len()
        );

        Ok(RawPage {
            text: text.all(),
            words,
            tables,
            width: page.width().value,
            height: page.height().value,
        })
    }
}

/// Open `path` with pdfium and run `f` against it.
///
/// # Errors
/// * [`Pdf2TextError::PdfiumBindingFailed`] when no pdfium library can be bound
/// * [`Pdf2TextError::PasswordRequired`] / [`Pdf2TextError::WrongPassword`]
///   for encrypted files
/// * [`Pdf2TextError::CorruptPdf`] for anything else pdfium rejects
pub fn with_pdfium_source<T>(
    path: &Path,
    password: Option<&str>,
    f: impl FnOnce(&PdfiumSource<'_>) -> T,
) -> Result<T, Pdf2TextError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| Pdf2TextError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| classify_load_error(path, password, format!("{:?}", e)))?;

    let source = PdfiumSource {
        encrypted: reports_encryption(document.permissions().security_handler_revision()),
        document,
        tolerance: Tolerance::default(),
        tables: TableDetectorConfig::default(),
    };
    info!("PDF loaded: {} pages", source.page_count());

    Ok(f(&source))
}

fn classify_load_error(path: &Path, password: Option<&str>, detail: String) -> Pdf2TextError {
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            Pdf2TextError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            Pdf2TextError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        Pdf2TextError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

/// `true` when the document is protected by a security handler.
///
/// Opens the file without a password: a password error means it is
/// encrypted, otherwise the security handler revision decides. Binding or
/// load failures answer `false`.
pub fn is_encrypted(path: &Path) -> bool {
    let pdfium = match pdfium_auto::bind_pdfium_silent() {
        Ok(pdfium) => pdfium,
        Err(e) => {
            debug!("Encryption check could not bind pdfium: {}", e);
            return false;
        }
    };
    let revision = pdfium
        .load_pdf_from_file(path, None)
        .and_then(|document| document.permissions().security_handler_revision());
    reports_encryption(revision)
}

fn reports_encryption(revision: Result<PdfSecurityHandlerRevision, PdfiumError>) -> bool {
    match revision {
        Ok(revision) => !matches!(revision, PdfSecurityHandlerRevision::Unprotected),
        Err(PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError)) => true,
        Err(e) => {
            debug!("Encryption check failed open: {:?}", e);
            false
        }
    }
}
