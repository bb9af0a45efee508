//! Input validation: turn a user-supplied path or byte buffer into a local
//! PDF file pdfium can open.
//!
//! pdfium requires a file-system path, so uploaded bytes are written into a
//! `TempDir` that lives as long as the returned [`ResolvedInput`]. Every input
//! is checked before pdfium sees it: existence, a `.pdf` extension, the
//! configured size limit and the `%PDF` magic bytes, in that order.

use crate::error::Pdf2TextError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A validated PDF on disk.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a byte buffer written to a temp directory.
    /// The `TempDir` is kept alive until processing completes.
    Temporary { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary { path, .. } => path,
        }
    }
}

/// Validate a local file path.
pub fn resolve_local(path: impl AsRef<Path>, max_size_mb: u64) -> Result<ResolvedInput, Pdf2TextError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(Pdf2TextError::FileNotFound { path });
    }

    check_extension(&path)?;

    let size = std::fs::metadata(&path)
        .map_err(|e| map_io_error(&path, e))?
        .len();
    check_size(&path, size, max_size_mb)?;

    let mut file = std::fs::File::open(&path).map_err(|e| map_io_error(&path, e))?;
    let mut magic = [0u8; 4];
    // A file shorter than four bytes can't be a PDF either.
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(Pdf2TextError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), size);
    Ok(ResolvedInput::Local(path))
}

/// Write an in-memory PDF to a temporary file and validate it.
///
/// `file_name` only supplies the name shown in errors and logs; it must
/// still end in `.pdf`.
pub fn resolve_bytes(
    bytes: &[u8],
    file_name: &str,
    max_size_mb: u64,
) -> Result<ResolvedInput, Pdf2TextError> {
    let name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload.pdf".to_string());

    let temp_dir = TempDir::new().map_err(|e| Pdf2TextError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(&name);

    check_extension(&path)?;
    check_size(&path, bytes.len() as u64, max_size_mb)?;
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2TextError::NotAPdf { path, magic });
    }

    std::fs::write(&path, bytes)
        .map_err(|e| Pdf2TextError::Internal(format!("Failed to write temp file: {e}")))?;

    debug!("Wrote {} uploaded bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Temporary {
        path,
        _temp_dir: temp_dir,
    })
}

fn check_extension(path: &Path) -> Result<(), Pdf2TextError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    if extension.eq_ignore_ascii_case("pdf") {
        Ok(())
    } else {
        Err(Pdf2TextError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension,
        })
    }
}

fn check_size(path: &Path, size_bytes: u64, max_size_mb: u64) -> Result<(), Pdf2TextError> {
    let size_mb = size_bytes as f64 / BYTES_PER_MB;
    if size_mb > max_size_mb as f64 {
        return Err(Pdf2TextError::FileTooLarge {
            path: path.to_path_buf(),
            size_mb,
            limit_mb: max_size_mb,
        });
    }
    Ok(())
}

fn map_io_error(path: &Path, e: std::io::Error) -> Pdf2TextError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2TextError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => Pdf2TextError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Pdf2TextError::Internal(format!("Cannot read '{}': {e}", path.display())),
    }
}
