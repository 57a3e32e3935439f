//! PDF text acquisition.
//!
//! Thin wrapper around `pdf-extract`: read the file, check that it is a
//! plausible PDF, hand back the raw text. Whether the text is usable
//! (scanned statements extract almost nothing) is judged downstream by
//! the extraction engine.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// PDF magic bytes
const PDF_MAGIC: &[u8] = b"%PDF";
/// Maximum accepted PDF file size (100 MB)
const MAX_PDF_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not a usable PDF: {0}")]
    Invalid(String),
    #[error("text extraction failed: {0}")]
    Extract(String),
}

/// Reject files that cannot be a statement PDF before handing them to the
/// extraction library.
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<(), PdfError> {
    if bytes.len() < 8 {
        return Err(PdfError::Invalid("file too small".to_string()));
    }
    if bytes.len() > MAX_PDF_SIZE {
        return Err(PdfError::Invalid(format!(
            "file is {} MB, maximum is {} MB",
            bytes.len() / (1024 * 1024),
            MAX_PDF_SIZE / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(PdfError::Invalid("PDF header missing".to_string()));
    }
    Ok(())
}

/// Read a PDF file and extract its full text.
pub fn extract_text(path: &Path) -> Result<String, PdfError> {
    let bytes = fs::read(path).map_err(|source| PdfError::Read {
        path: path.display().to_string(),
        source,
    })?;
    extract_text_from_bytes(&bytes)
}

/// Extract text from in-memory PDF bytes.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String, PdfError> {
    validate_pdf_bytes(bytes)?;
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| PdfError::Extract(e.to_string()))
}
