//! Turns uploaded bytes into plain text.
//!
//! Dispatch is by file-name suffix (case-insensitive): `.pdf`, `.docx`/`.doc`,
//! anything else is decoded as UTF-8. Extraction never fails outward: every
//! internal error is logged and becomes the empty string.

pub mod docx;
pub mod normalize;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

pub use normalize::{normalize, SECTION_KEYWORDS, SECTION_MARKER};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Word archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Word XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Document formats recognized by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    PlainText,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".pdf") {
            DocumentKind::Pdf
        } else if lower.ends_with(".docx") || lower.ends_with(".doc") {
            DocumentKind::Word
        } else {
            DocumentKind::PlainText
        }
    }
}

/// Best-effort text extractor.
///
/// `scratch_dir` is where Word uploads are materialized before parsing; the
/// temporary file is removed before `extract_text` returns on every path.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    scratch_dir: Option<PathBuf>,
}

impl TextExtractor {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    pub fn extract_text(&self, bytes: &[u8], file_name: &str) -> String {
        let kind = DocumentKind::from_file_name(file_name);
        debug!("Extracting {} bytes from '{}' as {:?}", bytes.len(), file_name, kind);

        let result = match kind {
            DocumentKind::Pdf => extract_pdf(bytes),
            DocumentKind::Word => docx::extract_word(bytes, self.scratch_dir.as_deref()),
            DocumentKind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
        };

        match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Text extraction failed for '{}': {}", file_name, e);
                String::new()
            }
        }
    }
}

/// Extracts text using the system temp dir for Word scratch files.
pub fn extract_text(bytes: &[u8], file_name: &str) -> String {
    TextExtractor::default().extract_text(bytes, file_name)
}

/// Page-by-page PDF text joined with newlines. A page without text yields an
/// empty line rather than an error.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    // pdf-extract can panic on malformed input
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::Pdf("parser panicked on malformed PDF".to_string()))?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    Ok(pages.join("\n"))
}
