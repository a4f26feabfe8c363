//! PDF to Markdown conversion for a page range.
//!
//! Each page in the 1-based inclusive range becomes a section:
//!
//! ```text
//!
//!
//! ---
//!
//! # Page 8
//!
//! <page text, or _[No extractable text on this page]_>
//! ```

use std::path::Path;

/// Written in place of a page whose text is blank.
pub const EMPTY_PAGE_PLACEHOLDER: &str = "_[No extractable text on this page]_";

pub const DEFAULT_START_PAGE: usize = 8;
pub const DEFAULT_END_PAGE: usize = 739;

#[derive(Debug)]
pub enum PdfError {
    Io(std::io::Error),
    Extract(String),
    PageRange {
        pages: usize,
        start: usize,
        end: usize,
    },
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfError::Io(e) => write!(f, "PDF file I/O failed: {}", e),
            PdfError::Extract(e) => write!(f, "PDF extraction failed: {}", e),
            PdfError::PageRange { pages, start, end } => {
                write!(f, "PDF has {} pages, but requested {}-{}", pages, start, end)
            }
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(e: std::io::Error) -> Self {
        PdfError::Io(e)
    }
}

/// Render pages `start..=end` (1-based) of already-extracted page texts.
pub fn render_pages(pages: &[String], start: usize, end: usize) -> Result<String, PdfError> {
    if start < 1 || end > pages.len() || start > end {
        return Err(PdfError::PageRange {
            pages: pages.len(),
            start,
            end,
        });
    }

    let mut out = String::new();
    for (offset, text) in pages[start - 1..end].iter().enumerate() {
        out.push_str(&format!("\n\n---\n\n# Page {}\n\n", start + offset));
        if text.trim().is_empty() {
            out.push_str(EMPTY_PAGE_PLACEHOLDER);
        } else {
            out.push_str(text);
        }
    }
    Ok(out)
}

/// Convert pages `start..=end` of the PDF at `pdf_path` into Markdown at
/// `md_path`. Nothing is written when the range is invalid.
pub fn pdf_to_markdown(
    pdf_path: &Path,
    md_path: &Path,
    start: usize,
    end: usize,
) -> Result<(), PdfError> {
    let bytes = std::fs::read(pdf_path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| PdfError::Extract(e.to_string()))?;
    tracing::debug!(pages = pages.len(), start, end, "extracted PDF pages");

    let markdown = render_pages(&pages, start, end)?;
    std::fs::write(md_path, markdown)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn renders_selected_pages_with_headers() {
        let md = render_pages(&pages(&["one", "two", "three"]), 2, 3).unwrap();
        assert_eq!(md, "\n\n---\n\n# Page 2\n\ntwo\n\n---\n\n# Page 3\n\nthree");
    }

    #[test]
    fn blank_page_gets_placeholder() {
        let md = render_pages(&pages(&["  \n"]), 1, 1).unwrap();
        assert!(md.ends_with(EMPTY_PAGE_PLACEHOLDER));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let doc = pages(&["a", "b"]);
        let err = render_pages(&doc, 1, 3).unwrap_err();
        assert_eq!(err.to_string(), "PDF has 2 pages, but requested 1-3");
        assert!(render_pages(&doc, 0, 1).is_err());
        assert!(render_pages(&doc, 2, 1).is_err());
    }

    #[test]
    fn invalid_pdf_is_an_extract_error() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = tmp.path().join("bad.pdf");
        let md = tmp.path().join("out.md");
        std::fs::write(&pdf, b"not a pdf").unwrap();
        let err = pdf_to_markdown(&pdf, &md, 1, 1).unwrap_err();
        assert!(matches!(err, PdfError::Extract(_)));
        assert!(!md.exists());
    }
}
