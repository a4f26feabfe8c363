//! PDF to Markdown conversion against a hand-built PDF.

use std::fs;

use staged_rag::pdf::{pdf_to_markdown, PdfError};
use tempfile::TempDir;

/// Minimal single-page PDF containing the text "rotation test phrase".
/// Body first, then an xref with correct byte offsets so pdf-extract can
/// parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let stream = b"BT /F1 12 Tf 100 700 Td (rotation test phrase) Tj ET";
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", stream.len()).as_bytes());
    out.extend_from_slice(stream);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[test]
fn converts_single_page() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("guide.pdf");
    let md = tmp.path().join("guide.md");
    fs::write(&pdf, minimal_pdf_with_phrase()).unwrap();

    pdf_to_markdown(&pdf, &md, 1, 1).unwrap();

    let text = fs::read_to_string(&md).unwrap();
    assert!(text.starts_with("\n\n---\n\n# Page 1\n\n"));
    assert!(text.contains("rotation test phrase"));
    assert!(!text.contains("# Page 2"));
}

#[test]
fn range_past_the_end_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("guide.pdf");
    let md = tmp.path().join("guide.md");
    fs::write(&pdf, minimal_pdf_with_phrase()).unwrap();

    let err = pdf_to_markdown(&pdf, &md, 8, 739).unwrap_err();
    assert!(matches!(err, PdfError::PageRange { pages: 1, start: 8, end: 739 }));
    assert_eq!(err.to_string(), "PDF has 1 pages, but requested 8-739");
    assert!(!md.exists());
}

#[test]
fn missing_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = pdf_to_markdown(
        &tmp.path().join("absent.pdf"),
        &tmp.path().join("out.md"),
        1,
        1,
    )
    .unwrap_err();
    assert!(matches!(err, PdfError::Io(_)));
}
