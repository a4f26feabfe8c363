//! Context formatting and single-call answering.

use anyhow::Result;

use crate::llm::ChatModel;
use crate::models::{Document, SOURCE_KEY};

/// Appended to a document's text when it was cut to the character budget.
pub const TRUNCATION_MARKER: &str = "\n\n...[truncated]...";

/// Label used when a document has neither a source nor a back-reference.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Display label: `source` metadata, else the back-reference id, else `"unknown"`.
pub fn source_label(doc: &Document, id_key: &str) -> String {
    [SOURCE_KEY, id_key]
        .iter()
        .find_map(|key| doc.metadata.get(*key))
        .map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Render the first `max_docs` documents as `Source: <label>\n<text>`
/// blocks separated by blank lines.
pub fn format_docs_with_source(
    docs: &[Document],
    max_docs: usize,
    max_chars: usize,
    id_key: &str,
) -> String {
    docs.iter()
        .take(max_docs)
        .map(|doc| {
            format!(
                "Source: {}\n{}",
                source_label(doc, id_key),
                truncate_chars(&doc.content, max_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the following question based on this context:\n\n{}\n\nQuestion: {}",
        context, question
    )
}

/// One generation call over `context`; the reply is returned unchanged.
pub async fn answer(question: &str, context: &str, model: &dyn ChatModel) -> Result<String> {
    model.generate(&render_answer_prompt(question, context)).await
}

/// Format `docs` and answer `question` over them.
pub async fn answer_from_docs(
    question: &str,
    docs: &[Document],
    model: &dyn ChatModel,
    max_docs: usize,
    max_chars: usize,
    id_key: &str,
) -> Result<String> {
    let context = format_docs_with_source(docs, max_docs, max_chars, id_key);
    answer(question, &context, model).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_prefers_source_then_id() {
        let both = Document::new("x")
            .with_meta("source", "wiki/a.md")
            .with_meta("doc_id", "d1");
        let id_only = Document::new("x").with_meta("doc_id", "d1");
        let neither = Document::new("x");
        assert_eq!(source_label(&both, "doc_id"), "wiki/a.md");
        assert_eq!(source_label(&id_only, "doc_id"), "d1");
        assert_eq!(source_label(&neither, "doc_id"), "unknown");

        let mut numeric = Document::new("x");
        numeric.metadata.insert("doc_id".into(), json!(42));
        assert_eq!(source_label(&numeric, "doc_id"), "42");
    }

    #[test]
    fn truncation_is_exact_and_marked() {
        let text = "a".repeat(25);
        let cut = truncate_chars(&text, 10);
        assert_eq!(cut, format!("{}{}", "a".repeat(10), TRUNCATION_MARKER));
        assert_eq!(truncate_chars(&text, 25), text);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "äöüßé".repeat(4);
        let cut = truncate_chars(&text, 7);
        let body = cut.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(body.chars().count(), 7);
    }

    #[test]
    fn format_limits_docs_and_joins_blocks() {
        let docs = vec![
            Document::new("one").with_meta("source", "s1"),
            Document::new("two").with_meta("doc_id", "d2"),
            Document::new("three"),
            Document::new("four"),
        ];
        let out = format_docs_with_source(&docs, 3, 100, "doc_id");
        assert_eq!(out, "Source: s1\none\n\nSource: d2\ntwo\n\nSource: unknown\nthree");
    }

    #[test]
    fn format_of_nothing_is_empty() {
        assert_eq!(format_docs_with_source(&[], 3, 100, "doc_id"), "");
    }

    #[test]
    fn block_ends_with_marker_when_too_long() {
        let docs = vec![Document::new("x".repeat(50)).with_meta("source", "big")];
        let out = format_docs_with_source(&docs, 3, 20, "doc_id");
        assert!(out.ends_with(TRUNCATION_MARKER));
        let body = out
            .strip_prefix("Source: big\n")
            .and_then(|s| s.strip_suffix(TRUNCATION_MARKER))
            .unwrap();
        assert_eq!(body.chars().count(), 20);
    }

    #[test]
    fn answer_prompt_does_not_reinterpret_context() {
        let prompt = render_answer_prompt("Q", "literal {question} in a doc");
        assert!(prompt.contains("literal {question} in a doc"));
    }

    #[test]
    fn answer_prompt_layout() {
        let prompt = render_answer_prompt("Why?", "CTX");
        assert_eq!(
            prompt,
            "Answer the following question based on this context:\n\nCTX\n\nQuestion: Why?"
        );
    }
}
