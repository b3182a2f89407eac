//! Context assembly for the answering step.
//!
//! Turns either ranked [`RetrievalResult`]s or, when retrieval found
//! nothing, the leading chunks of every document into one text block
//! that the application hands to the completion collaborator.
//!
//! An empty string means "no usable context"; callers must not send an
//! empty context to the model.

use crate::models::{Document, RetrievalResult};

/// Default character budget for the fallback path.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

/// Chunks taken from the head of each document on the fallback path.
pub const FALLBACK_CHUNKS_PER_DOCUMENT: usize = 5;

const SEPARATOR: &str = "\n\n---\n\n";

/// Input for [`assemble_context`].
#[derive(Debug, Clone, Copy)]
pub enum ContextSource<'a> {
    /// Ranked retrieval output; included in full.
    Retrieved(&'a [RetrievalResult]),
    /// Whole documents, bounded by a character budget.
    Fallback {
        documents: &'a [Document],
        max_chars: usize,
    },
}

/// Assemble a context block from either source.
pub fn assemble_context(source: ContextSource<'_>) -> String {
    match source {
        ContextSource::Retrieved(results) => from_results(results),
        ContextSource::Fallback {
            documents,
            max_chars,
        } => from_documents(documents, max_chars),
    }
}

/// Concatenate every result as a `[From: <name>]` block, in input order.
///
/// No truncation: the retrieval cap already bounds the size.
pub fn from_results(results: &[RetrievalResult]) -> String {
    let mut context = String::new();
    for r in results {
        context.push_str("[From: ");
        context.push_str(&r.document_name);
        context.push_str("]\n");
        context.push_str(&r.chunk.text);
        context.push_str(SEPARATOR);
    }
    context
}

/// Concatenate the first [`FALLBACK_CHUNKS_PER_DOCUMENT`] chunks of each
/// document, each followed by a separator.
///
/// Assembly stops at the first chunk that would not fit: a chunk is
/// added only while `accumulated + chunk < max_chars` (in characters).
/// Partial chunks are never included.
pub fn from_documents(documents: &[Document], max_chars: usize) -> String {
    let separator_chars = SEPARATOR.chars().count();
    let mut context = String::new();
    let mut context_chars = 0usize;

    let leading = documents
        .iter()
        .flat_map(|d| d.chunks.iter().take(FALLBACK_CHUNKS_PER_DOCUMENT));

    for chunk in leading {
        let chunk_chars = chunk.text.chars().count();
        if context_chars + chunk_chars >= max_chars {
            break;
        }
        context.push_str(&chunk.text);
        context.push_str(SEPARATOR);
        context_chars += chunk_chars + separator_chars;
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::retrieve;

    fn doc(name: &str, chunks: &[&str]) -> Document {
        Document::new(
            name,
            "txt",
            0,
            0,
            chunks.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[test]
    fn test_empty_documents_give_empty_context() {
        assert_eq!(from_documents(&[], 8000), "");
        assert_eq!(
            assemble_context(ContextSource::Fallback {
                documents: &[],
                max_chars: DEFAULT_MAX_CONTEXT_CHARS,
            }),
            ""
        );
    }

    #[test]
    fn test_documents_without_chunks_give_empty_context() {
        let docs = vec![doc("empty.txt", &[])];
        assert_eq!(from_documents(&docs, 8000), "");
    }

    #[test]
    fn test_retrieved_format() {
        let docs = vec![doc("guide.txt", &["Install with cargo.", "Run the binary."])];
        let results = retrieve("cargo", &docs, 5);
        let context = assemble_context(ContextSource::Retrieved(&results));
        assert_eq!(context, "[From: guide.txt]\nInstall with cargo.\n\n---\n\n");
    }

    #[test]
    fn test_retrieved_not_truncated() {
        let long = "cargo ".repeat(2000);
        let docs = vec![doc("big.txt", &[long.as_str(), long.as_str()])];
        let results = retrieve("cargo", &docs, 5);
        let context = from_results(&results);
        assert!(context.len() > DEFAULT_MAX_CONTEXT_CHARS);
        assert_eq!(context.matches("[From: big.txt]").count(), 2);
    }

    #[test]
    fn test_fallback_takes_first_five_chunks_per_document() {
        let docs = vec![
            doc("a.txt", &["a1", "a2", "a3", "a4", "a5", "a6"]),
            doc("b.txt", &["b1"]),
        ];
        let context = from_documents(&docs, 8000);
        assert_eq!(
            context,
            "a1\n\n---\n\na2\n\n---\n\na3\n\n---\n\na4\n\n---\n\na5\n\n---\n\nb1\n\n---\n\n"
        );
    }

    #[test]
    fn test_fallback_stops_before_overflowing_chunk() {
        let docs = vec![doc("a.txt", &["aaaaa", "bbbbb", "c"])];
        // "aaaaa" (5) fits; then 5 + 7 separator = 12 accumulated,
        // 12 + 5 = 17 is not below 15, so assembly stops even though "c" would fit.
        let context = from_documents(&docs, 15);
        assert_eq!(context, "aaaaa\n\n---\n\n");
    }

    #[test]
    fn test_fallback_chunk_equal_to_budget_excluded() {
        let docs = vec![doc("a.txt", &["0123456789"])];
        assert_eq!(from_documents(&docs, 10), "");
        assert_eq!(from_documents(&docs, 11), "0123456789\n\n---\n\n");
    }
}
