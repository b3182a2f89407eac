//! Document-side data models.
//!
//! These types flow through the upload → segment → retrieve → answer
//! pipeline and are persisted inside a session's state. Tabular types
//! live in [`crate::tabular`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A slice of a document's extracted text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// An uploaded document and its ordered chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Sanitized file name as shown to the user.
    pub name: String,
    /// Lower-case extension without the dot (`pdf`, `docx`, `txt`, ...).
    pub extension: String,
    pub size_bytes: u64,
    /// Number of characters extracted from the file.
    pub text_length: usize,
    pub chunks: Vec<Chunk>,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Build a document with a fresh UUID from already-segmented text.
    ///
    /// Chunk indices follow the order of `segments`.
    pub fn new(
        name: &str,
        extension: &str,
        size_bytes: u64,
        text_length: usize,
        segments: Vec<String>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let chunks = segments
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                document_id: id.clone(),
                chunk_index,
                text,
            })
            .collect();

        Self {
            id,
            name: name.to_string(),
            extension: extension.to_string(),
            size_bytes,
            text_length,
            chunks,
            uploaded_at: Utc::now(),
        }
    }
}

/// A chunk matched against a query. Produced per query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub document_name: String,
    /// Fraction of unique query words found in the chunk, in `(0, 1]`.
    pub score: f64,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation handed to the completion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new_links_chunks() {
        let doc = Document::new(
            "notes.txt",
            "txt",
            42,
            20,
            vec!["first".to_string(), "second".to_string()],
        );
        assert_eq!(doc.chunks.len(), 2);
        for (i, c) in doc.chunks.iter().enumerate() {
            assert_eq!(c.document_id, doc.id);
            assert_eq!(c.chunk_index, i);
        }
        assert_eq!(doc.chunks[1].text, "second");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
