//! Document question answering.
//!
//! Upload → extract → segment → store; then per question: retrieve →
//! assemble context → complete. Used by the `/api/dociq/*` routes and the
//! `search` / `context` CLI commands.
//!
//! Session state is read and replaced wholesale through a
//! [`SessionStore`]; nothing here touches a database directly.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use docviz_core::context::{assemble_context, ContextSource};
use docviz_core::models::{Document, Role, Turn};
use docviz_core::retrieve::retrieve;
use docviz_core::segment::segment;
use docviz_core::store::SessionStore;

use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::extract::{extract, file_extension, ExtractError, DOCUMENT_EXTENSIONS};
use crate::llm::{complete_or_explain, Completer};

/// Reply when the session has no documents at all.
pub const NO_DOCUMENTS_REPLY: &str =
    "Please upload some documents first. I need document content to provide accurate answers.";

/// Reply when documents exist but none of them produced any text.
pub const NO_CONTEXT_REPLY: &str =
    "I don't have any document content to reference. Please upload some documents first.";

const RETRIEVED_HEADER: &str = "**Relevant Document Content:**\n\n";
const FALLBACK_HEADER: &str = "**Document Content:**\n\n";

const ANSWER_INSTRUCTIONS: &str = "You are DocIQ, a document assistant. \
Answer only from the document content below. If the answer is not there, say so. \
Quote relevant passages where useful and name the document each fact comes from.";

const SUMMARY_INSTRUCTIONS: &str =
    "You are DocIQ, a document analysis assistant. Provide clear, concise summaries.";

/// Listing entry for an uploaded document (no chunk text).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub extension: String,
    pub size: u64,
    pub text_length: usize,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
    pub status: &'static str,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            extension: doc.extension.clone(),
            size: doc.size_bytes,
            text_length: doc.text_length,
            chunk_count: doc.chunks.len(),
            uploaded_at: doc.uploaded_at,
            status: "ready",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub has_documents: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReply {
    pub summary: String,
    pub document_count: usize,
    pub total_text_length: usize,
}

/// Reduce an uploaded file name to a safe display name.
///
/// Directory components are dropped, whitespace becomes `_`, and only
/// ASCII alphanumerics plus `.`, `_`, `-` survive. Leading dots are removed.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(&['/', '\\'][..]).next().unwrap_or(filename);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Validate, extract, and segment one uploaded file.
pub fn ingest_document(
    filename: &str,
    bytes: &[u8],
    chunking: &ChunkingConfig,
) -> Result<Document, ExtractError> {
    let name = sanitize_filename(filename);
    let extension = file_extension(&name);
    if !DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ExtractError::UnsupportedFormat(extension));
    }

    let text = extract(bytes, &extension)?;
    let chunks = segment(&text, chunking.chunk_size, chunking.overlap);

    Ok(Document::new(
        &name,
        &extension,
        bytes.len() as u64,
        text.chars().count(),
        chunks,
    ))
}

/// Context for answering `query`: retrieved chunks when any match,
/// otherwise the leading chunks of every document, otherwise `""`.
pub fn build_answer_context(
    query: &str,
    documents: &[Document],
    retrieval: &RetrievalConfig,
) -> String {
    let results = retrieve(query, documents, retrieval.max_results);
    if !results.is_empty() {
        let body = assemble_context(ContextSource::Retrieved(&results));
        return format!("{}{}", RETRIEVED_HEADER, body);
    }

    let body = assemble_context(ContextSource::Fallback {
        documents,
        max_chars: retrieval.max_context_chars,
    });
    if body.is_empty() {
        return body;
    }
    format!("{}{}", FALLBACK_HEADER, body)
}

/// Turns sent to the model: instructions with context, the tail of the
/// prior conversation, then the new question.
pub fn answer_turns(
    context: &str,
    history: &[Turn],
    message: &str,
    history_turns: usize,
) -> Vec<Turn> {
    let system = format!(
        "{}\n\nUPLOADED DOCUMENT CONTENT:\n{}\n\nCurrent date: {}",
        ANSWER_INSTRUCTIONS,
        context,
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );

    let prior: Vec<&Turn> = history
        .iter()
        .filter(|t| matches!(t.role, Role::User | Role::Assistant))
        .collect();
    let skip = prior.len().saturating_sub(history_turns);

    let mut turns = vec![Turn::system(system)];
    turns.extend(prior.into_iter().skip(skip).cloned());
    turns.push(Turn::user(message));
    turns
}

pub async fn add_document(store: &dyn SessionStore, session: &str, doc: Document) -> Result<()> {
    let mut state = store.get(session).await?;
    info!(
        session,
        document = %doc.name,
        chunks = doc.chunks.len(),
        "document added"
    );
    state.documents.push(doc);
    store.replace(session, state).await
}

pub async fn list_documents(store: &dyn SessionStore, session: &str) -> Result<Vec<DocumentSummary>> {
    let state = store.get(session).await?;
    Ok(state.documents.iter().map(DocumentSummary::from).collect())
}

/// Remove one document. Returns `false` when no document has that id.
pub async fn delete_document(store: &dyn SessionStore, session: &str, id: &str) -> Result<bool> {
    let mut state = store.get(session).await?;
    let before = state.documents.len();
    state.documents.retain(|d| d.id != id);
    if state.documents.len() == before {
        return Ok(false);
    }
    store.replace(session, state).await?;
    Ok(true)
}

/// Drop every document and the conversation.
pub async fn clear(store: &dyn SessionStore, session: &str) -> Result<()> {
    let mut state = store.get(session).await?;
    state.documents.clear();
    state.conversation.clear();
    store.replace(session, state).await
}

/// Answer `message` from the session's documents and record both turns.
///
/// A session without documents gets [`NO_DOCUMENTS_REPLY`] and nothing is
/// recorded. The model is never called with an empty context.
pub async fn answer(
    store: &dyn SessionStore,
    completer: &dyn Completer,
    retrieval: &RetrievalConfig,
    session: &str,
    message: &str,
) -> Result<ChatReply> {
    let snapshot = store.get(session).await?;

    if snapshot.documents.is_empty() {
        return Ok(ChatReply {
            response: NO_DOCUMENTS_REPLY.to_string(),
            has_documents: false,
            document_count: None,
            timestamp: Utc::now(),
        });
    }

    let context = build_answer_context(message, &snapshot.documents, retrieval);
    let response = if context.is_empty() {
        NO_CONTEXT_REPLY.to_string()
    } else {
        let turns = answer_turns(&context, &snapshot.conversation, message, retrieval.history_turns);
        complete_or_explain(completer, &turns).await
    };

    // Re-read: other requests may have changed the session during the call.
    let mut state = store.get(session).await?;
    state.conversation.push(Turn::user(message));
    state.conversation.push(Turn::assistant(response.clone()));
    let document_count = state.documents.len();
    store.replace(session, state).await?;

    Ok(ChatReply {
        response,
        has_documents: true,
        document_count: Some(document_count),
        timestamp: Utc::now(),
    })
}

/// Overview of every document in the session plus a short preview, as a
/// single prompt.
pub fn summary_prompt(documents: &[Document], max_chars: usize) -> String {
    let mut overview = String::from("**Uploaded Documents:**\n\n");
    for doc in documents {
        overview.push_str(&format!(
            "- {} ({}, {} chars)\n",
            doc.name,
            doc.extension.to_uppercase(),
            doc.text_length
        ));
    }

    let preview = assemble_context(ContextSource::Fallback {
        documents,
        max_chars,
    });

    format!(
        "Please provide a brief summary of the following documents:\n\n{}\n\
         Combined document content preview:\n{}\n\n\
         Provide:\n1. A brief overview of what these documents contain\n\
         2. Key topics covered\n3. Main takeaways",
        overview, preview
    )
}

/// Summarize the session's documents. `None` when there are none.
pub async fn summarize(
    store: &dyn SessionStore,
    completer: &dyn Completer,
    retrieval: &RetrievalConfig,
    session: &str,
) -> Result<Option<SummaryReply>> {
    let state = store.get(session).await?;
    if state.documents.is_empty() {
        return Ok(None);
    }

    let turns = [
        Turn::system(SUMMARY_INSTRUCTIONS),
        Turn::user(summary_prompt(
            &state.documents,
            retrieval.summary_context_chars,
        )),
    ];
    let summary = complete_or_explain(completer, &turns).await;

    Ok(Some(SummaryReply {
        summary,
        document_count: state.documents.len(),
        total_text_length: state.documents.iter().map(|d| d.text_length).sum(),
    }))
}
