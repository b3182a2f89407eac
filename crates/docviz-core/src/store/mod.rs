//! Session storage abstraction.
//!
//! A session owns its uploaded documents, the document-chat conversation,
//! the assistant chat, and at most one active dataset with its generated dashboard. The
//! [`SessionStore`] trait reads and replaces that state wholesale; there
//! is no partial update, so concurrent writers to the same session are
//! last-writer-wins.
//!
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Document, Turn};
use crate::tabular::{Analysis, Dataset};

/// Everything the server remembers about one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Uploaded documents, in upload order.
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Document-chat history (user and assistant turns only).
    #[serde(default)]
    pub conversation: Vec<Turn>,
    /// General assistant chat, kept apart from the document chat.
    #[serde(default)]
    pub chat: Vec<Turn>,
    /// The active dataset, replaced on every tabular upload.
    #[serde(default)]
    pub dashboard: Option<StoredDashboard>,
}

/// A parsed dataset together with everything derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDashboard {
    pub filename: String,
    pub dataset: Dataset,
    pub analysis: Analysis,
    pub uploaded_at: DateTime<Utc>,
}

/// Read/replace persistence for [`SessionState`], keyed by session id.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](SessionStore::get) | Load a session; unknown ids yield an empty state |
/// | [`replace`](SessionStore::replace) | Overwrite a session's state |
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state of `session_id`, or [`SessionState::default`] when
    /// the session has never been written.
    async fn get(&self, session_id: &str) -> Result<SessionState>;

    /// Replace the whole state of `session_id`.
    async fn replace(&self, session_id: &str, state: SessionState) -> Result<()>;
}
