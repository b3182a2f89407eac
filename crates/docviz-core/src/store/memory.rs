//! In-memory [`SessionStore`] for tests and single-process deployments.
//!
//! Sessions live in a `HashMap` behind `std::sync::RwLock`; nothing
//! survives a restart.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{SessionState, SessionStore};

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of sessions that have been written at least once.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn replace(&self, session_id: &str, state: SessionState) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        sessions.insert(session_id.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Turn};

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemorySessionStore::new();
        let state = store.get("nobody").await.unwrap();
        assert!(state.documents.is_empty());
        assert!(state.conversation.is_empty());
        assert!(state.dashboard.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_replace_then_get() {
        let store = InMemorySessionStore::new();
        let mut state = SessionState::default();
        state
            .documents
            .push(Document::new("a.txt", "txt", 3, 3, vec!["abc".to_string()]));
        state.conversation.push(Turn::user("hello"));
        store.replace("s1", state).await.unwrap();

        let loaded = store.get("s1").await.unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.documents[0].name, "a.txt");
        assert_eq!(loaded.conversation, vec![Turn::user("hello")]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        let mut state = SessionState::default();
        state.conversation.push(Turn::assistant("hi"));
        store.replace("s1", state).await.unwrap();

        assert!(store.get("s2").await.unwrap().conversation.is_empty());
    }

    #[tokio::test]
    async fn test_replace_overwrites_wholesale() {
        let store = InMemorySessionStore::new();
        let mut first = SessionState::default();
        first.conversation.push(Turn::user("one"));
        first.conversation.push(Turn::user("two"));
        store.replace("s", first).await.unwrap();

        store.replace("s", SessionState::default()).await.unwrap();
        assert!(store.get("s").await.unwrap().conversation.is_empty());
    }
}
