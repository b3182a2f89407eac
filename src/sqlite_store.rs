//! SQLite-backed [`SessionStore`].
//!
//! Each session is a single row whose `state_json` column holds the
//! serialized [`SessionState`]. Reads deserialize the row; writes upsert
//! it. The table is created by `docviz init` or at server start (see
//! [`crate::migrate`]).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use docviz_core::store::{SessionState, SessionStore};

use crate::config::Config;
use crate::db;

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using `[store].path`. The schema must already exist.
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        let row: Option<(String,)> = sqlx::query_as("SELECT state_json FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((json,)) => serde_json::from_str(&json)
                .with_context(|| format!("corrupt state for session '{}'", session_id)),
            None => Ok(SessionState::default()),
        }
    }

    async fn replace(&self, session_id: &str, state: SessionState) -> Result<()> {
        let json = serde_json::to_string(&state)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, state_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(&json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreBackend, StoreConfig};
    use crate::migrate::create_schema;
    use docviz_core::models::{Document, Turn};

    async fn temp_store(dir: &tempfile::TempDir) -> SqliteSessionStore {
        let mut config = Config::minimal();
        config.store = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: dir.path().join("sessions.sqlite"),
        };
        let pool = db::connect(&config).await.unwrap();
        create_schema(&pool).await.unwrap();
        SqliteSessionStore::new(pool)
    }

    #[tokio::test]
    async fn test_unknown_session_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        let state = store.get("missing").await.unwrap();
        assert!(state.documents.is_empty());
        assert!(state.dashboard.is_none());
    }

    #[tokio::test]
    async fn test_replace_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;

        let mut state = SessionState::default();
        state.documents.push(Document::new(
            "notes.txt",
            "txt",
            11,
            11,
            vec!["hello world".to_string()],
        ));
        state.conversation.push(Turn::user("hi"));
        store.replace("s1", state).await.unwrap();

        let loaded = store.get("s1").await.unwrap();
        assert_eq!(loaded.documents[0].name, "notes.txt");
        assert_eq!(loaded.documents[0].chunks[0].text, "hello world");
        assert_eq!(loaded.conversation, vec![Turn::user("hi")]);

        store.replace("s1", SessionState::default()).await.unwrap();
        assert!(store.get("s1").await.unwrap().documents.is_empty());
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        create_schema(&store.pool).await.unwrap();
        create_schema(&store.pool).await.unwrap();
    }
}
