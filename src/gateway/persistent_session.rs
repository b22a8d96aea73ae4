//! 持久化会话存储
//!
//! 使用 SQLite 存储整个会话（JSON），服务重启后未过期的会话可继续对话

#![cfg(feature = "async-sqlite")]

use std::path::Path;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::Row;

use super::session::Session;
use super::session_store::{SessionStore, StoreError};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => StoreError::Closed,
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// 时间戳统一为 UTC、微秒精度，保证字符串比较与时间比较一致
fn timestamp(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct PersistentSessionStore {
    pool: sqlx::sqlite::SqlitePool,
    ttl_secs: u64,
}

impl PersistentSessionStore {
    pub async fn new(db_path: impl AsRef<Path>, ttl_secs: u64) -> Result<Self, StoreError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool, ttl_secs };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dialog_sessions (
                id TEXT PRIMARY KEY,
                mode TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dialog_sessions_updated ON dialog_sessions(updated_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn cutoff(&self) -> String {
        let ttl = chrono::Duration::seconds(self.ttl_secs.min(i32::MAX as u64) as i64);
        timestamp(Utc::now() - ttl)
    }
}

#[async_trait]
impl SessionStore for PersistentSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT data FROM dialog_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row.get("data");
        let session: Session = serde_json::from_str(&data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if session.is_expired(self.ttl_secs, Utc::now()) {
            self.remove(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        let data =
            serde_json::to_string(session).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO dialog_sessions (id, mode, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET mode = excluded.mode, data = excluded.data,
                                           updated_at = excluded.updated_at",
        )
        .bind(&session.id)
        .bind(session.mode().as_str())
        .bind(&data)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.last_active_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM dialog_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM dialog_sessions WHERE updated_at <= ?")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn active_count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM dialog_sessions WHERE updated_at > ?")
            .bind(self.cutoff())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Mode;

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        let mut session = Session::new("persist-1", Mode::Kiosk, 4);
        session.record_turn("아메리카노 주세요", "뜨거운/아이스 중 어떤 걸로 드릴까요?");
        {
            let store = PersistentSessionStore::new(&path, 3600).await.unwrap();
            store.put(&session).await.unwrap();
            store.close().await.unwrap();
        }

        let store = PersistentSessionStore::new(&path, 3600).await.unwrap();
        let loaded = store.get("persist-1").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(store.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_and_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentSessionStore::new(dir.path().join("s.db"), 60)
            .await
            .unwrap();

        let mut old = Session::new("old", Mode::Edu, 4);
        old.last_active_at = Utc::now() - chrono::Duration::seconds(600);
        store.put(&old).await.unwrap();
        store.put(&Session::new("new", Mode::Edu, 4)).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get("new").await.unwrap().is_some());

        store.close().await.unwrap();
        assert!(store.put(&Session::new("late", Mode::Edu, 4)).await.is_err());
    }
}
