//! 会话存储抽象层
//!
//! 按 client_session_id 读写整个会话；过期以 last_active_at 为起点滑动计算。
//! 内存实现用于测试与单机部署，SQLite 实现（async-sqlite feature）用于跨重启保留会话。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::session::Session;

#[cfg(feature = "async-sqlite")]
use super::persistent_session::PersistentSessionStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session serialization failed: {0}")]
    Serialization(String),

    #[error("Session database error: {0}")]
    Database(String),

    #[error("Session store is closed")]
    Closed,
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取会话；不存在或已过期返回 None
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// 整体写入（覆盖）
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    async fn remove(&self, session_id: &str) -> Result<(), StoreError>;

    /// 清理过期会话，返回清理数量
    async fn cleanup_expired(&self) -> Result<usize, StoreError>;

    async fn active_count(&self) -> Result<usize, StoreError>;

    /// 关闭存储；之后的读写返回 Closed
    async fn close(&self) -> Result<(), StoreError>;
}

/// 内存会话存储
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl_secs: u64,
    closed: AtomicBool,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_secs,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.ensure_open()?;
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(s) if !s.is_expired(self.ttl_secs, now) => return Ok(Some(s.clone())),
                Some(_) => {}
            }
        }
        // 已过期：惰性删除
        self.sessions.write().await.remove(session_id);
        tracing::debug!(session_id, "session expired on access");
        Ok(None)
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl_secs, now));
        Ok(before - sessions.len())
    }

    async fn active_count(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self.sessions.read().await.len())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        self.sessions.write().await.clear();
        Ok(())
    }
}

/// 创建会话存储
///
/// 如果提供了 db_path 且启用了 async-sqlite feature，则使用持久化存储；否则使用内存存储
pub async fn create_session_store(
    db_path: Option<&std::path::Path>,
    ttl_secs: u64,
) -> Arc<dyn SessionStore> {
    #[cfg(feature = "async-sqlite")]
    if let Some(path) = db_path {
        match PersistentSessionStore::new(path, ttl_secs).await {
            Ok(store) => {
                tracing::info!("Using persistent session store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to create persistent store, falling back to memory: {}", e);
            }
        }
    }

    #[cfg(not(feature = "async-sqlite"))]
    if db_path.is_some() {
        tracing::warn!(
            "Persistent session store requested but async-sqlite feature not enabled, using memory store"
        );
    }

    tracing::info!("Using in-memory session store (ttl {}s)", ttl_secs);
    Arc::new(MemorySessionStore::new(ttl_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Mode;

    fn stale(id: &str, secs_ago: i64) -> Session {
        let mut s = Session::new(id, Mode::Kiosk, 4);
        s.last_active_at = Utc::now() - chrono::Duration::seconds(secs_ago);
        s
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemorySessionStore::new(60);
        assert!(store.get("a").await.unwrap().is_none());

        let s = Session::new("a", Mode::Edu, 4);
        store.put(&s).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(s));
        assert_eq!(store.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_invisible() {
        let store = MemorySessionStore::new(60);
        store.put(&stale("old", 120)).await.unwrap();
        assert!(store.get("old").await.unwrap().is_none());
        assert_eq!(store.active_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemorySessionStore::new(60);
        store.put(&stale("old", 120)).await.unwrap();
        store.put(&stale("fresh", 5)).await.unwrap();
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemorySessionStore::new(60);
        store.close().await.unwrap();
        assert!(matches!(store.get("a").await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_factory_without_path_uses_memory() {
        let store = create_session_store(None, 60).await;
        store.put(&Session::new("x", Mode::Kiosk, 2)).await.unwrap();
        assert_eq!(store.active_count().await.unwrap(), 1);
    }
}
