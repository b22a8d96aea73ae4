//! 优雅关闭
//!
//! 收到 Ctrl+C / SIGTERM 后：停止接收新轮次、取消后台清理任务、关闭会话存储。
//! 正在等待 Oracle 的轮次随请求一起被丢弃，不会提交任何状态。

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::gateway::SessionStore;

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C 或控制台 quit
    UserInitiated,
    /// SIGTERM
    Signal,
}

/// 关闭信号：一个 CancellationToken 加上首次触发的原因
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: Arc<std::sync::Mutex<Option<ShutdownReason>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 子 token：后台任务持有它，关闭时一并取消
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        if let Ok(mut guard) = self.reason.lock() {
            guard.get_or_insert(reason);
        }
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().ok().and_then(|g| g.clone())
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 关闭时需要执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 清理任务名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 关闭协调器：按注册顺序执行清理任务，每个任务有独立超时
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    timeout_secs: u64,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout_secs: 5,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    pub async fn run_cleanup(&self) {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(timeout, task.cleanup()).await {
                Ok(Ok(())) => tracing::info!("Cleanup task '{}' completed", name),
                Ok(Err(e)) => tracing::warn!("Cleanup task '{}' failed: {}", name, e),
                Err(_) => {
                    tracing::warn!("Cleanup task '{}' timed out after {}s", name, self.timeout_secs)
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭会话存储（释放 SQLite 连接池等）
pub struct SessionStoreCleanup {
    store: Arc<dyn SessionStore>,
}

impl SessionStoreCleanup {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for SessionStoreCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.store.close().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SessionStore"
    }
}

/// 运行主应用直到其结束或收到关闭信号，然后执行清理
pub async fn run_with_graceful_shutdown<F>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    coordinator: ShutdownCoordinator,
) where
    F: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();

    tokio::select! {
        _ = app => {
            tracing::info!("Application finished normally");
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_manager.reason());
        }
    }

    shutdown_manager.shutdown(ShutdownReason::UserInitiated);
    coordinator.run_cleanup().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MemorySessionStore, Session};
    use crate::gateway::Mode;

    #[test]
    fn test_shutdown_keeps_first_reason() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!token.is_cancelled());

        manager.shutdown(ShutdownReason::Signal);
        manager.shutdown(ShutdownReason::UserInitiated);

        assert!(token.is_cancelled());
        assert!(manager.is_shutdown());
        assert_eq!(manager.reason(), Some(ShutdownReason::Signal));
    }

    #[tokio::test]
    async fn test_store_cleanup_closes_store() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(3600));
        store.put(&Session::new("s1", Mode::Edu, 4)).await.unwrap();

        let mut coordinator = ShutdownCoordinator::new().with_timeout(1);
        coordinator.register(SessionStoreCleanup::new(Arc::clone(&store)));
        coordinator.run_cleanup().await;

        assert!(store.put(&Session::new("s2", Mode::Edu, 4)).await.is_err());
    }
}
