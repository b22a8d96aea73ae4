//! ModeRouter：会话加载 → 模式校验 → 分派状态机 → 持久化
//!
//! 同一会话的整个 load-mutate-persist 周期在会话锁内完成；
//! 状态机返回 error 回复（Oracle / 目录不可用）时不写存储，轮次计数与过期时间都不变。
//! 调用方丢弃 handle 的 future（请求取消）时，put 不会执行，同样不提交任何修改。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::lock::SessionLocks;
use super::meta::{MetaEnvelope, Mode, ModeContext};
use super::session::{Session, SessionState};
use super::session_store::{create_session_store, SessionStore};
use crate::catalog::create_catalog;
use crate::config::AppConfig;
use crate::core::DialogError;
use crate::dialogue::{EduMachine, KeywordOptionInterpreter, KioskMachine, Reply};
use crate::llm::{create_llm_from_config, LanguageOracle, LearnerLevel};

/// 一轮处理结果
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// 本轮追踪 ID（日志中同名字段）
    pub trace_id: String,
    pub session_id: String,
    pub mode: Mode,
    /// 已成功完成的轮数（失败轮次不计入）
    pub turn_count: u64,
    pub reply: Reply,
}

pub struct ModeRouter {
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    edu: EduMachine,
    kiosk: KioskMachine,
    max_context_turns: usize,
}

impl ModeRouter {
    pub fn new(
        store: Arc<dyn SessionStore>,
        edu: EduMachine,
        kiosk: KioskMachine,
        max_context_turns: usize,
    ) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            edu,
            kiosk,
            max_context_turns,
        }
    }

    /// 按配置组装：LLM → Oracle → 教学状态机；目录 → 点餐状态机；会话存储
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, DialogError> {
        let llm = create_llm_from_config(cfg);
        let oracle = LanguageOracle::new(llm, Duration::from_secs(cfg.llm.timeouts.request));
        let level = LearnerLevel::parse(&cfg.edu.default_level).unwrap_or_else(|| {
            tracing::warn!("Unknown edu.default_level {:?}, using advanced", cfg.edu.default_level);
            LearnerLevel::default()
        });
        let edu = EduMachine::new(oracle, level, cfg.edu.llm_intent_fallback);

        let catalog = create_catalog(&cfg.catalog)
            .map_err(|e| DialogError::ServiceUnavailable(e.to_string()))?;
        let kiosk = KioskMachine::new(catalog, Arc::new(KeywordOptionInterpreter::new()))
            .with_max_quantity(cfg.kiosk.max_quantity)
            .with_recommendation_limit(cfg.kiosk.recommendation_limit)
            .with_catalog_timeout(Duration::from_secs(cfg.catalog.timeout_secs));

        let store = create_session_store(cfg.session.db_path.as_deref(), cfg.session.ttl_secs).await;
        Ok(Self::new(store, edu, kiosk, cfg.app.max_context_turns))
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// 处理一轮对话
    ///
    /// 只有信封层面的问题（模式不一致）和存储故障以 Err 返回；
    /// 状态机内部的失败都已转换为 Reply。
    pub async fn handle(&self, utterance: &str, meta: &MetaEnvelope) -> Result<TurnOutcome, DialogError> {
        let trace_id = new_trace_id();
        let span = tracing::info_span!(
            "turn",
            trace_id = %trace_id,
            session_id = %meta.client_session_id,
            mode = %meta.mode(),
        );
        self.handle_turn(trace_id, utterance, meta).instrument(span).await
    }

    async fn handle_turn(
        &self,
        trace_id: String,
        utterance: &str,
        meta: &MetaEnvelope,
    ) -> Result<TurnOutcome, DialogError> {
        let session_id = meta.client_session_id.as_str();
        let _guard = self.locks.acquire(session_id).await;

        let existing = self
            .store
            .get(session_id)
            .await
            .map_err(|e| DialogError::Store(e.to_string()))?;

        let mut session = match existing {
            Some(session) if session.mode() != meta.mode() => {
                tracing::warn!(stored = %session.mode(), "mode mismatch");
                return Err(DialogError::ModeMismatch {
                    stored: session.mode().to_string(),
                    requested: meta.mode().to_string(),
                });
            }
            Some(session) => session,
            None => {
                tracing::info!("new session");
                Session::new(session_id, meta.mode(), self.max_context_turns)
            }
        };

        let history = session.history.messages().to_vec();
        let (reply, state) = match (&session.state, &meta.context) {
            (SessionState::Edu(state), ModeContext::Edu(ctx)) => {
                let (reply, next) = self.edu.process(utterance, ctx, state, &history).await;
                (reply, SessionState::Edu(next))
            }
            (SessionState::Kiosk(state), ModeContext::Kiosk(ctx)) => {
                let (reply, next) = self.kiosk.process(utterance, ctx, state).await;
                (reply, SessionState::Kiosk(next))
            }
            _ => {
                return Err(DialogError::ModeMismatch {
                    stored: session.mode().to_string(),
                    requested: meta.mode().to_string(),
                })
            }
        };

        if reply.is_failure() {
            tracing::info!(notice = ?reply.notice(), "turn failed, session left unchanged");
            return Ok(TurnOutcome {
                trace_id,
                session_id: session.id,
                mode: meta.mode(),
                turn_count: session.turn_count,
                reply,
            });
        }

        session.state = state;
        session.record_turn(utterance, &reply.message);
        self.store
            .put(&session)
            .await
            .map_err(|e| DialogError::Store(e.to_string()))?;

        tracing::info!(kind = ?reply.kind, turn = session.turn_count, "turn completed");
        Ok(TurnOutcome {
            trace_id,
            session_id: session.id,
            mode: meta.mode(),
            turn_count: session.turn_count,
            reply,
        })
    }

    /// 后台清理：定期删除过期会话与空闲的会话锁，token 取消时退出
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("session cleanup task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.store.cleanup_expired().await {
                            Ok(0) => {}
                            Ok(n) => tracing::info!("Removed {} expired sessions", n),
                            Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                        }
                        self.locks.prune();
                    }
                }
            }
        })
    }
}

fn new_trace_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::dialogue::ReplyKind;
    use crate::gateway::{EduContext, MemorySessionStore};
    use crate::llm::{LlmError, MockLlmClient};

    fn router_with(llm: MockLlmClient) -> ModeRouter {
        let oracle = LanguageOracle::new(Arc::new(llm), Duration::from_secs(2));
        let edu = EduMachine::new(oracle, LearnerLevel::Advanced, false);
        let kiosk = KioskMachine::new(
            Arc::new(InMemoryCatalog::demo()),
            Arc::new(KeywordOptionInterpreter::new()),
        );
        ModeRouter::new(Arc::new(MemorySessionStore::new(3600)), edu, kiosk, 4)
    }

    #[tokio::test]
    async fn test_creates_and_persists_session() {
        let router = router_with(MockLlmClient::new());
        let meta = MetaEnvelope::kiosk("k-1", None, Some("cafe"));
        let out = router.handle("아메리카노 주세요", &meta).await.unwrap();
        assert_eq!(out.turn_count, 1);
        assert_eq!(out.trace_id.len(), 12);
        assert_eq!(out.reply.kind, ReplyKind::SlotQuestion);

        let stored = router.store().get("k-1").await.unwrap().unwrap();
        assert_eq!(stored.turn_count, 1);
        assert_eq!(stored.history.len(), 2);
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_rejected() {
        let router = router_with(MockLlmClient::new());
        router
            .handle("안녕", &MetaEnvelope::edu("s-1", EduContext::default()))
            .await
            .unwrap();
        let err = router
            .handle("아메리카노", &MetaEnvelope::kiosk("s-1", None, Some("cafe")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DialogError::ModeMismatch {
                stored: "edu".into(),
                requested: "kiosk".into()
            }
        );
        let stored = router.store().get("s-1").await.unwrap().unwrap();
        assert_eq!(stored.mode(), Mode::Edu);
        assert_eq!(stored.turn_count, 1);
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_persisted() {
        let router = router_with(MockLlmClient::failing(LlmError::Timeout(2)));
        let out = router
            .handle("광합성이 뭐야", &MetaEnvelope::edu("s-2", EduContext::default()))
            .await
            .unwrap();
        assert_eq!(out.reply.kind, ReplyKind::Error);
        assert_eq!(out.turn_count, 0);
        assert!(router.store().get("s-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timed_out_turn_commits_nothing() {
        let router = router_with(MockLlmClient::new().with_delay(Duration::from_millis(300)));
        let meta = MetaEnvelope::edu("s-4", EduContext::default());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), router.handle("광합성이 뭐야", &meta)).await;
        assert!(cancelled.is_err());
        assert!(router.store().get("s-4").await.unwrap().is_none());

        let out = tokio::time::timeout(Duration::from_secs(2), router.handle("광합성이 뭐야", &meta))
            .await
            .expect("session lock still held")
            .unwrap();
        assert_eq!(out.turn_count, 1);
        assert_eq!(out.reply.kind, ReplyKind::Explanation);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let router = router_with(MockLlmClient::new());
        router.store().close().await.unwrap();
        let err = router
            .handle("안녕", &MetaEnvelope::edu("s-3", EduContext::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::Store(_)));
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_cancel() {
        let router = Arc::new(router_with(MockLlmClient::new()));
        let token = CancellationToken::new();
        let handle = Arc::clone(&router).spawn_cleanup(Duration::from_millis(10), token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap();
    }
}
