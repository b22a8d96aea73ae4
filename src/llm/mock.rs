//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 默认回显最后一条 User 消息；可预置脚本化响应、固定失败或人为延迟，便于测试超时与重试。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fail_with: Option<LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// 回显模式
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回预置结果，用完后回到回显模式
    pub fn scripted(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// 每次调用都返回同一个错误
    pub fn failing(err: LlmError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    /// 每次调用前先等待 delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已被调用的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_scripted(&self) -> Option<Result<String, LlmError>> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        if let Some(next) = self.next_scripted() {
            return next;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Mock: {}", last_user))
    }
}
