//! 按配置与环境变量选择 LLM 后端，并套上重试包装

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::llm::{
    create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, RetryConfig,
    RetryingLlmClient, DEEPSEEK_CHAT,
};

/// 可选的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Mock,
    DeepSeek,
    OpenAi,
}

/// 显式的 provider 优先；provider 为空时按可用的 Key 依次尝试 DeepSeek、OpenAI。
/// 缺少对应 Key 或 provider 未知时回退 Mock。
fn select_backend(provider: &str, has_deepseek_key: bool, has_openai_key: bool) -> Backend {
    match provider {
        "mock" => Backend::Mock,
        "deepseek" if has_deepseek_key || has_openai_key => Backend::DeepSeek,
        "openai" if has_openai_key => Backend::OpenAi,
        "" if has_deepseek_key => Backend::DeepSeek,
        "" if has_openai_key => Backend::OpenAi,
        _ => Backend::Mock,
    }
}

pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    let backend = select_backend(
        &provider,
        std::env::var("DEEPSEEK_API_KEY").is_ok(),
        std::env::var("OPENAI_API_KEY").is_ok(),
    );

    let base: Arc<dyn LlmClient> = match backend {
        Backend::Mock => {
            if provider == "mock" {
                tracing::info!("Using Mock LLM (configured)");
            } else {
                tracing::warn!("No API key for provider {:?}, using Mock LLM", provider);
            }
            return Arc::new(MockLlmClient::new());
        }
        Backend::DeepSeek => {
            let model = cfg
                .llm
                .deepseek
                .model
                .clone()
                .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
            tracing::info!("Using DeepSeek LLM ({})", model);
            Arc::new(create_deepseek_client(Some(&model)))
        }
        Backend::OpenAi => {
            let model = cfg
                .llm
                .openai
                .model
                .clone()
                .unwrap_or_else(|| cfg.llm.model.clone());
            tracing::info!("Using OpenAI-compatible LLM ({})", model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            ))
        }
    };

    if cfg.llm.max_retries == 0 {
        return base;
    }
    Arc::new(RetryingLlmClient::new(
        base,
        RetryConfig {
            max_retries: cfg.llm.max_retries,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        },
    ))
}
