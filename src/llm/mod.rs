//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），以及对话状态机使用的 LanguageOracle

pub mod deepseek;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod oracle;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use factory::create_llm_from_config;
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use oracle::{ExerciseItem, GradeResult, LanguageOracle, LearnerLevel, OracleRequest};
pub use traits::{LlmClient, LlmError, RetryConfig, RetryingLlmClient};
