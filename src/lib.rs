//! dialog-hub - 多轮对话会话管理器
//!
//! 一个 `/api/chat` 端点承载两种模式：教学问答（edu）与点餐终端（kiosk）。
//!
//! 模块划分：
//! - **catalog**: 菜单目录（内存 / TOML 文件 / SQLite）与推荐排序
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、优雅关闭
//! - **dialogue**: 教学与点餐两个对话状态机
//! - **gateway**: 元数据信封、会话存储、会话锁、ModeRouter
//! - **integrations**: HTTP 接口（web feature）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）及 LanguageOracle
//! - **memory**: 会话内对话历史
//! - **observability**: tracing 初始化

pub mod catalog;
pub mod config;
pub mod core;
pub mod dialogue;
pub mod gateway;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;

pub use gateway::{MetaEnvelope, Mode, ModeRouter, TurnOutcome};
