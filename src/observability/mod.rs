//! 可观测性：tracing 日志初始化
//!
//! 过滤规则取 RUST_LOG，未设置时使用传入的默认级别；日志写到 stderr，不干扰控制台对话输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with_default("info");
}

/// 重复初始化（如测试中多次调用）时静默忽略
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
