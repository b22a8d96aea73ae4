//! 对话错误类型
//!
//! 信封错误（MalformedEnvelope / InvalidMode / ModeMismatch）在进入状态机之前返回给调用方；
//! 其余错误在状态机边界被转换为 Reply（error / not-found / slot-question），不会以传输层错误形式外泄。

use thiserror::Error;

/// 一轮对话中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// 会话已确定的模式与本次请求不一致
    #[error("Mode mismatch: session is {stored}, request is {requested}")]
    ModeMismatch { stored: String, requested: String },

    /// 数量无法解析、为 0 / 负数或超过上限
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Catalog item not found: {0}")]
    CatalogNotFound(String),

    #[error("Language oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Session store error: {0}")]
    Store(String),
}

impl DialogError {
    /// 是否属于「请求本身有误」（对应 HTTP 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DialogError::MalformedEnvelope(_)
                | DialogError::InvalidMode(_)
                | DialogError::ModeMismatch { .. }
        )
    }
}
