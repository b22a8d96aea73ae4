//! 外部接入：HTTP /api/chat（需 web feature）

#[cfg(feature = "web")]
pub mod http;
