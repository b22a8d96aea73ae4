//! 核心层：错误类型、优雅关闭

pub mod error;
pub mod shutdown;

pub use error::DialogError;
pub use shutdown::{
    run_with_graceful_shutdown, SessionStoreCleanup, ShutdownCleanup, ShutdownCoordinator,
    ShutdownManager, ShutdownReason,
};
