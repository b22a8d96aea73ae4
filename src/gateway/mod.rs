//! 会话网关
//!
//! - **meta**: 元数据信封（线上稀疏字段 → 按模式区分的类型化记录）
//! - **session / session_store**: 会话模型与存储（内存 / SQLite）
//! - **lock**: 会话级互斥，同一会话的轮次串行
//! - **router**: ModeRouter，加载会话、分派状态机、持久化

mod lock;
mod meta;
#[cfg(feature = "async-sqlite")]
mod persistent_session;
mod router;
mod session;
mod session_store;

pub use lock::SessionLocks;
pub use meta::{EduContext, KioskContext, MetaEnvelope, Mode, ModeContext, RawMeta};
#[cfg(feature = "async-sqlite")]
pub use persistent_session::PersistentSessionStore;
pub use router::{ModeRouter, TurnOutcome};
pub use session::{Session, SessionState};
pub use session_store::{create_session_store, MemorySessionStore, SessionStore, StoreError};
