//! 对话状态机：教学（edu）与点餐（kiosk）
//!
//! 两个状态机都是「输入旧状态，输出 (Reply, 新状态)」，不直接读写会话存储；
//! 持久化与并发控制由 gateway::ModeRouter 负责。

pub mod edu;
pub mod intent;
pub mod kiosk;
pub mod recommend;
pub mod reply;
pub mod slot;
pub mod state;
pub mod utterance;

pub use edu::EduMachine;
pub use intent::{extract_concept, EduIntent, EduIntentRecognizer};
pub use kiosk::KioskMachine;
pub use recommend::detect_recommendation;
pub use reply::{Notice, Reply, ReplyDetail, ReplyKind, Suggestion};
pub use slot::{slot_question, KeywordOptionInterpreter, OptionInterpreter};
pub use state::{EduState, KioskState, LineItem, LineStatus, PendingSlot};
pub use utterance::{parse_order, OrderRequest};
