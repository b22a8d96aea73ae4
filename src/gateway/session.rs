//! 会话模型
//!
//! 模式由子状态的变体决定（Edu / Kiosk），因此「子状态类型与模式一致」在类型层面成立。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::meta::Mode;
use crate::dialogue::{EduState, KioskState};
use crate::memory::ConversationMemory;

/// 模式相关的子状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "state", rename_all = "lowercase")]
pub enum SessionState {
    Edu(EduState),
    Kiosk(KioskState),
}

impl SessionState {
    pub fn empty(mode: Mode) -> Self {
        match mode {
            Mode::Edu => SessionState::Edu(EduState::default()),
            Mode::Kiosk => SessionState::Kiosk(KioskState::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            SessionState::Edu(_) => Mode::Edu,
            SessionState::Kiosk(_) => Mode::Kiosk,
        }
    }
}

/// 一个会话：client_session_id 唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub history: ConversationMemory,
    pub state: SessionState,
}

impl Session {
    pub fn new(id: impl Into<String>, mode: Mode, max_context_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turn_count: 0,
            created_at: now,
            last_active_at: now,
            history: ConversationMemory::new(max_context_turns),
            state: SessionState::empty(mode),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    /// 滑动过期：以最后一次成功轮次为起点
    pub fn is_expired(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let ttl = Duration::seconds(ttl_secs.min(i32::MAX as u64) as i64);
        self.last_active_at
            .checked_add_signed(ttl)
            .map_or(false, |deadline| deadline <= now)
    }

    /// 一轮成功结束：计数、时间戳、历史
    pub fn record_turn(&mut self, utterance: &str, reply_message: &str) {
        self.turn_count += 1;
        self.last_active_at = Utc::now();
        self.history.push_turn(utterance, reply_message);
    }
}
