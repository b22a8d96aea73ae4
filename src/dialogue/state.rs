//! 两种模式的会话子状态

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogScope;
use crate::llm::ExerciseItem;

/// 教学模式记忆（建议性质，非严格状态机）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EduState {
    pub last_topic: Option<String>,
    pub last_content: Option<String>,
    pub pending_exercise: Option<ExerciseItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    AwaitingOptions,
    Confirmed,
}

/// 购物车中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: String,
    pub display_name: String,
    pub options: BTreeMap<String, String>,
    pub quantity: u32,
    pub status: LineStatus,
    /// 加入时菜单声明的必选项（有序）
    pub required_options: Vec<String>,
    /// 必选项允许的取值，追问与校验时使用
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub option_choices: BTreeMap<String, Vec<String>>,
    pub unit_price: u32,
}

impl LineItem {
    /// 尚未填写的必选项，按声明顺序
    pub fn missing_options(&self) -> Vec<&str> {
        self.required_options
            .iter()
            .filter(|o| !self.options.contains_key(o.as_str()))
            .map(|o| o.as_str())
            .collect()
    }

    /// 该选项的可选值；未声明时不限制
    pub fn choices_for(&self, option: &str) -> Vec<String> {
        self.option_choices.get(option).cloned().unwrap_or_default()
    }

    pub fn accepts(&self, option: &str, value: &str) -> bool {
        self.option_choices
            .get(option)
            .map_or(true, |values| values.iter().any(|v| v == value))
    }
}

/// 等待用户回答的选项（同一时刻至多一个）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSlot {
    /// 目标行在 cart 中的下标
    pub line_index: usize,
    pub option: String,
    /// 允许的取值（提示用）
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KioskState {
    pub cart: Vec<LineItem>,
    pub pending_slot: Option<PendingSlot>,
    /// 最近一次使用的目录范围，后续轮次缺省 store_id / kiosk_type 时沿用
    #[serde(default)]
    pub scope: Option<CatalogScope>,
}

impl KioskState {
    /// 购物车不变式：
    /// - 每行数量 ≥ 1
    /// - 除 pending_slot 目标行之外，所有行已填完必选项且为 confirmed
    /// - pending_slot 指向的行存在、为 awaiting_options 且确实缺少该选项
    pub fn invariants_hold(&self) -> bool {
        let target = self.pending_slot.as_ref().map(|p| p.line_index);
        if let Some(slot) = &self.pending_slot {
            match self.cart.get(slot.line_index) {
                Some(line)
                    if line.status == LineStatus::AwaitingOptions
                        && line.missing_options().contains(&slot.option.as_str()) => {}
                _ => return false,
            }
        }
        self.cart.iter().enumerate().all(|(i, line)| {
            line.quantity >= 1
                && (Some(i) == target
                    || (line.status == LineStatus::Confirmed && line.missing_options().is_empty()))
        })
    }

    pub fn total_price(&self) -> u64 {
        self.cart
            .iter()
            .map(|l| l.unit_price as u64 * l.quantity as u64)
            .sum()
    }
}
