//! 每轮返回给调用方的结构化回复

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::state::LineItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyKind {
    Explanation,
    Answer,
    Summary,
    Feedback,
    Exercise,
    SlotQuestion,
    OrderConfirmation,
    Recommendation,
    NotFound,
    Error,
}

/// error 回复携带的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    OracleUnavailable,
    ServiceUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub item_id: String,
    pub display_name: String,
    pub price: u32,
}

/// 按回复类型附带的结构化信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyDetail {
    SlotQuestion {
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        /// 正在询问的维度：选项名、quantity 或 item
        slot: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        choices: Vec<String>,
    },
    OrderConfirmation {
        item_id: String,
        quantity: u32,
        options: BTreeMap<String, String>,
    },
    Recommendation {
        items: Vec<Suggestion>,
    },
    NotFound {
        requested: String,
    },
    Feedback {
        correct: Option<bool>,
    },
    Exercise {
        topic: String,
        question: String,
    },
    Failure {
        notice: Notice,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub message: String,
    /// 点餐模式下的购物车快照
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<Vec<LineItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ReplyDetail>,
}

impl Reply {
    pub fn new(kind: ReplyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cart: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: ReplyDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_cart(mut self, cart: &[LineItem]) -> Self {
        self.cart = Some(cart.to_vec());
        self
    }

    pub fn failure(notice: Notice, message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Error, message).with_detail(ReplyDetail::Failure { notice })
    }

    /// 依赖失败的回复：路由层不会持久化这一轮
    pub fn is_failure(&self) -> bool {
        self.kind == ReplyKind::Error
    }

    pub fn notice(&self) -> Option<Notice> {
        match &self.detail {
            Some(ReplyDetail::Failure { notice }) => Some(*notice),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let reply = Reply::new(ReplyKind::SlotQuestion, "뜨거운/아이스 중 어떤 걸로 드릴까요?")
            .with_detail(ReplyDetail::SlotQuestion {
                item_id: Some("cafe:americano".into()),
                slot: "temperature".into(),
                choices: vec!["hot".into(), "iced".into()],
            })
            .with_cart(&[]);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], "slot-question");
        assert_eq!(json["detail"]["type"], "slot_question");
        assert_eq!(json["detail"]["slot"], "temperature");
        assert!(json["cart"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_failure_reply() {
        let reply = Reply::failure(Notice::OracleUnavailable, "x");
        assert!(reply.is_failure());
        assert_eq!(reply.notice(), Some(Notice::OracleUnavailable));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["detail"]["notice"], "oracle_unavailable");
        assert!(json.get("cart").is_none());
    }
}
