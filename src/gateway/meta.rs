//! 元数据信封
//!
//! 线上的 meta 是一个稀疏的可选字段集合；这里把它解析为带标签的类型化记录，
//! 每种模式只认自己的字段，缺失或多余字段在进入状态机之前就已确定。

use serde::{Deserialize, Serialize};

use crate::core::DialogError;
use crate::llm::LearnerLevel;

/// 对话模式，会话首次出现时确定，之后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Edu,
    Kiosk,
}

impl Mode {
    pub fn parse(s: &str) -> Result<Self, DialogError> {
        match s.trim().to_lowercase().as_str() {
            "edu" | "education" => Ok(Mode::Edu),
            "kiosk" => Ok(Mode::Kiosk),
            "" => Err(DialogError::InvalidMode("mode is required".to_string())),
            other => Err(DialogError::InvalidMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Edu => "edu",
            Mode::Kiosk => "kiosk",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 线上 meta 原样结构（全部可选）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMeta {
    #[serde(default)]
    pub client_session_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub user_level: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub student_answer: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub kiosk_type: Option<String>,
}

/// 教学模式字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EduContext {
    pub content: Option<String>,
    pub student_answer: Option<String>,
    pub topic: Option<String>,
    pub level: Option<LearnerLevel>,
}

/// 点餐模式字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KioskContext {
    pub store_id: Option<String>,
    pub kiosk_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeContext {
    Edu(EduContext),
    Kiosk(KioskContext),
}

impl ModeContext {
    pub fn mode(&self) -> Mode {
        match self {
            ModeContext::Edu(_) => Mode::Edu,
            ModeContext::Kiosk(_) => Mode::Kiosk,
        }
    }
}

/// 解析后的信封
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEnvelope {
    pub client_session_id: String,
    /// 展示提示，核心逻辑不使用
    pub device_type: Option<String>,
    pub context: ModeContext,
}

impl MetaEnvelope {
    pub fn mode(&self) -> Mode {
        self.context.mode()
    }

    pub fn edu(session_id: impl Into<String>, ctx: EduContext) -> Self {
        Self {
            client_session_id: session_id.into(),
            device_type: None,
            context: ModeContext::Edu(ctx),
        }
    }

    pub fn kiosk(session_id: impl Into<String>, store_id: Option<&str>, kiosk_type: Option<&str>) -> Self {
        Self {
            client_session_id: session_id.into(),
            device_type: None,
            context: ModeContext::Kiosk(KioskContext {
                store_id: store_id.map(String::from),
                kiosk_type: kiosk_type.map(String::from),
            }),
        }
    }
}

/// 空白字符串视为未提供
fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl TryFrom<RawMeta> for MetaEnvelope {
    type Error = DialogError;

    fn try_from(raw: RawMeta) -> Result<Self, Self::Error> {
        let client_session_id = non_blank(raw.client_session_id)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                DialogError::MalformedEnvelope("meta.client_session_id is required".to_string())
            })?;

        let mode = Mode::parse(raw.mode.as_deref().unwrap_or(""))?;

        let context = match mode {
            Mode::Edu => ModeContext::Edu(EduContext {
                content: non_blank(raw.content),
                student_answer: non_blank(raw.student_answer),
                topic: non_blank(raw.topic),
                level: raw.user_level.as_deref().and_then(LearnerLevel::parse),
            }),
            Mode::Kiosk => ModeContext::Kiosk(KioskContext {
                store_id: non_blank(raw.store_id),
                kiosk_type: non_blank(raw.kiosk_type).map(|k| k.trim().to_lowercase()),
            }),
        };

        Ok(Self {
            client_session_id,
            device_type: non_blank(raw.device_type),
            context,
        })
    }
}
