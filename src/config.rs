//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HUB__*` 覆盖（双下划线表示嵌套，如 `HUB__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub session: SessionSection,
    pub catalog: CatalogSection,
    pub kiosk: KioskSection,
    pub edu: EduSection,
    pub web: WebSection,
}

/// [app] 段：应用名、会话历史保留轮数
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 每个会话保留的对话轮数（作为 Oracle 上下文）
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_max_context_turns() -> usize {
    10
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：mock / openai / deepseek；无 API Key 时回退到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
    /// 失败后的额外重试次数（不含首次调用）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 Oracle 调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    25
}

/// [session] 段：会话存活时间（滑动）、清理间隔、持久化路径
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// 设置后使用 SQLite 持久化会话（需 async-sqlite feature）
    pub db_path: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            db_path: None,
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    6 * 60 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

/// [catalog] 段：菜单来源（SQLite > TOML 文件 > 内置示例菜单）
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSection {
    pub sqlite_path: Option<PathBuf>,
    pub menu_file: Option<PathBuf>,
    /// SQLite 表为空时写入示例菜单
    #[serde(default = "default_true")]
    pub seed_demo: bool,
    /// 单次目录查询超时（秒）
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            menu_file: None,
            seed_demo: true,
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_catalog_timeout_secs() -> u64 {
    5
}

/// [kiosk] 段：数量上限、推荐条数
#[derive(Debug, Clone, Deserialize)]
pub struct KioskSection {
    #[serde(default = "default_max_quantity")]
    pub max_quantity: u32,
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,
}

impl Default for KioskSection {
    fn default() -> Self {
        Self {
            max_quantity: default_max_quantity(),
            recommendation_limit: default_recommendation_limit(),
        }
    }
}

fn default_max_quantity() -> u32 {
    20
}

fn default_recommendation_limit() -> usize {
    3
}

/// [edu] 段：默认学习者水平、是否用 LLM 辅助判断概念提问
#[derive(Debug, Clone, Deserialize)]
pub struct EduSection {
    #[serde(default = "default_level")]
    pub default_level: String,
    #[serde(default)]
    pub llm_intent_fallback: bool,
}

impl Default for EduSection {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            llm_intent_fallback: false,
        }
    }
}

fn default_level() -> String {
    "advanced".to_string()
}

/// [web] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// 从 config 目录加载配置，环境变量 HUB__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HUB__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HUB")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.ttl_secs, 21600);
        assert_eq!(cfg.kiosk.max_quantity, 20);
        assert_eq!(cfg.edu.default_level, "advanced");
        assert_eq!(cfg.llm.timeouts.request, 25);
        assert!(cfg.catalog.seed_demo);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[kiosk]\nmax_quantity = 5\n\n[session]\nttl_secs = 120\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.kiosk.max_quantity, 5);
        assert_eq!(cfg.session.ttl_secs, 120);
        assert_eq!(cfg.kiosk.recommendation_limit, 3);
    }
}
