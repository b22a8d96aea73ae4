//! 目录提供者抽象
//!
//! 状态机只依赖这一接口；内存、TOML 文件、SQLite 三种实现可互换。

use async_trait::async_trait;
use thiserror::Error;

use super::model::{CatalogScope, MenuItem, RecommendationQuery};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// 后端暂时不可用（超时、连接失败），可重试
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// 数据或存储层错误
    #[error("Catalog storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// 按名称（显示名 / 别名）在范围内查找；找不到返回 Ok(None)
    async fn find_by_name(
        &self,
        scope: &CatalogScope,
        phrase: &str,
    ) -> Result<Option<MenuItem>, CatalogError>;

    /// 推荐查询，结果已排序并截断到 query.limit
    async fn recommend(
        &self,
        scope: &CatalogScope,
        query: &RecommendationQuery,
    ) -> Result<Vec<MenuItem>, CatalogError>;
}
