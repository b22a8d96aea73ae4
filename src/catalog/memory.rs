//! 内存目录：示例菜单或 TOML 菜单文件

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::demo::demo_entries;
use super::model::{match_by_name, rank_recommendations, CatalogEntry, CatalogScope, MenuItem, RecommendationQuery};
use super::provider::{CatalogError, CatalogProvider};

/// TOML 菜单文件：
///
/// ```toml
/// [[items]]
/// kiosk_type = "cafe"
/// item_id = "cafe:americano"
/// display_name = "아메리카노"
/// required_options = ["temperature"]
/// option_groups = [{ name = "temperature", values = ["hot", "iced"] }]
/// ```
#[derive(Debug, Deserialize)]
struct MenuFile {
    #[serde(default)]
    items: Vec<CatalogEntry>,
}

pub struct InMemoryCatalog {
    entries: Vec<CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn demo() -> Self {
        Self::new(demo_entries())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let file: MenuFile =
            toml::from_str(text).map_err(|e| CatalogError::Storage(format!("menu file: {}", e)))?;
        Ok(Self::new(file.items))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CatalogError::Storage(format!("read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn in_scope<'a>(&'a self, scope: &'a CatalogScope) -> impl Iterator<Item = &'a MenuItem> + 'a {
        self.entries
            .iter()
            .filter(move |e| scope.covers(&e.kiosk_type, e.store_id.as_deref()))
            .map(|e| &e.item)
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn find_by_name(
        &self,
        scope: &CatalogScope,
        phrase: &str,
    ) -> Result<Option<MenuItem>, CatalogError> {
        Ok(match_by_name(self.in_scope(scope), phrase))
    }

    async fn recommend(
        &self,
        scope: &CatalogScope,
        query: &RecommendationQuery,
    ) -> Result<Vec<MenuItem>, CatalogError> {
        Ok(rank_recommendations(self.in_scope(scope), query))
    }
}
