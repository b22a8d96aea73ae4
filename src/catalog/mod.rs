//! 菜单目录：模型、提供者接口、内存 / SQLite 实现与示例菜单

pub mod demo;
pub mod memory;
pub mod model;
pub mod provider;
pub mod sqlite;

use std::sync::Arc;

pub use memory::InMemoryCatalog;
pub use model::{normalize_name, CatalogEntry, CatalogScope, MenuItem, OptionGroup, RecommendationQuery};
pub use provider::{CatalogError, CatalogProvider};
pub use sqlite::SqliteCatalog;

use crate::config::CatalogSection;

/// 按配置创建目录：sqlite_path > menu_file > 内置示例菜单
pub fn create_catalog(cfg: &CatalogSection) -> Result<Arc<dyn CatalogProvider>, CatalogError> {
    if let Some(path) = &cfg.sqlite_path {
        let catalog = SqliteCatalog::open(path)?;
        if cfg.seed_demo && catalog.is_empty()? {
            let n = catalog.insert_items(&demo::demo_entries())?;
            tracing::info!("Seeded {} demo menu items into {:?}", n, path);
        }
        tracing::info!("Using SQLite catalog: {:?}", path);
        return Ok(Arc::new(catalog));
    }
    if let Some(path) = &cfg.menu_file {
        let catalog = InMemoryCatalog::from_toml_file(path)?;
        tracing::info!("Using menu file {:?} ({} items)", path, catalog.len());
        return Ok(Arc::new(catalog));
    }
    tracing::info!("Using built-in demo catalog");
    Ok(Arc::new(InMemoryCatalog::demo()))
}
