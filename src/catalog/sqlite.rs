//! SQLite 目录（rusqlite，同步连接放在 spawn_blocking 中使用）
//!
//! 选项组、必选项、别名、标签以 JSON 列存储。required_option_groups_json 为 NULL 的旧数据：
//! 若有 temperature 组则视为 temperature 必选。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::model::{
    match_by_name, rank_recommendations, CatalogEntry, CatalogScope, MenuItem, OptionGroup,
    RecommendationQuery,
};
use super::provider::{CatalogError, CatalogProvider};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS menu_items (
    kiosk_type TEXT NOT NULL,
    store_id TEXT NOT NULL DEFAULT '',
    item_id TEXT NOT NULL,
    name TEXT NOT NULL,
    aliases_json TEXT NOT NULL DEFAULT '[]',
    category TEXT NOT NULL DEFAULT '',
    price INTEGER NOT NULL DEFAULT 0,
    currency TEXT NOT NULL DEFAULT 'KRW',
    option_groups_json TEXT NOT NULL DEFAULT '[]',
    required_option_groups_json TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    available INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (kiosk_type, store_id, item_id)
);
CREATE INDEX IF NOT EXISTS idx_menu_items_scope ON menu_items(kiosk_type, store_id);
"#;

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Storage(e.to_string())
    }
}

fn json_err(e: serde_json::Error) -> CatalogError {
    CatalogError::Storage(format!("bad json column: {}", e))
}

#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Storage("catalog connection poisoned".to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM menu_items", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// 写入（或覆盖）条目，返回写入条数
    pub fn insert_items(&self, entries: &[CatalogEntry]) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO menu_items
                 (kiosk_type, store_id, item_id, name, aliases_json, category, price, currency,
                  option_groups_json, required_option_groups_json, tags_json, available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for entry in entries {
                let item = &entry.item;
                stmt.execute(params![
                    entry.kiosk_type,
                    entry.store_id.as_deref().unwrap_or(""),
                    item.item_id,
                    item.display_name,
                    serde_json::to_string(&item.aliases).map_err(json_err)?,
                    item.category,
                    item.price,
                    item.currency,
                    serde_json::to_string(&item.option_groups).map_err(json_err)?,
                    serde_json::to_string(&item.required_options).map_err(json_err)?,
                    serde_json::to_string(&item.tags).map_err(json_err)?,
                    item.available,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    async fn load_scope(&self, scope: &CatalogScope) -> Result<Vec<MenuItem>, CatalogError> {
        let this = self.clone();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || {
            let conn = this.lock()?;
            load_scope(&conn, &scope)
        })
        .await
        .map_err(|e| CatalogError::Unavailable(format!("catalog task failed: {}", e)))?
    }
}

struct RawRow {
    item_id: String,
    name: String,
    aliases_json: String,
    category: String,
    price: u32,
    currency: String,
    option_groups_json: String,
    required_json: Option<String>,
    tags_json: String,
    available: bool,
}

fn load_scope(conn: &Connection, scope: &CatalogScope) -> Result<Vec<MenuItem>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT item_id, name, aliases_json, category, price, currency, option_groups_json,
                required_option_groups_json, tags_json, available
         FROM menu_items
         WHERE kiosk_type = ?1 COLLATE NOCASE
           AND (?2 = '' OR store_id = '' OR store_id = ?2)
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map(
        params![scope.kiosk_type, scope.store_id.as_deref().unwrap_or("")],
        |row| {
            Ok(RawRow {
                item_id: row.get(0)?,
                name: row.get(1)?,
                aliases_json: row.get(2)?,
                category: row.get(3)?,
                price: row.get(4)?,
                currency: row.get(5)?,
                option_groups_json: row.get(6)?,
                required_json: row.get(7)?,
                tags_json: row.get(8)?,
                available: row.get(9)?,
            })
        },
    )?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row_to_item(row?)?);
    }
    Ok(items)
}

fn row_to_item(row: RawRow) -> Result<MenuItem, CatalogError> {
    let option_groups: Vec<OptionGroup> =
        serde_json::from_str(&row.option_groups_json).map_err(json_err)?;
    let required_options = match row.required_json {
        Some(json) => serde_json::from_str(&json).map_err(json_err)?,
        None if option_groups.iter().any(|g| g.name == "temperature") => {
            vec!["temperature".to_string()]
        }
        None => Vec::new(),
    };
    Ok(MenuItem {
        item_id: row.item_id,
        display_name: row.name,
        aliases: serde_json::from_str(&row.aliases_json).map_err(json_err)?,
        category: row.category,
        price: row.price,
        currency: row.currency,
        option_groups,
        required_options,
        tags: serde_json::from_str(&row.tags_json).map_err(json_err)?,
        available: row.available,
    })
}

#[async_trait]
impl CatalogProvider for SqliteCatalog {
    async fn find_by_name(
        &self,
        scope: &CatalogScope,
        phrase: &str,
    ) -> Result<Option<MenuItem>, CatalogError> {
        let items = self.load_scope(scope).await?;
        Ok(match_by_name(&items, phrase))
    }

    async fn recommend(
        &self,
        scope: &CatalogScope,
        query: &RecommendationQuery,
    ) -> Result<Vec<MenuItem>, CatalogError> {
        let items = self.load_scope(scope).await?;
        Ok(rank_recommendations(&items, query))
    }
}
