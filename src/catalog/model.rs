//! 菜单数据模型与各实现共用的匹配 / 推荐排序逻辑

use serde::{Deserialize, Serialize};

/// 选项组：如 temperature = [hot, iced]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub name: String,
    pub values: Vec<String>,
    /// 非必选组的默认值；必选组即使配置了 default 也不会被自动填入
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// 可点的菜单项（只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub item_id: String,
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// 按菜单声明顺序排列
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
    /// 必选项，按声明顺序逐个询问
    #[serde(default)]
    pub required_options: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_currency() -> String {
    "KRW".to_string()
}

fn default_available() -> bool {
    true
}

impl MenuItem {
    pub fn default_quantity(&self) -> u32 {
        1
    }

    pub fn option_group(&self, name: &str) -> Option<&OptionGroup> {
        self.option_groups.iter().find(|g| g.name == name)
    }

    pub fn is_required(&self, option: &str) -> bool {
        self.required_options.iter().any(|o| o == option)
    }

    /// 名称匹配：显示名或别名，忽略大小写与空白；不做子串匹配
    pub fn matches_name(&self, phrase: &str) -> bool {
        let wanted = normalize_name(phrase);
        if wanted.is_empty() {
            return false;
        }
        std::iter::once(&self.display_name)
            .chain(self.aliases.iter())
            .any(|n| normalize_name(n) == wanted)
    }

    /// temperature 组包含该值
    pub fn supports_temperature(&self, value: &str) -> bool {
        self.option_group("temperature")
            .map(|g| g.values.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

pub fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 目录范围：门店 + 终端类型（cafe / fastfood / ...）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogScope {
    pub store_id: Option<String>,
    pub kiosk_type: String,
}

impl CatalogScope {
    pub fn new(store_id: Option<&str>, kiosk_type: &str) -> Self {
        Self {
            store_id: store_id.map(String::from),
            kiosk_type: kiosk_type.to_string(),
        }
    }

    /// 条目的 store_id 为 None 表示所有门店通用
    pub fn covers(&self, kiosk_type: &str, store_id: Option<&str>) -> bool {
        if !self.kiosk_type.eq_ignore_ascii_case(kiosk_type) {
            return false;
        }
        match (self.store_id.as_deref(), store_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

/// 带范围的目录条目（内存目录、TOML 菜单文件、SQLite 行共用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kiosk_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(flatten)]
    pub item: MenuItem,
}

/// 推荐查询（由用户语句中的属性词推出）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub temperature: Option<String>,
    pub max_price: Option<u32>,
    pub limit: usize,
}

/// 在候选集合中按名称找唯一匹配（同名取第一个可售项）
pub fn match_by_name<'a>(items: impl IntoIterator<Item = &'a MenuItem>, phrase: &str) -> Option<MenuItem> {
    items
        .into_iter()
        .find(|item| item.available && item.matches_name(phrase))
        .cloned()
}

/// 过滤并排序推荐：popular 优先，其次价格升序，再按 item_id 保证稳定
pub fn rank_recommendations<'a>(
    items: impl IntoIterator<Item = &'a MenuItem>,
    query: &RecommendationQuery,
) -> Vec<MenuItem> {
    let mut hits: Vec<MenuItem> = items
        .into_iter()
        .filter(|item| item.available)
        .filter(|item| {
            query
                .category
                .as_deref()
                .map_or(true, |c| item.category.eq_ignore_ascii_case(c))
        })
        .filter(|item| query.tags.iter().all(|t| item.has_tag(t)))
        .filter(|item| {
            query
                .temperature
                .as_deref()
                .map_or(true, |t| item.supports_temperature(t))
        })
        .filter(|item| query.max_price.map_or(true, |max| item.price <= max))
        .cloned()
        .collect();

    hits.sort_by(|a, b| {
        b.has_tag("popular")
            .cmp(&a.has_tag("popular"))
            .then(a.price.cmp(&b.price))
            .then(a.item_id.cmp(&b.item_id))
    });
    if query.limit > 0 {
        hits.truncate(query.limit);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, price: u32, tags: &[&str]) -> MenuItem {
        MenuItem {
            item_id: id.into(),
            display_name: name.into(),
            aliases: vec![],
            category: "coffee".into(),
            price,
            currency: "KRW".into(),
            option_groups: vec![],
            required_options: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            available: true,
        }
    }

    #[test]
    fn test_name_match_ignores_spacing_and_case() {
        let mut latte = item("latte", "카페라떼", 5000, &[]);
        latte.aliases = vec!["Latte".into()];
        assert!(latte.matches_name("카페 라떼"));
        assert!(latte.matches_name("latte"));
        assert!(!latte.matches_name("라떼라떼"));
        assert!(!latte.matches_name("  "));
    }

    #[test]
    fn test_no_substring_substitution() {
        let items = vec![item("cold_brew", "콜드브루", 5000, &[])];
        assert!(match_by_name(&items, "콜드브루 말차").is_none());
        assert!(match_by_name(&items, "콜드브루").is_some());
    }

    #[test]
    fn test_rank_popular_then_price() {
        let items = vec![
            item("a", "A", 3000, &["sweet"]),
            item("b", "B", 6000, &["sweet", "popular"]),
            item("c", "C", 2000, &[]),
            item("d", "D", 4000, &["sweet"]),
        ];
        let query = RecommendationQuery {
            tags: vec!["sweet".into()],
            limit: 2,
            ..Default::default()
        };
        let ids: Vec<_> = rank_recommendations(&items, &query)
            .into_iter()
            .map(|i| i.item_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_scope_covers() {
        let scope = CatalogScope::new(Some("store_01"), "cafe");
        assert!(scope.covers("CAFE", None));
        assert!(scope.covers("cafe", Some("store_01")));
        assert!(!scope.covers("cafe", Some("store_02")));
        assert!(!scope.covers("fastfood", None));
    }
}
