//! 内置示例菜单（카페）
//!
//! 无 menu_file / sqlite_path 时使用，也用于初始化空的 SQLite 目录。

use super::model::{CatalogEntry, MenuItem, OptionGroup};

fn temperature(values: &[&str], default: Option<&str>) -> OptionGroup {
    OptionGroup {
        name: "temperature".to_string(),
        values: values.iter().map(|v| v.to_string()).collect(),
        default: default.map(String::from),
    }
}

fn size() -> OptionGroup {
    OptionGroup {
        name: "size".to_string(),
        values: vec!["S".into(), "M".into(), "L".into()],
        default: Some("M".to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cafe_item(
    code: &str,
    name: &str,
    aliases: &[&str],
    category: &str,
    price: u32,
    option_groups: Vec<OptionGroup>,
    required: &[&str],
    tags: &[&str],
) -> CatalogEntry {
    CatalogEntry {
        kiosk_type: "cafe".to_string(),
        store_id: None,
        item: MenuItem {
            item_id: format!("cafe:{}", code),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            category: category.to_string(),
            price,
            currency: "KRW".to_string(),
            option_groups,
            required_options: required.iter().map(|r| r.to_string()).collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            available: true,
        },
    }
}

/// 示例菜单：全部门店通用（store_id = None）
pub fn demo_entries() -> Vec<CatalogEntry> {
    let hot_iced = ["hot", "iced"];
    vec![
        cafe_item(
            "americano",
            "아메리카노",
            &["americano", "아메리카노커피"],
            "coffee",
            4500,
            vec![temperature(&hot_iced, None), size()],
            &["temperature"],
            &["coffee", "popular"],
        ),
        cafe_item(
            "cafe_latte",
            "카페라떼",
            &["라떼", "latte", "cafe latte"],
            "coffee",
            5000,
            vec![temperature(&hot_iced, Some("hot")), size()],
            &[],
            &["coffee", "milk", "popular"],
        ),
        cafe_item(
            "vanilla_latte",
            "바닐라라떼",
            &["vanilla latte"],
            "coffee",
            5500,
            vec![temperature(&hot_iced, None), size()],
            &["temperature", "size"],
            &["coffee", "milk", "sweet"],
        ),
        cafe_item(
            "caramel_macchiato",
            "카라멜마키아또",
            &["마키아또", "caramel macchiato"],
            "coffee",
            5900,
            vec![temperature(&hot_iced, None), size()],
            &["temperature"],
            &["coffee", "sweet", "popular"],
        ),
        cafe_item(
            "cold_brew",
            "콜드브루",
            &["cold brew"],
            "coffee",
            5000,
            vec![temperature(&["iced"], Some("iced")), size()],
            &[],
            &["coffee", "cold"],
        ),
        cafe_item(
            "green_tea",
            "녹차",
            &["그린티", "green tea"],
            "tea",
            4500,
            vec![temperature(&hot_iced, None)],
            &["temperature"],
            &["tea"],
        ),
        cafe_item(
            "lemonade",
            "레몬에이드",
            &["lemonade"],
            "ade",
            5500,
            vec![temperature(&["iced"], Some("iced"))],
            &[],
            &["sweet", "cold", "refreshing"],
        ),
        cafe_item(
            "choco_latte",
            "초코라떼",
            &["핫초코", "chocolate latte"],
            "non-coffee",
            5200,
            vec![temperature(&hot_iced, None)],
            &["temperature"],
            &["sweet", "milk"],
        ),
        cafe_item(
            "cheesecake",
            "치즈케이크",
            &["cheesecake"],
            "dessert",
            6000,
            vec![],
            &[],
            &["sweet", "dessert"],
        ),
        cafe_item(
            "croissant",
            "크루아상",
            &["크로와상", "croissant"],
            "dessert",
            3800,
            vec![],
            &[],
            &["dessert", "bakery"],
        ),
    ]
}
