//! 推荐请求识别
//!
//! 「달달한 거 추천해줘」「something sweet」这类语句不是具体菜品，而是属性描述；
//! 识别出来后转成 RecommendationQuery 交给目录查询。

use std::sync::OnceLock;

use regex::Regex;

use super::slot::clean_token;
use crate::catalog::RecommendationQuery;

const TRIGGERS: &[&str] = &[
    "추천", "recommend", "뭐가좋", "뭐가맛있", "뭐있", "골라", "아무거나", "something", "anything",
    "suggest",
];

/// 「~한 거」里的泛指名词
const GENERIC_NOUNS: &[&str] = &["거", "걸", "것", "거로", "걸로", "메뉴", "음료", "drink"];

/// 属性词 → 查询条件
enum Attr {
    Tag(&'static str),
    Category(&'static str),
    Temperature(&'static str),
}

const ATTRIBUTES: &[(&str, Attr)] = &[
    ("달달한", Attr::Tag("sweet")),
    ("달콤한", Attr::Tag("sweet")),
    ("단", Attr::Tag("sweet")),
    ("단거", Attr::Tag("sweet")),
    ("달달", Attr::Tag("sweet")),
    ("sweet", Attr::Tag("sweet")),
    ("상큼한", Attr::Tag("refreshing")),
    ("refreshing", Attr::Tag("refreshing")),
    ("인기", Attr::Tag("popular")),
    ("인기있는", Attr::Tag("popular")),
    ("잘나가는", Attr::Tag("popular")),
    ("베스트", Attr::Tag("popular")),
    ("popular", Attr::Tag("popular")),
    ("우유", Attr::Tag("milk")),
    ("커피", Attr::Category("coffee")),
    ("coffee", Attr::Category("coffee")),
    ("디저트", Attr::Category("dessert")),
    ("케이크", Attr::Category("dessert")),
    ("빵", Attr::Category("dessert")),
    ("dessert", Attr::Category("dessert")),
    ("티", Attr::Category("tea")),
    ("tea", Attr::Category("tea")),
    ("시원한", Attr::Temperature("iced")),
    ("차가운", Attr::Temperature("iced")),
    ("cold", Attr::Temperature("iced")),
    ("따뜻한", Attr::Temperature("hot")),
    ("뜨거운", Attr::Temperature("hot")),
    ("warm", Attr::Temperature("hot")),
];

fn budget_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<num>\d+)\s*(?P<unit>천\s*원|천|원)\s*(?:이하|아래|미만|까지|안쪽|대)").ok()
    })
    .as_ref()
}

/// 从「5000원 이하」「5천원까지」中取预算上限
fn parse_budget(utterance: &str) -> Option<u32> {
    let caps = budget_re()?.captures(utterance)?;
    let n: u32 = caps["num"].parse().ok()?;
    if caps["unit"].starts_with('천') {
        n.checked_mul(1000)
    } else {
        Some(n)
    }
}

/// 识别推荐请求；不是推荐时返回 None。limit 由调用方填入。
pub fn detect_recommendation(utterance: &str) -> Option<RecommendationQuery> {
    let compact: String = utterance
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect();
    let tokens: Vec<String> = utterance
        .split_whitespace()
        .map(clean_token)
        .filter(|t| !t.is_empty())
        .collect();

    let mut query = RecommendationQuery::default();
    let mut has_attr = false;
    for token in &tokens {
        for (word, attr) in ATTRIBUTES {
            if token == word || token.strip_suffix('로').map_or(false, |t| t == *word) {
                has_attr = true;
                match attr {
                    Attr::Tag(t) => {
                        if !query.tags.iter().any(|x| x == t) {
                            query.tags.push(t.to_string());
                        }
                    }
                    Attr::Category(c) => query.category = Some(c.to_string()),
                    Attr::Temperature(t) => query.temperature = Some(t.to_string()),
                }
            }
        }
    }
    query.max_price = parse_budget(utterance);

    let triggered = TRIGGERS.iter().any(|t| compact.contains(t));
    let generic = tokens
        .iter()
        .any(|t| GENERIC_NOUNS.contains(&t.as_str()));

    if triggered || (generic && (has_attr || query.max_price.is_some())) {
        Some(query)
    } else {
        None
    }
}
