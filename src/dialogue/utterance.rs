//! 点餐语句解析：数量、行内选项、菜品短语
//!
//! 「라떼 두 잔 주세요」→ item_phrase = 라떼, quantity = 2。
//! 菜品短语只去掉数量词、选项词和请求语尾，其余原样保留交给目录做精确匹配。

use std::collections::BTreeMap;

use super::slot::{clean_token, is_filler, strip_particle, OptionInterpreter};
use crate::core::DialogError;

const UNITS: &[&str] = &["잔", "개", "컵", "병", "조각", "판", "인분"];

/// 请求语尾：整词或粘在词尾
const REQUEST_SUFFIXES: &[&str] = &[
    "주세요", "주실래요", "줄래요", "줘요", "줘", "할게요", "할께요", "주문할게요", "부탁해요",
    "부탁드려요", "please",
];

/// 会被整体丢弃的词
const DROP_WORDS: &[&str] = &["주문", "좀", "해", "해요", "그리고", "또", "더", "추가", "추가로", "i'd", "like", "a", "an", "one", "can", "i", "have", "get"];

/// 固有词数词（须带单位的短形与可单独出现的长形）
const NATIVE_NUMERALS: &[(&str, u32, bool)] = &[
    ("한", 1, true),
    ("하나", 1, false),
    ("두", 2, true),
    ("둘", 2, false),
    ("세", 3, true),
    ("석", 3, true),
    ("셋", 3, false),
    ("네", 4, true),
    ("넷", 4, false),
    ("다섯", 5, false),
    ("여섯", 6, false),
    ("일곱", 7, false),
    ("여덟", 8, false),
    ("아홉", 9, false),
    ("열", 10, false),
];

/// 明显是「数量」但无法得到正整数的前缀
const BAD_QUANTITY_WORDS: &[&str] = &["영", "공", "몇", "여러", "많이", "zero"];

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// 去掉数量、选项、语尾后的菜品短语（可能为空）
    pub item_phrase: String,
    /// 未提及时为 None（由菜单默认数量决定）
    pub quantity: Option<u32>,
    pub options: BTreeMap<String, String>,
}

enum QuantityToken {
    Valid(u32),
    Invalid(String),
    NotQuantity,
}

fn split_unit(token: &str) -> (&str, bool) {
    for unit in UNITS {
        if let Some(prefix) = token.strip_suffix(unit) {
            return (prefix, true);
        }
    }
    (token, false)
}

/// 「두잔이요」「하나요」这类带助词的数量先去掉助词再判断
fn classify_quantity(token: &str) -> QuantityToken {
    match classify_bare(token) {
        QuantityToken::NotQuantity => {
            let stem = strip_particle(token);
            if stem.len() < token.len() {
                classify_bare(stem)
            } else {
                QuantityToken::NotQuantity
            }
        }
        other => other,
    }
}

fn classify_bare(token: &str) -> QuantityToken {
    let (prefix, has_unit) = split_unit(token);
    if prefix.is_empty() {
        return QuantityToken::NotQuantity;
    }

    let (negative, digits) = match prefix.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, prefix.strip_prefix('+').unwrap_or(prefix)),
    };
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return match digits.parse::<u32>() {
            Ok(n) if !negative && n > 0 => QuantityToken::Valid(n),
            _ => QuantityToken::Invalid(token.to_string()),
        };
    }

    if let Some(&(_, n, needs_unit)) = NATIVE_NUMERALS.iter().find(|(w, _, _)| *w == prefix) {
        if has_unit || !needs_unit {
            return QuantityToken::Valid(n);
        }
        return QuantityToken::NotQuantity;
    }

    if has_unit && BAD_QUANTITY_WORDS.contains(&prefix) {
        return QuantityToken::Invalid(token.to_string());
    }
    QuantityToken::NotQuantity
}

fn strip_request_suffix(token: &str) -> &str {
    for suffix in REQUEST_SUFFIXES {
        if let Some(rest) = token.strip_suffix(suffix) {
            return rest;
        }
    }
    token
}

/// 分词并把「두 잔」「두 잔이요」这类被空格隔开的数量与单位合并
fn tokenize(utterance: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in utterance.split_whitespace() {
        let token = clean_token(raw);
        let token = strip_request_suffix(&token).to_string();
        if token.is_empty() {
            continue;
        }
        if UNITS.contains(&token.as_str()) || UNITS.contains(&strip_particle(&token)) {
            if let Some(prev) = tokens.last_mut() {
                prev.push_str(&token);
                continue;
            }
        }
        tokens.push(token);
    }
    tokens
}

/// 解析点餐语句
///
/// 数量为 0、负数、非数字（몇 잔）或超过 max_quantity 时返回 InvalidQuantity。
pub fn parse_order(
    utterance: &str,
    interpreter: &dyn OptionInterpreter,
    max_quantity: u32,
) -> Result<OrderRequest, DialogError> {
    let mut quantity = None;
    let mut options = BTreeMap::new();
    let mut phrase: Vec<String> = Vec::new();

    for token in tokenize(utterance) {
        match classify_quantity(&token) {
            QuantityToken::Valid(n) if n <= max_quantity => {
                quantity = Some(n);
                continue;
            }
            QuantityToken::Valid(n) => {
                return Err(DialogError::InvalidQuantity(format!(
                    "{} exceeds the limit of {}",
                    n, max_quantity
                )))
            }
            QuantityToken::Invalid(t) => return Err(DialogError::InvalidQuantity(t)),
            QuantityToken::NotQuantity => {}
        }

        if let Some((option, value)) = interpreter.option_token(&token) {
            options.insert(option, value);
            continue;
        }
        let word = strip_particle(&token);
        if is_filler(&token) || DROP_WORDS.contains(&token.as_str()) || DROP_WORDS.contains(&word) {
            continue;
        }
        phrase.push(word.to_string());
    }

    Ok(OrderRequest {
        item_phrase: phrase.join(" "),
        quantity,
        options,
    })
}
