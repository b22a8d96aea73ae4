//! 选项槽位：识别选项值、判断一句话是否是对待填选项的回答、生成追问
//!
//! OptionInterpreter 是可替换的判定策略；状态机只关心「是 / 不是选项回答」以及识别出的值。

use std::collections::BTreeMap;

use super::state::PendingSlot;

/// 选项值识别策略
pub trait OptionInterpreter: Send + Sync {
    /// 单个词对应的 (选项名, 规范值)
    fn option_token(&self, token: &str) -> Option<(String, String)>;

    /// 整句作为待填选项的回答；句中出现选项词与语气词以外的内容时返回 None。
    /// 返回的映射必然包含 slot.option。
    fn interpret_answer(&self, utterance: &str, slot: &PendingSlot) -> Option<BTreeMap<String, String>>;
}

/// 选项词典中的一项
struct LexiconEntry {
    option: &'static str,
    value: &'static str,
    words: &'static [&'static str],
}

const LEXICON: &[LexiconEntry] = &[
    LexiconEntry {
        option: "temperature",
        value: "hot",
        words: &[
            "hot", "핫", "뜨거운", "뜨겁게", "뜨거운거", "따뜻한", "따뜻하게", "따뜻한거", "따듯한",
            "따듯하게",
        ],
    },
    LexiconEntry {
        option: "temperature",
        value: "iced",
        words: &[
            "iced", "ice", "아이스", "차가운", "차갑게", "차가운거", "시원한", "시원하게", "시원한거",
            "찬",
        ],
    },
    LexiconEntry {
        option: "size",
        value: "S",
        words: &["s", "small", "tall", "스몰", "톨", "작은", "작은거", "작게"],
    },
    LexiconEntry {
        option: "size",
        value: "M",
        words: &["m", "medium", "grande", "미디엄", "그란데", "중간", "보통"],
    },
    LexiconEntry {
        option: "size",
        value: "L",
        words: &["l", "large", "venti", "라지", "벤티", "큰", "큰거", "크게"],
    },
];

/// 助词 / 语气后缀（按长度降序尝试）
const PARTICLES: &[&str] = &["으로요", "로요", "으로", "이요", "로", "요", "를", "을"];

/// 回答中可忽略的语气词
const FILLERS: &[&str] = &[
    "걸로", "걸로요", "거로", "거로요", "것으로", "것으로요", "거요", "거", "걸", "것", "주세요",
    "줘", "줘요", "할게요", "해주세요", "해줘", "해줘요", "부탁해요", "부탁드려요", "네", "예",
    "please", "로", "으로", "요", "로요", "으로요", "그냥", "음", "저는",
];

/// 去掉首尾标点并转小写；保留开头的正负号
pub fn clean_token(token: &str) -> String {
    let is_noise = |c: char| c.is_ascii_punctuation() || c == '~' || c == '…';
    token
        .trim_end_matches(is_noise)
        .trim_start_matches(|c: char| is_noise(c) && c != '-' && c != '+')
        .to_lowercase()
}

pub fn is_filler(token: &str) -> bool {
    FILLERS.contains(&token)
}

/// 韩文音节的收音序号（0 表示无收音）；非韩文音节返回 None
pub fn final_consonant(c: char) -> Option<u32> {
    let code = c as u32;
    (0xAC00..=0xD7A3).contains(&code).then(|| (code - 0xAC00) % 28)
}

/// 收音序号 8 是 ㄹ
const FINAL_RIEUL: u32 = 8;

fn particle_fits(particle: &str, stem: &str) -> bool {
    let Some(last) = stem.chars().last() else {
        return false;
    };
    let Some(jong) = final_consonant(last) else {
        return true;
    };
    match particle {
        "으로요" | "으로" => jong != 0 && jong != FINAL_RIEUL,
        "이요" | "을" => jong != 0,
        "로요" | "로" => jong == 0 || jong == FINAL_RIEUL,
        "를" => jong == 0,
        _ => true,
    }
}

/// 按收音规则去掉一个助词后缀：「잔이요」→ 잔，「라떼요」→ 라떼，「파이요」→ 파이
pub fn strip_particle(token: &str) -> &str {
    PARTICLES
        .iter()
        .filter_map(|p| token.strip_suffix(p).map(|stem| (*p, stem)))
        .find(|(p, stem)| particle_fits(p, stem))
        .map_or(token, |(_, stem)| stem)
}

/// 去掉一个助词后缀后的候选（不含原词）
fn strip_particles(token: &str) -> impl Iterator<Item = &str> {
    PARTICLES
        .iter()
        .filter_map(move |p| token.strip_suffix(p))
        .filter(|rest| !rest.is_empty())
}

/// 基于词典的识别
#[derive(Debug, Default, Clone)]
pub struct KeywordOptionInterpreter;

impl KeywordOptionInterpreter {
    pub fn new() -> Self {
        Self
    }

    fn lookup(word: &str) -> Option<(String, String)> {
        LEXICON
            .iter()
            .find(|e| e.words.contains(&word))
            .map(|e| (e.option.to_string(), e.value.to_string()))
    }
}

impl OptionInterpreter for KeywordOptionInterpreter {
    fn option_token(&self, token: &str) -> Option<(String, String)> {
        let token = clean_token(token);
        if token.is_empty() {
            return None;
        }
        Self::lookup(&token).or_else(|| strip_particles(&token).find_map(Self::lookup))
    }

    fn interpret_answer(&self, utterance: &str, slot: &PendingSlot) -> Option<BTreeMap<String, String>> {
        let mut found: BTreeMap<String, String> = BTreeMap::new();

        for raw in utterance.split_whitespace() {
            let token = clean_token(raw);
            if token.is_empty() || is_filler(&token) {
                continue;
            }

            // 菜单自定义取值（如 set / single）直接按 choices 匹配
            let direct = slot
                .choices
                .iter()
                .find(|c| {
                    let c = c.to_lowercase();
                    c == token || strip_particles(&token).any(|t| t == c)
                })
                .map(|c| (slot.option.clone(), c.clone()));

            let (option, value) = direct.or_else(|| self.option_token(&token))?;
            match found.get(&option) {
                Some(prev) if *prev != value => return None,
                _ => {
                    found.insert(option, value);
                }
            }
        }

        let value = found.get(&slot.option)?;
        if !slot.choices.is_empty() && !slot.choices.iter().any(|c| c == value) {
            return None;
        }
        Some(found)
    }
}

/// 追问文案：每次只问一个选项
pub fn slot_question(option: &str, choices: &[String]) -> String {
    match option {
        "temperature" => "뜨거운/아이스 중 어떤 걸로 드릴까요?".to_string(),
        "size" => "사이즈는 어떤 걸로 드릴까요? (S/M/L)".to_string(),
        other if choices.is_empty() => format!("{} 옵션을 선택해 주세요.", other),
        other => format!("{} 옵션을 선택해 주세요. ({})", other, choices.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(option: &str, choices: &[&str]) -> PendingSlot {
        PendingSlot {
            line_index: 0,
            option: option.into(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_option_token_with_particles() {
        let i = KeywordOptionInterpreter::new();
        assert_eq!(
            i.option_token("아이스로요"),
            Some(("temperature".into(), "iced".into()))
        );
        assert_eq!(i.option_token("라지로"), Some(("size".into(), "L".into())));
        assert_eq!(i.option_token("Hot!"), Some(("temperature".into(), "hot".into())));
        assert_eq!(i.option_token("아메리카노"), None);
    }

    #[test]
    fn test_answer_for_pending_slot() {
        let i = KeywordOptionInterpreter::new();
        let s = slot("temperature", &["hot", "iced"]);
        let got = i.interpret_answer("아이스로요", &s).unwrap();
        assert_eq!(got.get("temperature").map(String::as_str), Some("iced"));

        let got = i.interpret_answer("따뜻한 걸로 주세요", &s).unwrap();
        assert_eq!(got.get("temperature").map(String::as_str), Some("hot"));
    }

    #[test]
    fn test_answer_can_carry_other_options() {
        let i = KeywordOptionInterpreter::new();
        let got = i
            .interpret_answer("아이스 라지로요", &slot("temperature", &["hot", "iced"]))
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["size"], "L");
    }

    #[test]
    fn test_not_an_answer() {
        let i = KeywordOptionInterpreter::new();
        let s = slot("temperature", &["hot", "iced"]);
        assert!(i.interpret_answer("치즈케이크도 주세요", &s).is_none());
        assert!(i.interpret_answer("아이스 아메리카노 주세요", &s).is_none());
        assert!(i.interpret_answer("라지로요", &s).is_none());
        assert!(i.interpret_answer("뜨거운 아이스", &s).is_none());
        assert!(i.interpret_answer("뜨거운", &slot("temperature", &["iced"])).is_none());
    }

    #[test]
    fn test_custom_choice() {
        let i = KeywordOptionInterpreter::new();
        let got = i.interpret_answer("set로요", &slot("set", &["single", "set"])).unwrap();
        assert_eq!(got["set"], "set");
    }

    #[test]
    fn test_strip_particle_follows_final_consonant() {
        assert_eq!(strip_particle("잔이요"), "잔");
        assert_eq!(strip_particle("잔으로"), "잔");
        assert_eq!(strip_particle("라떼요"), "라떼");
        assert_eq!(strip_particle("라떼로요"), "라떼");
        assert_eq!(strip_particle("파이요"), "파이");
        assert_eq!(strip_particle("크루아상을"), "크루아상");
        assert_eq!(strip_particle("아메리카노"), "아메리카노");
        assert_eq!(strip_particle("요"), "요");
    }

    #[test]
    fn test_questions() {
        assert_eq!(slot_question("temperature", &[]), "뜨거운/아이스 중 어떤 걸로 드릴까요?");
        assert_eq!(
            slot_question("set", &["single".into(), "set".into()]),
            "set 옵션을 선택해 주세요. (single/set)"
        );
    }
}
