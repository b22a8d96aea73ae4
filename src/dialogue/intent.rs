//! 教学模式意图识别
//!
//! 按优先级：批改 > 摘要 > 出题 > 概念讲解 > 一般问答。前三项由 meta 字段决定，
//! 概念讲解先走快速规则，可选地再让 Oracle 判定。

use std::sync::OnceLock;

use regex::Regex;

use super::slot::final_consonant;
use super::state::EduState;
use crate::gateway::EduContext;
use crate::llm::LanguageOracle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EduIntent {
    GradeAnswer { answer: String },
    SummarizeContent { content: String },
    /// 对上一次提交内容的追问（再短一点、다시 요약）
    ResummarizeLast,
    GenerateExercise { topic: String },
    ExplainConcept { concept: String },
    AnswerQuestion,
}

fn concept_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^(?P<c>.+?)\s*(?:이란|란)?\s*(?:뭐야|뭐예요|뭐에요|뭔가요|뭐지|뭘까|무엇인가요|무엇이야|무엇입니까)$",
            r"^(?P<c>.+?)\s*(?:이란|란)\s*무엇(?:인가요|이야|입니까)?$",
            r"^(?P<c>.+?)\s*(?:에\s*대해서?\s*)?설명해\s*(?:줘|줘요|주세요|줄래|주실래요)$",
            r"^(?P<c>.+?)\s*에\s*대해서?\s*(?:알려\s*(?:줘|줘요|주세요)|가르쳐\s*(?:줘|주세요))$",
            r"^(?P<c>.+?)의\s*(?:개념|정의|뜻)(?:은|이)?(?:\s*(?:뭐야|뭐예요|알려줘|알려주세요))?$",
            r"(?i)^(?:what\s+is|what's|what\s+are|explain|define|tell\s+me\s+about)\s+(?:an?\s+|the\s+)?(?P<c>.+)$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

const FOLLOWUP_OPENERS: &[&str] = &["그럼", "그러면", "근데", "그런데", "그래서"];
const REFERENTIAL: &[&str] = &["그거", "이거", "그것", "이것", "그게", "이게", "저거", "it", "that", "this"];
const QUESTION_WORDS: &[&str] = &["왜", "어떻게", "예시", "예를", "차이", "원리", "why", "how", "example"];
const RESUMMARIZE_WORDS: &[&str] = &["요약", "정리", "summarize", "summary"];

/// 以「이」结尾的常见名词，「고양이 뭐야」里的 이 不是助词
const I_FINAL_NOUNS: &[&str] = &[
    "고양이", "원숭이", "달팽이", "지렁이", "돌멩이", "넓이", "길이", "높이", "깊이", "놀이", "먹이",
    "나이", "차이", "아이", "오이", "종이", "거짓말쟁이",
];

/// 去掉与收音相符的主格 / 话题助词：이·은 接有收音的词干，가·는 接无收音的词干
fn strip_subject_particle(word: &str) -> &str {
    if I_FINAL_NOUNS.iter().any(|n| word.ends_with(n)) {
        return word;
    }
    for (particle, needs_final) in [("은", true), ("는", false), ("이", true), ("가", false)] {
        let Some(stem) = word.strip_suffix(particle) else {
            continue;
        };
        let fits = stem
            .chars()
            .last()
            .and_then(final_consonant)
            .map_or(false, |jong| (jong != 0) == needs_final);
        if fits {
            return stem;
        }
    }
    word
}

fn trim_question(s: &str) -> &str {
    s.trim()
        .trim_end_matches(|c: char| matches!(c, '?' | '？' | '.' | '!' | '~'))
        .trim()
}

/// 快速规则：从「X가 뭐야」「explain X」中取出概念名
pub fn extract_concept(utterance: &str) -> Option<String> {
    let text = trim_question(utterance);
    if text.is_empty() {
        return None;
    }
    concept_patterns().iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.name("c"))
            .map(|m| strip_subject_particle(m.as_str().trim()).to_string())
            .filter(|c| !c.is_empty() && !REFERENTIAL.contains(&c.to_lowercase().as_str()))
    })
}

/// 是否在追问 last_topic（指代词、转折开头或直接提到主题，且像是提问）
fn is_followup_on(utterance: &str, topic: &str) -> bool {
    let lower = utterance.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let is_question = utterance.trim_end().ends_with('?')
        || QUESTION_WORDS.iter().any(|q| lower.contains(q));
    let refers = words
        .first()
        .map_or(false, |w| FOLLOWUP_OPENERS.iter().any(|o| w.starts_with(o)))
        || words
            .iter()
            .any(|w| REFERENTIAL.iter().any(|r| w.starts_with(r)))
        || lower.contains(&topic.to_lowercase());
    is_question && refers
}

/// 意图识别器
pub struct EduIntentRecognizer {
    oracle: Option<LanguageOracle>,
}

impl EduIntentRecognizer {
    /// 仅规则
    pub fn rules_only() -> Self {
        Self { oracle: None }
    }

    /// 规则未命中时让 Oracle 判定是否为概念提问
    pub fn with_oracle(oracle: LanguageOracle) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    pub async fn recognize(&self, utterance: &str, ctx: &EduContext, state: &EduState) -> EduIntent {
        if let Some(answer) = &ctx.student_answer {
            return EduIntent::GradeAnswer {
                answer: answer.clone(),
            };
        }
        if let Some(content) = &ctx.content {
            return EduIntent::SummarizeContent {
                content: content.clone(),
            };
        }
        if let Some(topic) = &ctx.topic {
            return EduIntent::GenerateExercise {
                topic: topic.clone(),
            };
        }

        let lower = utterance.to_lowercase();
        if state.last_content.is_some() && RESUMMARIZE_WORDS.iter().any(|w| lower.contains(w)) {
            return EduIntent::ResummarizeLast;
        }

        if let Some(concept) = extract_concept(utterance) {
            return EduIntent::ExplainConcept { concept };
        }
        if let Some(topic) = &state.last_topic {
            if is_followup_on(utterance, topic) {
                return EduIntent::ExplainConcept {
                    concept: topic.clone(),
                };
            }
        }

        if let Some(oracle) = &self.oracle {
            match oracle.classify_concept(utterance).await {
                Ok(Some(concept)) => return EduIntent::ExplainConcept { concept },
                Ok(None) => {}
                Err(e) => tracing::warn!("concept classification failed, answering directly: {}", e),
            }
        }

        EduIntent::AnswerQuestion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::llm::{LlmError, MockLlmClient};

    #[test]
    fn test_extract_concept_korean() {
        assert_eq!(extract_concept("광합성이 뭐야?").as_deref(), Some("광합성"));
        assert_eq!(extract_concept("미분이란 무엇인가요").as_deref(), Some("미분"));
        assert_eq!(extract_concept("삼각함수 설명해줘").as_deref(), Some("삼각함수"));
        assert_eq!(extract_concept("블록체인에 대해 알려줘").as_deref(), Some("블록체인"));
        assert_eq!(extract_concept("오늘 날씨 어때?"), None);
    }

    #[test]
    fn test_extract_concept_keeps_noun_ending_in_i() {
        assert_eq!(extract_concept("고양이 뭐야").as_deref(), Some("고양이"));
        assert_eq!(extract_concept("넓이가 뭐예요?").as_deref(), Some("넓이"));
        assert_eq!(extract_concept("평가 뭐야").as_deref(), Some("평가"));
        assert_eq!(extract_concept("컴퓨터는 뭐야").as_deref(), Some("컴퓨터"));
        assert_eq!(extract_concept("미분은 뭐야").as_deref(), Some("미분"));
    }

    #[test]
    fn test_extract_concept_english() {
        assert_eq!(extract_concept("What is a closure?").as_deref(), Some("closure"));
        assert_eq!(extract_concept("explain recursion").as_deref(), Some("recursion"));
        assert_eq!(extract_concept("what is it?"), None);
    }

    #[tokio::test]
    async fn test_priority_student_answer_first() {
        let r = EduIntentRecognizer::rules_only();
        let ctx = EduContext {
            content: Some("본문".into()),
            student_answer: Some("42".into()),
            topic: Some("산수".into()),
            level: None,
        };
        let intent = r.recognize("광합성이 뭐야", &ctx, &EduState::default()).await;
        assert_eq!(intent, EduIntent::GradeAnswer { answer: "42".into() });
    }

    #[tokio::test]
    async fn test_followup_uses_last_topic() {
        let r = EduIntentRecognizer::rules_only();
        let state = EduState {
            last_topic: Some("광합성".into()),
            ..Default::default()
        };
        let intent = r
            .recognize("그럼 그건 왜 밤에는 안 일어나?", &EduContext::default(), &state)
            .await;
        assert_eq!(intent, EduIntent::ExplainConcept { concept: "광합성".into() });

        let intent = r.recognize("고마워", &EduContext::default(), &state).await;
        assert_eq!(intent, EduIntent::AnswerQuestion);
    }

    #[tokio::test]
    async fn test_oracle_classification_failure_falls_back() {
        let oracle = LanguageOracle::new(
            Arc::new(MockLlmClient::failing(LlmError::ApiError("down".into()))),
            Duration::from_secs(1),
        );
        let r = EduIntentRecognizer::with_oracle(oracle);
        let intent = r
            .recognize("숙제 좀 도와줄래", &EduContext::default(), &EduState::default())
            .await;
        assert_eq!(intent, EduIntent::AnswerQuestion);
    }
}
