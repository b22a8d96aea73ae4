//! LanguageOracle：对话状态机与 LLM 之间的唯一契约
//!
//! 状态机只提交结构化请求（讲解 / 问答 / 摘要 / 批改 / 出题 / 概念识别），
//! 拿回文本或结构化结果；每次调用都有超时，超时即失败，不会无限阻塞。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 学习者水平，决定讲解的深度与措辞
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LearnerLevel {
    Beginner,
    Intermediate,
    #[default]
    Advanced,
}

impl LearnerLevel {
    /// 解析 meta.user_level；未知值返回 None，由调用方决定默认值
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "초급" => Some(Self::Beginner),
            "intermediate" | "중급" => Some(Self::Intermediate),
            "advanced" | "고급" => Some(Self::Advanced),
            _ => None,
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            Self::Beginner => {
                "학습자는 초급입니다. 전문 용어를 피하고, 일상적인 비유와 짧은 문장으로 설명하세요."
            }
            Self::Intermediate => {
                "학습자는 중급입니다. 핵심 용어를 사용하되 간단히 정의하고, 예시를 하나 포함하세요."
            }
            Self::Advanced => {
                "학습자는 고급입니다. 정확한 용어로 간결하게 설명하고, 필요한 경우 세부 사항을 덧붙이세요."
            }
        }
    }
}

/// Oracle 请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleRequest {
    /// 讲解概念；question 为用户原话
    Explain { concept: String, question: String },
    /// 一般问答
    Answer { question: String },
    /// 摘要给定文本；instruction 为用户原话（可能为空）
    Summarize { content: String, instruction: String },
    /// 批改答案；question 缺省时由 Oracle 自行推断
    Grade {
        question: Option<String>,
        answer: String,
    },
    /// 针对主题出一道练习题
    Exercise { topic: String },
    /// 判断用户语句在询问哪个概念（无则回答 NONE）
    ClassifyConcept { utterance: String },
}

impl OracleRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Explain { .. } => "explain",
            Self::Answer { .. } => "answer",
            Self::Summarize { .. } => "summarize",
            Self::Grade { .. } => "grade",
            Self::Exercise { .. } => "exercise",
            Self::ClassifyConcept { .. } => "classify",
        }
    }

    fn task_prompt(&self) -> &'static str {
        match self {
            Self::Explain { .. } => "요청된 개념을 설명하세요.",
            Self::Answer { .. } => "질문에 정확하고 간결하게 답하세요.",
            Self::Summarize { .. } => "주어진 글을 핵심 위주로 3~5문장으로 요약하세요.",
            Self::Grade { .. } => {
                "학생의 답안을 채점하세요. 반드시 JSON 한 개로만 답하세요: {\"correct\": true|false, \"explanation\": \"...\"}"
            }
            Self::Exercise { .. } => {
                "주제에 맞는 연습 문제를 하나 만드세요. 반드시 JSON 한 개로만 답하세요: {\"question\": \"...\", \"answer\": \"...\"}"
            }
            Self::ClassifyConcept { .. } => {
                "사용자가 설명을 요청하는 개념 이름만 한 줄로 답하세요. 개념 설명 요청이 아니면 NONE 이라고만 답하세요."
            }
        }
    }

    fn user_prompt(&self) -> String {
        match self {
            Self::Explain { concept, question } => format!("개념: {}\n질문: {}", concept, question),
            Self::Answer { question } => question.clone(),
            Self::Summarize {
                content,
                instruction,
            } => {
                if instruction.trim().is_empty() {
                    format!("다음 글을 요약해 주세요.\n\n{}", content)
                } else {
                    format!("{}\n\n{}", instruction, content)
                }
            }
            Self::Grade { question, answer } => match question {
                Some(q) => format!("문제: {}\n학생 답안: {}", q, answer),
                None => format!("학생 답안: {}", answer),
            },
            Self::Exercise { topic } => format!("주제: {}", topic),
            Self::ClassifyConcept { utterance } => utterance.clone(),
        }
    }
}

/// 批改结果；correct 为 None 表示 Oracle 未给出明确判断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub correct: Option<bool>,
    pub explanation: String,
}

/// 练习题（作为 pending_exercise 存入会话）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseItem {
    pub topic: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Deserialize)]
struct RawGrade {
    correct: Option<bool>,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
struct RawExercise {
    question: String,
    answer: Option<String>,
}

/// LanguageOracle：持有 LLM 客户端与单次调用超时
#[derive(Clone)]
pub struct LanguageOracle {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LanguageOracle {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// 生成文本：system（水平 + 任务）→ 历史 → 本次请求
    pub async fn generate(
        &self,
        request: &OracleRequest,
        level: LearnerLevel,
        history: &[Message],
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(format!(
            "당신은 친절한 학습 도우미입니다. {}\n{}",
            level.instructions(),
            request.task_prompt()
        )));
        messages.extend_from_slice(history);
        messages.push(Message::user(request.user_prompt()));

        tracing::debug!(kind = request.kind(), history = history.len(), "oracle request");

        let text = tokio::time::timeout(self.timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty oracle output".to_string()));
        }
        Ok(text)
    }

    /// 批改：优先解析 JSON，失败时整段文本作为 explanation
    pub async fn grade(
        &self,
        question: Option<String>,
        answer: &str,
        level: LearnerLevel,
        history: &[Message],
    ) -> Result<GradeResult, LlmError> {
        let request = OracleRequest::Grade {
            question,
            answer: answer.to_string(),
        };
        let text = self.generate(&request, level, history).await?;
        Ok(match extract_json::<RawGrade>(&text) {
            Some(raw) if !raw.explanation.trim().is_empty() || raw.correct.is_some() => {
                GradeResult {
                    correct: raw.correct,
                    explanation: raw.explanation,
                }
            }
            _ => GradeResult {
                correct: None,
                explanation: text,
            },
        })
    }

    /// 出题：优先解析 JSON，失败时整段文本作为题目
    pub async fn exercise(
        &self,
        topic: &str,
        level: LearnerLevel,
        history: &[Message],
    ) -> Result<ExerciseItem, LlmError> {
        let request = OracleRequest::Exercise {
            topic: topic.to_string(),
        };
        let text = self.generate(&request, level, history).await?;
        Ok(match extract_json::<RawExercise>(&text) {
            Some(raw) if !raw.question.trim().is_empty() => ExerciseItem {
                topic: topic.to_string(),
                question: raw.question,
                answer: raw.answer,
            },
            _ => ExerciseItem {
                topic: topic.to_string(),
                question: text,
                answer: None,
            },
        })
    }

    /// 概念识别：返回概念名，NONE 或空结果返回 None
    pub async fn classify_concept(&self, utterance: &str) -> Result<Option<String>, LlmError> {
        let request = OracleRequest::ClassifyConcept {
            utterance: utterance.to_string(),
        };
        let text = self.generate(&request, LearnerLevel::default(), &[]).await?;
        let first = text.lines().next().unwrap_or("").trim().trim_matches('"');
        if first.is_empty() || first.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Ok(Some(first.to_string()))
        }
    }
}

/// 从可能夹带说明文字或 ``` 代码块的输出中取出第一个 JSON 对象
fn extract_json<T: for<'de> Deserialize<'de>>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn oracle(mock: MockLlmClient) -> LanguageOracle {
        LanguageOracle::new(Arc::new(mock), Duration::from_secs(2))
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LearnerLevel::parse("Beginner"), Some(LearnerLevel::Beginner));
        assert_eq!(LearnerLevel::parse("중급"), Some(LearnerLevel::Intermediate));
        assert_eq!(LearnerLevel::parse("expert"), None);
    }

    #[tokio::test]
    async fn test_grade_parses_fenced_json() {
        let o = oracle(MockLlmClient::scripted(vec![Ok(
            "```json\n{\"correct\": false, \"explanation\": \"2+2는 4입니다.\"}\n```".into(),
        )]));
        let result = o
            .grade(Some("2+2?".into()), "5", LearnerLevel::Beginner, &[])
            .await
            .unwrap();
        assert_eq!(result.correct, Some(false));
        assert_eq!(result.explanation, "2+2는 4입니다.");
    }

    #[tokio::test]
    async fn test_grade_falls_back_to_plain_text() {
        let o = oracle(MockLlmClient::scripted(vec![Ok("좋은 답변입니다.".into())]));
        let result = o.grade(None, "광합성", LearnerLevel::Advanced, &[]).await.unwrap();
        assert_eq!(result.correct, None);
        assert_eq!(result.explanation, "좋은 답변입니다.");
    }

    #[tokio::test]
    async fn test_exercise_json() {
        let o = oracle(MockLlmClient::scripted(vec![Ok(
            r#"{"question": "3의 제곱은?", "answer": "9"}"#.into(),
        )]));
        let item = o.exercise("제곱", LearnerLevel::Advanced, &[]).await.unwrap();
        assert_eq!(item.topic, "제곱");
        assert_eq!(item.question, "3의 제곱은?");
        assert_eq!(item.answer.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let slow = MockLlmClient::new().with_delay(Duration::from_millis(200));
        let o = LanguageOracle::new(Arc::new(slow), Duration::from_millis(20));
        let err = o
            .generate(
                &OracleRequest::Answer {
                    question: "q".into(),
                },
                LearnerLevel::Advanced,
                &[],
            )
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Timeout(0));
    }

    #[tokio::test]
    async fn test_classify_none() {
        let o = oracle(MockLlmClient::scripted(vec![Ok("NONE".into()), Ok("광합성\n".into())]));
        assert_eq!(o.classify_concept("안녕").await.unwrap(), None);
        assert_eq!(
            o.classify_concept("광합성이 뭐야").await.unwrap(),
            Some("광합성".to_string())
        );
    }
}
