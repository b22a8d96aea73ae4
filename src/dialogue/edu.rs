//! 教学对话状态机
//!
//! 每轮：识别意图 → 调用 LanguageOracle → 返回 (Reply, EduState)。
//! Oracle 失败时返回 OracleUnavailable 回复，状态原样返回，同一轮可直接重试。

use super::intent::{EduIntent, EduIntentRecognizer};
use super::reply::{Notice, Reply, ReplyDetail, ReplyKind};
use super::state::EduState;
use crate::gateway::EduContext;
use crate::llm::{LanguageOracle, LearnerLevel, LlmError, OracleRequest};
use crate::memory::Message;

const ORACLE_UNAVAILABLE_MESSAGE: &str = "지금은 답변을 준비하지 못했어요. 잠시 후 같은 질문을 다시 보내 주세요.";

pub struct EduMachine {
    oracle: LanguageOracle,
    recognizer: EduIntentRecognizer,
    default_level: LearnerLevel,
}

impl EduMachine {
    /// llm_intent_fallback 为 true 时，规则未识别出概念会再问一次 Oracle
    pub fn new(oracle: LanguageOracle, default_level: LearnerLevel, llm_intent_fallback: bool) -> Self {
        let recognizer = if llm_intent_fallback {
            EduIntentRecognizer::with_oracle(oracle.clone())
        } else {
            EduIntentRecognizer::rules_only()
        };
        Self {
            oracle,
            recognizer,
            default_level,
        }
    }

    pub async fn process(
        &self,
        utterance: &str,
        ctx: &EduContext,
        state: &EduState,
        history: &[Message],
    ) -> (Reply, EduState) {
        let level = ctx.level.unwrap_or(self.default_level);
        let intent = self.recognizer.recognize(utterance, ctx, state).await;
        tracing::debug!(?intent, ?level, "edu turn");

        match self.run(intent, utterance, state, level, history).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("oracle call failed: {}", e);
                (
                    Reply::failure(Notice::OracleUnavailable, ORACLE_UNAVAILABLE_MESSAGE),
                    state.clone(),
                )
            }
        }
    }

    async fn run(
        &self,
        intent: EduIntent,
        utterance: &str,
        state: &EduState,
        level: LearnerLevel,
        history: &[Message],
    ) -> Result<(Reply, EduState), LlmError> {
        let mut next = state.clone();

        let reply = match intent {
            EduIntent::GradeAnswer { answer } => {
                let question = state
                    .pending_exercise
                    .as_ref()
                    .map(|e| e.question.clone())
                    .or_else(|| Some(utterance.trim().to_string()).filter(|q| !q.is_empty()));
                let result = self.oracle.grade(question, &answer, level, history).await?;
                let verdict = match result.correct {
                    Some(true) => "정답이에요! ",
                    Some(false) => "아쉽지만 정답이 아니에요. ",
                    None => "",
                };
                Reply::new(
                    ReplyKind::Feedback,
                    format!("{}{}", verdict, result.explanation),
                )
                .with_detail(ReplyDetail::Feedback {
                    correct: result.correct,
                })
            }
            EduIntent::SummarizeContent { content } => {
                let request = OracleRequest::Summarize {
                    content: content.clone(),
                    instruction: utterance.trim().to_string(),
                };
                let text = self.oracle.generate(&request, level, history).await?;
                next.last_content = Some(content);
                Reply::new(ReplyKind::Summary, text)
            }
            EduIntent::ResummarizeLast => {
                let content = state.last_content.clone().unwrap_or_default();
                let request = OracleRequest::Summarize {
                    content,
                    instruction: utterance.trim().to_string(),
                };
                let text = self.oracle.generate(&request, level, history).await?;
                Reply::new(ReplyKind::Summary, text)
            }
            EduIntent::GenerateExercise { topic } => {
                let item = self.oracle.exercise(&topic, level, history).await?;
                let reply = Reply::new(
                    ReplyKind::Exercise,
                    format!("[{}] 연습 문제: {}", item.topic, item.question),
                )
                .with_detail(ReplyDetail::Exercise {
                    topic: item.topic.clone(),
                    question: item.question.clone(),
                });
                next.last_topic = Some(topic);
                next.pending_exercise = Some(item);
                reply
            }
            EduIntent::ExplainConcept { concept } => {
                let request = OracleRequest::Explain {
                    concept: concept.clone(),
                    question: utterance.trim().to_string(),
                };
                let text = self.oracle.generate(&request, level, history).await?;
                next.last_topic = Some(concept);
                Reply::new(ReplyKind::Explanation, text)
            }
            EduIntent::AnswerQuestion => {
                let request = OracleRequest::Answer {
                    question: utterance.trim().to_string(),
                };
                let text = self.oracle.generate(&request, level, history).await?;
                Reply::new(ReplyKind::Answer, text)
            }
        };

        Ok((reply, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::llm::{ExerciseItem, MockLlmClient};

    fn machine(mock: MockLlmClient) -> EduMachine {
        let oracle = LanguageOracle::new(Arc::new(mock), Duration::from_secs(2));
        EduMachine::new(oracle, LearnerLevel::Advanced, false)
    }

    fn remembered() -> EduState {
        EduState {
            last_topic: Some("광합성".into()),
            last_content: Some("이전 본문".into()),
            pending_exercise: None,
        }
    }

    #[tokio::test]
    async fn test_grade_leaves_memory_untouched() {
        let m = machine(MockLlmClient::scripted(vec![Ok(
            r#"{"correct": true, "explanation": "잘 풀었어요."}"#.into(),
        )]));
        let ctx = EduContext {
            student_answer: Some("엽록체".into()),
            ..Default::default()
        };
        let state = remembered();
        let (reply, next) = m.process("제 답은요", &ctx, &state, &[]).await;
        assert_eq!(reply.kind, ReplyKind::Feedback);
        assert_eq!(reply.message, "정답이에요! 잘 풀었어요.");
        assert_eq!(reply.detail, Some(ReplyDetail::Feedback { correct: Some(true) }));
        assert_eq!(next, state);
    }

    #[tokio::test]
    async fn test_summary_stores_content() {
        let m = machine(MockLlmClient::scripted(vec![Ok("짧은 요약".into())]));
        let ctx = EduContext {
            content: Some("새 본문".into()),
            ..Default::default()
        };
        let (reply, next) = m.process("요약해 줘", &ctx, &remembered(), &[]).await;
        assert_eq!(reply.kind, ReplyKind::Summary);
        assert_eq!(reply.message, "짧은 요약");
        assert_eq!(next.last_content.as_deref(), Some("새 본문"));
        assert_eq!(next.last_topic.as_deref(), Some("광합성"));
    }

    #[tokio::test]
    async fn test_exercise_becomes_pending() {
        let m = machine(MockLlmClient::scripted(vec![Ok(
            r#"{"question": "2의 세제곱은?", "answer": "8"}"#.into(),
        )]));
        let ctx = EduContext {
            topic: Some("거듭제곱".into()),
            ..Default::default()
        };
        let (reply, next) = m.process("문제 내 줘", &ctx, &EduState::default(), &[]).await;
        assert_eq!(reply.kind, ReplyKind::Exercise);
        assert_eq!(reply.message, "[거듭제곱] 연습 문제: 2의 세제곱은?");
        assert_eq!(
            next.pending_exercise,
            Some(ExerciseItem {
                topic: "거듭제곱".into(),
                question: "2의 세제곱은?".into(),
                answer: Some("8".into()),
            })
        );
        assert_eq!(next.last_topic.as_deref(), Some("거듭제곱"));
    }

    #[tokio::test]
    async fn test_concept_sets_last_topic() {
        let m = machine(MockLlmClient::new());
        let (reply, next) = m
            .process("미분이 뭐야?", &EduContext::default(), &EduState::default(), &[])
            .await;
        assert_eq!(reply.kind, ReplyKind::Explanation);
        assert!(reply.message.contains("개념: 미분"));
        assert_eq!(next.last_topic.as_deref(), Some("미분"));
    }

    #[tokio::test]
    async fn test_generic_question_is_answered() {
        let m = machine(MockLlmClient::new());
        let state = remembered();
        let (reply, next) = m
            .process("오늘 공부 순서 좀 짜 줄래", &EduContext::default(), &state, &[])
            .await;
        assert_eq!(reply.kind, ReplyKind::Answer);
        assert_eq!(reply.message, "Mock: 오늘 공부 순서 좀 짜 줄래");
        assert_eq!(next, state);
    }

    #[tokio::test]
    async fn test_resummarize_previous_content() {
        let m = machine(MockLlmClient::new());
        let (reply, _) = m
            .process("더 짧게 요약해 줘", &EduContext::default(), &remembered(), &[])
            .await;
        assert_eq!(reply.kind, ReplyKind::Summary);
        assert!(reply.message.contains("이전 본문"));
    }

    #[tokio::test]
    async fn test_oracle_failure_keeps_state() {
        let m = machine(MockLlmClient::failing(LlmError::ApiError("down".into())));
        let state = remembered();
        let ctx = EduContext {
            topic: Some("확률".into()),
            ..Default::default()
        };
        let (reply, next) = m.process("문제 줘", &ctx, &state, &[]).await;
        assert!(reply.is_failure());
        assert_eq!(reply.notice(), Some(Notice::OracleUnavailable));
        assert_eq!(next, state);
    }
}
