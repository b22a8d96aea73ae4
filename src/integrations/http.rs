//! HTTP 接口
//!
//! - `POST /api/chat`：`{ "user_message": "...", "meta": { ... } }` → 一轮对话的 Reply
//! - `GET /api/health`
//!
//! 信封错误在进入 ModeRouter 之前返回 4xx；状态机内部的失败以 200 + kind=error 的 Reply 返回。

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::core::DialogError;
use crate::dialogue::Reply;
use crate::gateway::{MetaEnvelope, Mode, ModeRouter, RawMeta};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub meta: RawMeta,
    /// 部分客户端把教学字段放在顶层；meta 中的同名字段优先
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub student_answer: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl ChatRequest {
    /// 合并顶层字段后解析信封
    fn into_parts(self) -> Result<(String, MetaEnvelope), DialogError> {
        let mut meta = self.meta;
        meta.content = meta.content.or(self.content);
        meta.student_answer = meta.student_answer.or(self.student_answer);
        meta.topic = meta.topic.or(self.topic);

        let has_edu_payload = [&meta.content, &meta.student_answer, &meta.topic]
            .iter()
            .any(|f| f.as_deref().map_or(false, |s| !s.trim().is_empty()));
        let message = self.user_message.unwrap_or_default();
        if message.trim().is_empty() && !has_edu_payload {
            return Err(DialogError::MalformedEnvelope(
                "user_message is required".to_string(),
            ));
        }

        let envelope = MetaEnvelope::try_from(meta)?;
        Ok((message.trim().to_string(), envelope))
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub trace_id: String,
    pub session_id: String,
    pub mode: Mode,
    pub turn_count: u64,
    pub reply: Reply,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: DialogError) -> ApiError {
    let (status, code) = match &err {
        DialogError::MalformedEnvelope(_) => (StatusCode::BAD_REQUEST, "malformed_envelope"),
        DialogError::InvalidMode(_) => (StatusCode::BAD_REQUEST, "invalid_mode"),
        DialogError::ModeMismatch { .. } => (StatusCode::CONFLICT, "mode_mismatch"),
        DialogError::Store(_) | DialogError::ServiceUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        DialogError::OracleUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "oracle_unavailable"),
        DialogError::InvalidQuantity(_) | DialogError::CatalogNotFound(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable")
        }
    };
    if err.is_client_error() {
        tracing::debug!("rejected request: {}", err);
    } else {
        tracing::error!("chat request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
}

pub fn create_router(router: Arc<ModeRouter>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(router)
}

async fn api_chat(
    State(router): State<Arc<ModeRouter>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (message, meta) = req.into_parts().map_err(api_error)?;
    let outcome = router.handle(&message, &meta).await.map_err(api_error)?;
    Ok(Json(ChatResponse {
        trace_id: outcome.trace_id,
        session_id: outcome.session_id,
        mode: outcome.mode,
        turn_count: outcome.turn_count,
        reply: outcome.reply,
    }))
}
