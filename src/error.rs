// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
// endregion: --- Imports

// region:    --- Field Error
/// 폼 필드 단위 검증 오류
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
// endregion: --- Field Error

// region:    --- App Error
/// 애플리케이션 전역 오류 타입
#[derive(Debug, Error)]
pub enum AppError {
    /// 인증되지 않았거나 권한이 없는 요청
    #[error("authentication required")]
    Unauthorized,

    /// 존재하지 않는 리소스 참조
    #[error("{0} not found")]
    NotFound(&'static str),

    /// 폼 입력 검증 실패 (입찰 비즈니스 규칙 포함)
    #[error("invalid form input")]
    Validation(Vec<FieldError>),

    /// 중복 리소스 (username 중복 등)
    #[error("{0}")]
    Conflict(String),

    /// 데이터베이스 오류
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// 자격 증명 해시 오류
    #[error(transparent)]
    Credential(#[from] bcrypt::BcryptError),

    /// 세션 저장소 오류
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
}

impl AppError {
    /// 단일 필드 검증 오류 생성
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// 검증 오류 메시지를 재렌더링용 한 문자열로 합치기
    pub fn validation_message(errors: &[FieldError]) -> String {
        errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// HTTP 응답 변환
/// 인프라 오류는 상세 내용을 로그에만 남기고 일반 메시지로 응답한다.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "authentication required"})),
            )
                .into_response(),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": format!("{} not found", what)})),
            )
                .into_response(),
            Self::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "invalid form input", "fields": fields})),
            )
                .into_response(),
            Self::Conflict(msg) => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({"error": msg})),
            )
                .into_response(),
            Self::Database(e) => {
                error!("{:<12} --> 데이터베이스 오류: {:?}", "Error", e);
                internal_error_response()
            }
            Self::Credential(e) => {
                error!("{:<12} --> 자격 증명 해시 오류: {:?}", "Error", e);
                internal_error_response()
            }
            Self::Session(e) => {
                error!("{:<12} --> 세션 오류: {:?}", "Error", e);
                internal_error_response()
            }
        }
    }
}

/// 일반 서버 오류 응답
fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "Unexpected error occurred"})),
    )
        .into_response()
}
// endregion: --- App Error
