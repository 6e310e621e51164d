//! HTTP 错误映射
//!
//! 服务层返回 `LoyaltyError`，这里统一映射为状态码和 JSON 错误体

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loyalty_shared::error::LoyaltyError;
use serde_json::json;

/// API 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] LoyaltyError),

    #[error("请求格式错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Domain(err) => match err {
                LoyaltyError::Validation(_) => StatusCode::BAD_REQUEST,
                LoyaltyError::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LoyaltyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                LoyaltyError::AlreadyExists { .. } => StatusCode::CONFLICT,
                LoyaltyError::NotFound { .. } => StatusCode::NOT_FOUND,
                LoyaltyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                LoyaltyError::Database(_)
                | LoyaltyError::ExternalService { .. }
                | LoyaltyError::Config(_)
                | LoyaltyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Domain(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            match &self {
                Self::Domain(LoyaltyError::Cancelled) => {
                    tracing::info!("服务正在关闭，拒绝请求");
                }
                other => tracing::error!(error = %other, "请求处理失败"),
            }
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::BadRequest(errors.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(LoyaltyError::InvalidOrderNumber("1".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(LoyaltyError::Unauthorized("x".to_string())),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::from(LoyaltyError::AlreadyExists {
                    entity: "User".to_string(),
                    field: "login".to_string(),
                    value: "alice".to_string(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(LoyaltyError::Database(sqlx::Error::PoolTimedOut)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::BadRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
        }
    }
}
