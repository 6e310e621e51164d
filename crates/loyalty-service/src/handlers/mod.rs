//! HTTP 请求处理器

pub mod balance;
pub mod orders;
pub mod ping;
pub mod user;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use loyalty_shared::error::LoyaltyError;

use crate::error::Result;

/// 把 Token 放进 `Authorization` 响应头
fn bearer_response(token: &str) -> Result<Response> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| LoyaltyError::Internal(format!("Token 无法写入响应头: {e}")))?;
    Ok((StatusCode::OK, [(AUTHORIZATION, value)]).into_response())
}
