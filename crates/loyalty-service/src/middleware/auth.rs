//! JWT 认证中间件
//!
//! 验证 `Authorization: Bearer` Token，并把当前用户注入请求扩展

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use loyalty_shared::error::LoyaltyError;

use crate::error::ApiError;
use crate::state::AppState;

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub login: String,
}

/// 认证中间件，只挂在需要登录的路由上
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized("缺少认证 Token");
    };

    match state.users.jwt().verify_token(token.trim()) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser { login: claims.sub });
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError::from(LoyaltyError::Unauthorized(message.to_string())).into_response()
}
