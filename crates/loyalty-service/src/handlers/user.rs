//! 注册与登录

use axum::{Json, extract::State, extract::rejection::JsonRejection, response::Response};
use validator::Validate;

use super::bearer_response;
use crate::dto::CredentialsRequest;
use crate::error::Result;
use crate::state::AppState;

/// POST /api/user/register
///
/// 注册成功即视为已登录，Token 通过 `Authorization` 头返回
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload?;
    req.validate()?;

    let token = state.users.register(&req.login, &req.password).await?;
    bearer_response(&token)
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload?;
    req.validate()?;

    let token = state.users.login(&req.login, &req.password).await?;
    bearer_response(&token)
}
