//! 订单上传与查询

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dto::OrderResponse;
use crate::error::{ApiError, Result};
use crate::middleware::AuthUser;
use crate::models::UploadOutcome;
use crate::state::AppState;

/// POST /api/user/orders
///
/// 请求体为纯文本订单号。202 新订单；200 本人重复上传；409 已被他人上传；422 订单号无效
pub async fn upload_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: String,
) -> Result<StatusCode> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("订单号不能为空".to_string()));
    }

    let status = match state.ledger.upload_order(&user.login, &body).await? {
        UploadOutcome::Accepted => StatusCode::ACCEPTED,
        UploadOutcome::AlreadyUploadedByOwner => StatusCode::OK,
        UploadOutcome::AlreadyUploadedByOther => StatusCode::CONFLICT,
    };
    Ok(status)
}

/// GET /api/user/orders
///
/// 按上传时间升序；没有订单时返回 204
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let orders = state.ledger.get_orders(&user.login).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
