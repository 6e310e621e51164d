//! 余额与提现

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dto::{BalanceResponse, WithdrawRequest, WithdrawalResponse};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::WithdrawalOutcome;
use crate::state::AppState;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.get_balance(&user.login).await?;
    Ok(Json(balance.into()))
}

/// POST /api/user/balance/withdraw
///
/// 200 成功；402 余额不足；409 该订单号已提现；422 订单号无效
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(req) = payload?;

    let status = match state
        .ledger
        .request_withdrawal(&user.login, &req.order, req.sum)
        .await?
    {
        WithdrawalOutcome::Accepted => StatusCode::OK,
        WithdrawalOutcome::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
        WithdrawalOutcome::DuplicateWithdrawal => StatusCode::CONFLICT,
    };
    Ok(status)
}

/// GET /api/user/withdrawals
///
/// 没有提现记录时返回 204
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let withdrawals = state.ledger.get_withdrawals(&user.login).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals
        .into_iter()
        .map(WithdrawalResponse::from)
        .collect();
    Ok(Json(body).into_response())
}
