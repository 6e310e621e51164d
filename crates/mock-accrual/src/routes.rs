//! Mock accrual REST API

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::limiter::RateLimiter;
use crate::models::{AccrualOrder, OrderState};
use crate::store::MemoryStore;

/// 服务状态
///
/// 持有订单结论存储和限流器，clone 后共享同一份数据
#[derive(Clone)]
pub struct AccrualState {
    pub orders: MemoryStore<AccrualOrder>,
    limiter: Arc<RateLimiter>,
}

impl AccrualState {
    /// `rpm_limit` 为每分钟允许的查询数，0 表示不限流
    pub fn new(rpm_limit: u32) -> Self {
        Self {
            orders: MemoryStore::new(),
            limiter: Arc::new(RateLimiter::new(rpm_limit)),
        }
    }

    /// 登记（或覆盖）一个订单的结论
    pub fn register(&self, order: &str, status: OrderState, accrual: Option<Decimal>) {
        self.orders
            .insert(order, AccrualOrder::new(order, status, accrual));
    }
}

impl Default for AccrualState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// 构建路由
pub fn router(state: AccrualState) -> Router {
    Router::new()
        .route("/api/orders/{number}", get(get_order))
        .route("/api/orders", post(register_order))
        .with_state(state)
}

async fn get_order(State(state): State<AccrualState>, Path(number): Path<String>) -> Response {
    if !state.limiter.try_acquire() {
        debug!(order = %number, "Rate limit exceeded");
        return too_many_requests(&state.limiter);
    }

    match state.orders.get(&number) {
        Some(order) => (StatusCode::OK, Json(order)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn register_order(
    State(state): State<AccrualState>,
    Json(req): Json<AccrualOrder>,
) -> StatusCode {
    if req.order.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    if matches!(req.accrual, Some(a) if a < Decimal::ZERO) {
        return StatusCode::BAD_REQUEST;
    }

    info!(order = %req.order, status = ?req.status, "Order registered");
    state.register(&req.order, req.status, req.accrual);
    StatusCode::ACCEPTED
}

fn too_many_requests(limiter: &RateLimiter) -> Response {
    let body = format!(
        "No more than {} requests per minute allowed",
        limiter.limit()
    );
    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(limiter.retry_after_secs()),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_order_is_no_content() {
        let app = router(AccrualState::default());
        let resp = app.oneshot(get("/api/orders/12345678903")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_registered_order_is_returned() {
        let state = AccrualState::default();
        state.register("12345678903", OrderState::Processed, Some(dec!(500)));
        let app = router(state);

        let resp = app.oneshot(get("/api/orders/12345678903")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let order: AccrualOrder = serde_json::from_slice(&body).unwrap();
        assert_eq!(order.status, OrderState::Processed);
        assert_eq!(order.accrual, Some(dec!(500)));
    }

    #[tokio::test]
    async fn test_accrual_dropped_unless_processed() {
        let state = AccrualState::default();
        state.register("12345678903", OrderState::Processing, Some(dec!(10)));
        assert_eq!(state.orders.get("12345678903").unwrap().accrual, None);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_retry_after() {
        let app = router(AccrualState::new(1));

        let first = app
            .clone()
            .oneshot(get("/api/orders/12345678903"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::NO_CONTENT);

        let second = app.oneshot(get("/api/orders/12345678903")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "60");

        let body = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"No more than 1 requests per minute allowed");
    }

    #[tokio::test]
    async fn test_register_via_post() {
        let state = AccrualState::default();
        let app = router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/api/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"order":"12345678903","status":"PROCESSED","accrual":729.98}"#,
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            state.orders.get("12345678903").unwrap().accrual,
            Some(dec!(729.98))
        );
    }
}
