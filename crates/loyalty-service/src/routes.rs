//! 路由配置

use axum::{
    Router, middleware,
    routing::{get, post},
};
use loyalty_shared::observability::middleware as obs_middleware;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;

use crate::handlers::{balance, orders, ping, user};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// 需要登录的路由
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/user/orders",
            post(orders::upload_order).get(orders::list_orders),
        )
        .route("/api/user/balance", get(balance::get_balance))
        .route("/api/user/balance/withdraw", post(balance::withdraw))
        .route("/api/user/withdrawals", get(balance::list_withdrawals))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// 构建完整的 HTTP 路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping::ping))
        .route("/api/user/register", post(user::register))
        .route("/api/user/login", post(user::login))
        .merge(user_routes(state.clone()))
        // gzip 响应压缩与请求解压
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
