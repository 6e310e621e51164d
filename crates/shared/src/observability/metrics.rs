//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册指标描述，出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "accrual_queries_total",
        "Accrual service queries by outcome"
    );
    metrics::describe_histogram!(
        "accrual_query_duration_seconds",
        "Accrual service query duration in seconds"
    );
    metrics::describe_counter!(
        "sync_orders_dispatched_total",
        "Pending orders pushed onto the work queue"
    );
    metrics::describe_counter!("sync_batches_total", "Verdict batches flushed by outcome");
    metrics::describe_histogram!("sync_batch_size", "Number of verdicts per flushed batch");
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last completed background cycle"
    );

    metrics::describe_counter!("withdrawals_total", "Withdrawal requests by outcome");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次 accrual 查询（outcome: verdict / pending / rate_limited / unavailable）
#[inline]
pub fn record_accrual_query(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("accrual_queries_total", "outcome" => outcome).increment(1);
    metrics::histogram!("accrual_query_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}

/// 记录一轮调度派发的订单数
#[inline]
pub fn record_orders_dispatched(count: u64) {
    metrics::counter!("sync_orders_dispatched_total").increment(count);
}

/// 记录一次批量落库（status: committed / cancelled / failed）
#[inline]
pub fn record_batch_flush(size: usize, status: &'static str) {
    metrics::counter!("sync_batches_total", "status" => status).increment(1);
    metrics::histogram!("sync_batch_size").record(size as f64);
}

/// 记录提现请求结果
#[inline]
pub fn record_withdrawal(outcome: &'static str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome).increment(1);
}

/// 记录后台组件最近一次运行时间，用于存活监控
#[inline]
pub fn set_worker_last_run(worker: &'static str) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker).set(now);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_http_request("GET", "/api/user/orders", 200, 0.1);
        record_accrual_query("verdict", 0.05);
        record_orders_dispatched(3);
        record_batch_flush(3, "committed");
        record_withdrawal("accepted");
        set_worker_last_run("scheduler");
    }
}
