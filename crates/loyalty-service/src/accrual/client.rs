//! accrual 客户端实现

use std::time::{Duration, Instant};

use async_trait::async_trait;
use loyalty_shared::config::AccrualConfig;
use loyalty_shared::error::{LoyaltyError, Result};
use loyalty_shared::observability::metrics;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::dto::AccrualOrderResponse;
use crate::models::{MAX_MONEY, MONEY_SCALE, OrderStatus, OrderVerdict};

/// 单次查询的结果
///
/// 除 `Verdict` 外都表示本轮没有结论，订单保持待对账状态。
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualResponse {
    Verdict(OrderVerdict),
    /// 204，尚未开始计算
    Pending,
    /// 429，`Retry-After` 仅用于日志
    RateLimited { retry_after: Option<Duration> },
    /// 其它状态码、传输失败或响应体无法识别
    Unavailable,
}

impl AccrualResponse {
    /// 指标标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Verdict(_) => "verdict",
            Self::Pending => "pending",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable => "unavailable",
        }
    }
}

/// accrual 服务接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// 查询单个订单，失败不返回错误，统一映射为 `Unavailable`
    async fn query(&self, order_number: &str) -> AccrualResponse;
}

/// 基于 reqwest 的实现
///
/// 请求超时由客户端统一设置，worker 在关闭时等待的最长时间也以此为上限。
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    pub fn new(config: &AccrualConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| LoyaltyError::Config(format!("创建 accrual HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }

    async fn send(&self, order_number: &str) -> AccrualResponse {
        let resp = match self.client.get(self.order_url(order_number)).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(order = order_number, error = %e, "accrual 请求失败");
                return AccrualResponse::Unavailable;
            }
        };

        match resp.status() {
            StatusCode::OK => match resp.json::<AccrualOrderResponse>().await {
                Ok(body) => into_verdict(order_number, body),
                Err(e) => {
                    warn!(order = order_number, error = %e, "accrual 响应体无法解析");
                    AccrualResponse::Unavailable
                }
            },
            StatusCode::NO_CONTENT => AccrualResponse::Pending,
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                AccrualResponse::RateLimited { retry_after }
            }
            status => {
                warn!(order = order_number, status = %status, "accrual 返回非预期状态码");
                AccrualResponse::Unavailable
            }
        }
    }
}

/// 校验响应体并转为结论
///
/// 订单号不一致、积分为负或超出存储上限都视为服务异常，本轮不采信。
fn into_verdict(order_number: &str, body: AccrualOrderResponse) -> AccrualResponse {
    if body.order != order_number {
        warn!(order = order_number, returned = %body.order, "accrual 返回的订单号不一致");
        return AccrualResponse::Unavailable;
    }

    let accrual = body.accrual.unwrap_or(Decimal::ZERO);
    if accrual < Decimal::ZERO {
        warn!(order = order_number, accrual = %accrual, "accrual 返回负积分");
        return AccrualResponse::Unavailable;
    }
    if accrual.round_dp(MONEY_SCALE) > MAX_MONEY {
        warn!(order = order_number, accrual = %accrual, "accrual 返回的积分超出存储上限");
        return AccrualResponse::Unavailable;
    }

    let status = OrderStatus::from(body.status);
    AccrualResponse::Verdict(OrderVerdict::new(order_number, status, accrual))
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn query(&self, order_number: &str) -> AccrualResponse {
        let start = Instant::now();
        let response = self.send(order_number).await;

        debug!(order = order_number, outcome = response.outcome(), "accrual 查询完成");
        metrics::record_accrual_query(response.outcome(), start.elapsed().as_secs_f64());

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccrualStatus;
    use rust_decimal_macros::dec;

    fn body(order: &str, status: AccrualStatus, accrual: Option<Decimal>) -> AccrualOrderResponse {
        AccrualOrderResponse {
            order: order.to_string(),
            status,
            accrual,
        }
    }

    #[test]
    fn test_processed_verdict() {
        let resp = into_verdict(
            "2000000000008",
            body("2000000000008", AccrualStatus::Processed, Some(dec!(500))),
        );
        assert_eq!(
            resp,
            AccrualResponse::Verdict(OrderVerdict::new(
                "2000000000008",
                OrderStatus::Processed,
                dec!(500)
            ))
        );
    }

    #[test]
    fn test_registered_maps_to_new() {
        let resp = into_verdict(
            "2000000000008",
            body("2000000000008", AccrualStatus::Registered, None),
        );
        match resp {
            AccrualResponse::Verdict(v) => {
                assert_eq!(v.status, OrderStatus::New);
                assert_eq!(v.accrual, Decimal::ZERO);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_order_is_unavailable() {
        let resp = into_verdict(
            "2000000000008",
            body("1000000000009", AccrualStatus::Processed, Some(dec!(1))),
        );
        assert_eq!(resp, AccrualResponse::Unavailable);
    }

    #[test]
    fn test_negative_accrual_is_unavailable() {
        let resp = into_verdict(
            "2000000000008",
            body("2000000000008", AccrualStatus::Processed, Some(dec!(-1))),
        );
        assert_eq!(resp, AccrualResponse::Unavailable);
    }

    #[test]
    fn test_accrual_beyond_storage_is_unavailable() {
        let resp = into_verdict(
            "2000000000008",
            body(
                "2000000000008",
                AccrualStatus::Processed,
                Some(dec!(50000000000)),
            ),
        );
        assert_eq!(resp, AccrualResponse::Unavailable);

        let resp = into_verdict(
            "2000000000008",
            body("2000000000008", AccrualStatus::Processed, Some(MAX_MONEY)),
        );
        assert!(matches!(resp, AccrualResponse::Verdict(_)));
    }

    #[test]
    fn test_order_url_trims_trailing_slash() {
        let client = HttpAccrualClient::new(&AccrualConfig {
            base_url: "http://accrual:8080/".to_string(),
            ..AccrualConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.order_url("2000000000008"),
            "http://accrual:8080/api/orders/2000000000008"
        );
    }
}
