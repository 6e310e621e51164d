//! 模拟订单结论

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// accrual 侧的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// 已登记，尚未开始计算
    Registered,
    Invalid,
    Processing,
    Processed,
}

/// `GET /api/orders/{number}` 的响应体，也是 `POST /api/orders` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualOrder {
    pub order: String,
    pub status: OrderState,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
}

impl AccrualOrder {
    /// 只有 PROCESSED 的订单携带积分
    pub fn new(order: impl Into<String>, status: OrderState, accrual: Option<Decimal>) -> Self {
        let accrual = match status {
            OrderState::Processed => accrual,
            _ => None,
        };
        Self {
            order: order.into(),
            status,
            accrual,
        }
    }
}
