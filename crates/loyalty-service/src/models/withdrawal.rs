//! 提现与余额模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 积分提现记录
///
/// 每个订单号最多提现一次，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    /// 被抵扣的订单号
    pub order_number: String,
    pub owner: String,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(order_number: impl Into<String>, owner: impl Into<String>, amount: Decimal) -> Self {
        Self {
            order_number: order_number.into(),
            owner: owner.into(),
            amount,
            processed_at: Utc::now(),
        }
    }
}

/// 用户余额（派生值，不落库）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    /// 所有 PROCESSED 订单积分之和
    pub earned: Decimal,
    /// 所有提现金额之和
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn new(earned: Decimal, withdrawn: Decimal) -> Self {
        Self { earned, withdrawn }
    }

    /// 可用余额
    pub fn current(&self) -> Decimal {
        self.earned - self.withdrawn
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.current() >= amount
    }
}
