//! 订单模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// 金额精度，与存储的 NUMERIC(12, 2) 一致
pub const MONEY_SCALE: u32 = 2;

/// 存储可容纳的最大金额，即 NUMERIC(12, 2) 的 9999999999.99
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_SCALE);

/// 订单
///
/// 由首次上传的用户独占。状态和积分只由同步引擎修改，进入终态后不再变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub number: String,
    /// 上传者登录名
    pub owner: String,
    pub status: OrderStatus,
    /// 积分，只有 PROCESSED 时大于 0
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    pub fn new(number: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            owner: owner.into(),
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// accrual 对单个订单给出的结论，由 worker 产出、批量写回存储
#[derive(Debug, Clone, PartialEq)]
pub struct OrderVerdict {
    pub number: String,
    pub status: OrderStatus,
    pub accrual: Decimal,
}

impl OrderVerdict {
    /// 构造结论，非 PROCESSED 的积分一律归零，负数积分视为 0，保留两位小数
    pub fn new(number: impl Into<String>, status: OrderStatus, accrual: Decimal) -> Self {
        let accrual = if status == OrderStatus::Processed && accrual > Decimal::ZERO {
            accrual.round_dp(MONEY_SCALE)
        } else {
            Decimal::ZERO
        };
        Self {
            number: number.into(),
            status,
            accrual,
        }
    }

    /// 与存储中的订单相比是否有变化
    pub fn changes(&self, order: &Order) -> bool {
        self.status != order.status || self.accrual != order.accrual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_is_pending() {
        let order = Order::new("2000000000008", "alice");
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.accrual, Decimal::ZERO);
        assert!(order.is_pending());
    }

    #[test]
    fn test_verdict_only_processed_carries_accrual() {
        let processed = OrderVerdict::new("1", OrderStatus::Processed, dec!(500));
        assert_eq!(processed.accrual, dec!(500));

        let processing = OrderVerdict::new("1", OrderStatus::Processing, dec!(500));
        assert_eq!(processing.accrual, Decimal::ZERO);

        let negative = OrderVerdict::new("1", OrderStatus::Processed, dec!(-3));
        assert_eq!(negative.accrual, Decimal::ZERO);

        let fractional = OrderVerdict::new("1", OrderStatus::Processed, dec!(729.985));
        assert_eq!(fractional.accrual, dec!(729.98));
    }

    #[test]
    fn test_max_money_matches_column() {
        assert_eq!(MAX_MONEY, dec!(9999999999.99));
    }

    #[test]
    fn test_verdict_changes() {
        let order = Order::new("2000000000008", "alice");
        let same = OrderVerdict::new("2000000000008", OrderStatus::New, Decimal::ZERO);
        let done = OrderVerdict::new("2000000000008", OrderStatus::Processed, dec!(1.5));
        assert!(!same.changes(&order));
        assert!(done.changes(&order));
    }
}
