//! 在途订单集合
//!
//! 调度器派发前登记，worker 查询结束后释放。订单在队列中或正在查询时，
//! 后续 tick 不会再次派发，避免在限流期间重复消耗 accrual 配额。

use std::sync::Arc;

use dashmap::DashSet;

#[derive(Debug, Clone, Default)]
pub struct InFlightOrders {
    inner: Arc<DashSet<String>>,
}

impl InFlightOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记订单，已在途时返回 false
    pub fn try_claim(&self, number: &str) -> bool {
        self.inner.insert(number.to_string())
    }

    pub fn release(&self, number: &str) {
        self.inner.remove(number);
    }

    pub fn contains(&self, number: &str) -> bool {
        self.inner.contains(number)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
