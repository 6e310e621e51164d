//! 内存存储
//!
//! 同时实现 `OrderStore` 与 `UserStore`，适用于测试和本地开发（`--store memory`）。
//! 所有状态放在一把 `tokio::sync::Mutex` 后面，每个操作整体持锁执行，
//! 因此余额检查与重复提现检查和 PostgreSQL 实现一样是原子的。

use std::collections::HashMap;

use async_trait::async_trait;
use loyalty_shared::error::{LoyaltyError, Result};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::traits::{OrderStore, UserStore};
use crate::models::{
    Balance, Order, OrderStatus, OrderVerdict, UploadOutcome, UserRecord, Withdrawal,
    WithdrawalOutcome,
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    /// 按上传顺序保存
    orders: Vec<Order>,
    order_index: HashMap<String, usize>,
    withdrawals: Vec<Withdrawal>,
}

impl Inner {
    fn balance(&self, owner: &str) -> Balance {
        let earned = self
            .orders
            .iter()
            .filter(|o| o.owner == owner && o.status == OrderStatus::Processed)
            .map(|o| o.accrual)
            .sum::<Decimal>();
        let withdrawn = self
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .map(|w| w.amount)
            .sum::<Decimal>();
        Balance::new(earned, withdrawn)
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按订单号读取，测试中用于检查同步结果
    pub async fn get_order(&self, number: &str) -> Option<Order> {
        let inner = self.inner.lock().await;
        inner
            .order_index
            .get(number)
            .map(|&idx| inner.orders[idx].clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn fetch_pending_orders(&self) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.iter().filter(|o| o.is_pending()).cloned().collect())
    }

    async fn persist_verdicts(&self, verdicts: &[OrderVerdict]) -> Result<u64> {
        let mut inner = self.inner.lock().await;

        // 与 PostgreSQL 实现一致：未知订单和终态订单跳过，不影响同批其它订单
        let mut updated = 0;
        for verdict in verdicts {
            let Some(&idx) = inner.order_index.get(&verdict.number) else {
                continue;
            };
            let order = &mut inner.orders[idx];
            if order.is_pending() {
                order.status = verdict.status;
                order.accrual = verdict.accrual;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn compute_balance(&self, owner: &str) -> Result<Balance> {
        let inner = self.inner.lock().await;
        Ok(inner.balance(owner))
    }

    async fn record_withdrawal(&self, withdrawal: &Withdrawal) -> Result<WithdrawalOutcome> {
        let mut inner = self.inner.lock().await;

        if !inner.users.contains_key(&withdrawal.owner) {
            return Err(LoyaltyError::NotFound {
                entity: "User".to_string(),
                id: withdrawal.owner.clone(),
            });
        }
        if inner
            .withdrawals
            .iter()
            .any(|w| w.order_number == withdrawal.order_number)
        {
            return Ok(WithdrawalOutcome::DuplicateWithdrawal);
        }
        if !inner.balance(&withdrawal.owner).covers(withdrawal.amount) {
            return Ok(WithdrawalOutcome::InsufficientBalance);
        }

        inner.withdrawals.push(withdrawal.clone());
        Ok(WithdrawalOutcome::Accepted)
    }

    async fn upload_order(&self, number: &str, owner: &str) -> Result<UploadOutcome> {
        let mut inner = self.inner.lock().await;

        if let Some(&idx) = inner.order_index.get(number) {
            return Ok(if inner.orders[idx].owner == owner {
                UploadOutcome::AlreadyUploadedByOwner
            } else {
                UploadOutcome::AlreadyUploadedByOther
            });
        }

        let order = Order::new(number, owner);
        let idx = inner.orders.len();
        inner.orders.push(order);
        inner.order_index.insert(number.to_string(), idx);
        Ok(UploadOutcome::Accepted)
    }

    async fn list_orders(&self, owner: &str) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.iter().filter(|o| o.owner == owner).cloned().collect())
    }

    async fn list_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .withdrawals
            .iter()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(login) {
            return Err(LoyaltyError::AlreadyExists {
                entity: "User".to_string(),
                field: "login".to_string(),
                value: login.to_string(),
            });
        }
        inner.users.insert(
            login.to_string(),
            UserRecord {
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(login).cloned())
    }
}
