//! 订单与积分账户服务

use std::sync::Arc;

use loyalty_shared::error::{LoyaltyError, Result};
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::models::{
    Balance, MAX_MONEY, MONEY_SCALE, Order, OrderNumber, UploadOutcome, Withdrawal,
    WithdrawalOutcome,
};
use crate::repository::OrderStore;

/// 订单与积分账户服务
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    cancel: watch::Receiver<bool>,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        retry: RetryPolicy,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            retry,
            cancel,
        }
    }

    fn policy(&self) -> RetryPolicy {
        self.retry.clone().with_cancellation(self.cancel.clone())
    }

    /// 上传订单号
    ///
    /// 订单号无法通过 Luhn 校验时返回 `LoyaltyError::InvalidOrderNumber`
    #[instrument(skip(self))]
    pub async fn upload_order(&self, owner: &str, raw_number: &str) -> Result<UploadOutcome> {
        let number = OrderNumber::parse(raw_number)?;

        let outcome = self
            .policy()
            .execute("upload_order", || {
                self.store.upload_order(number.as_str(), owner)
            })
            .await?;

        if outcome == UploadOutcome::Accepted {
            info!(order = %number, "订单已受理，等待积分计算");
        }
        Ok(outcome)
    }

    pub async fn get_orders(&self, owner: &str) -> Result<Vec<Order>> {
        self.policy()
            .execute("list_orders", || self.store.list_orders(owner))
            .await
    }

    pub async fn get_balance(&self, owner: &str) -> Result<Balance> {
        self.policy()
            .execute("compute_balance", || self.store.compute_balance(owner))
            .await
    }

    /// 申请积分提现
    ///
    /// 余额检查和重复检查由存储在同一事务内完成
    #[instrument(skip(self))]
    pub async fn request_withdrawal(
        &self,
        owner: &str,
        raw_number: &str,
        amount: Decimal,
    ) -> Result<WithdrawalOutcome> {
        let number = OrderNumber::parse(raw_number)?;
        if amount <= Decimal::ZERO {
            return Err(LoyaltyError::Validation(format!(
                "提现金额必须大于 0: {amount}"
            )));
        }
        if amount.normalize().scale() > MONEY_SCALE {
            return Err(LoyaltyError::Validation(format!(
                "提现金额最多保留两位小数: {amount}"
            )));
        }
        if amount > MAX_MONEY {
            return Err(LoyaltyError::Validation(format!(
                "提现金额超出上限 {MAX_MONEY}: {amount}"
            )));
        }

        let withdrawal = Withdrawal::new(number.into_inner(), owner, amount);
        let outcome = self
            .policy()
            .execute("record_withdrawal", || {
                self.store.record_withdrawal(&withdrawal)
            })
            .await?;

        metrics::record_withdrawal(outcome.as_str());
        info!(outcome = outcome.as_str(), "提现请求处理完成");
        Ok(outcome)
    }

    pub async fn get_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>> {
        self.policy()
            .execute("list_withdrawals", || self.store.list_withdrawals(owner))
            .await
    }

    /// 存储连通性检查
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
