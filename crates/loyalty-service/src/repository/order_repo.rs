//! 订单仓储（PostgreSQL）
//!
//! 订单、提现与余额查询。写操作都在单个事务内完成，
//! 并发提现通过锁定用户行串行化。

use async_trait::async_trait;
use loyalty_shared::error::{LoyaltyError, Result};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, instrument};

use super::traits::OrderStore;
use crate::models::{
    Balance, Order, OrderVerdict, UploadOutcome, Withdrawal, WithdrawalOutcome,
};

/// 订单仓储
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出待对账订单
    pub async fn fetch_pending_orders(&self) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, owner, status, accrual, uploaded_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// 批量写回结论
    ///
    /// 整批一个事务：任一行失败则整批回滚，这些订单保持待对账状态，
    /// 下一轮调度会重新发现它们。`status IN (...)` 条件保证终态订单不被覆盖。
    #[instrument(skip(self, verdicts), fields(batch_size = verdicts.len()))]
    pub async fn persist_verdicts(&self, verdicts: &[OrderVerdict]) -> Result<u64> {
        if verdicts.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for verdict in verdicts {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET status = $2, accrual = $3
                WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
                "#,
            )
            .bind(&verdict.number)
            .bind(verdict.status)
            .bind(verdict.accrual)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(order = %verdict.number, "订单已是终态或不存在，跳过");
            }
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// 计算用户余额
    pub async fn compute_balance(&self, owner: &str) -> Result<Balance> {
        let mut conn = self.pool.acquire().await?;
        Self::compute_balance_in_tx(&mut *conn, owner).await
    }

    /// 在事务中计算余额
    async fn compute_balance_in_tx(conn: &mut PgConnection, owner: &str) -> Result<Balance> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE((SELECT SUM(accrual) FROM orders
                          WHERE owner = $1 AND status = 'PROCESSED'), 0) AS earned,
                COALESCE((SELECT SUM(amount) FROM withdrawals
                          WHERE owner = $1), 0) AS withdrawn
            "#,
        )
        .bind(owner)
        .fetch_one(conn)
        .await?;

        let earned: Decimal = row.try_get("earned")?;
        let withdrawn: Decimal = row.try_get("withdrawn")?;
        Ok(Balance::new(earned, withdrawn))
    }

    /// 记录提现
    ///
    /// 先锁定用户行（FOR UPDATE），同一用户的并发提现在此排队，
    /// 之后的重复检查与余额检查都基于已提交的最新数据。
    /// 不同用户对同一订单号的竞争由 withdrawals.order_number 的唯一约束兜底。
    #[instrument(skip(self, withdrawal), fields(owner = %withdrawal.owner, order = %withdrawal.order_number))]
    pub async fn record_withdrawal(&self, withdrawal: &Withdrawal) -> Result<WithdrawalOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("SELECT login FROM users WHERE login = $1 FOR UPDATE")
            .bind(&withdrawal.owner)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(LoyaltyError::NotFound {
                entity: "User".to_string(),
                id: withdrawal.owner.clone(),
            });
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM withdrawals WHERE order_number = $1)",
        )
        .bind(&withdrawal.order_number)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Ok(WithdrawalOutcome::DuplicateWithdrawal);
        }

        let balance = Self::compute_balance_in_tx(&mut *tx, &withdrawal.owner).await?;
        if !balance.covers(withdrawal.amount) {
            debug!(current = %balance.current(), amount = %withdrawal.amount, "余额不足");
            return Ok(WithdrawalOutcome::InsufficientBalance);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO withdrawals (order_number, owner, amount, processed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&withdrawal.order_number)
        .bind(&withdrawal.owner)
        .bind(withdrawal.amount)
        .bind(withdrawal.processed_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) => {
                let err = LoyaltyError::from(e);
                if err.is_unique_violation() {
                    return Ok(WithdrawalOutcome::DuplicateWithdrawal);
                }
                return Err(err);
            }
        }

        tx.commit().await?;
        Ok(WithdrawalOutcome::Accepted)
    }

    /// 上传订单
    ///
    /// 插入冲突时再查归属，区分本人重复上传与他人占用
    pub async fn upload_order(&self, number: &str, owner: &str) -> Result<UploadOutcome> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (number, owner, status, accrual, uploaded_at)
            VALUES ($1, $2, 'NEW', 0, NOW())
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(number)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(UploadOutcome::Accepted);
        }

        let existing: String = sqlx::query_scalar("SELECT owner FROM orders WHERE number = $1")
            .bind(number)
            .fetch_one(&self.pool)
            .await?;

        if existing == owner {
            Ok(UploadOutcome::AlreadyUploadedByOwner)
        } else {
            Ok(UploadOutcome::AlreadyUploadedByOther)
        }
    }

    /// 用户的订单，按上传时间升序
    pub async fn list_orders(&self, owner: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, owner, status, accrual, uploaded_at
            FROM orders
            WHERE owner = $1
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// 用户的提现记录，按处理时间升序
    pub async fn list_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT order_number, owner, amount, processed_at
            FROM withdrawals
            WHERE owner = $1
            ORDER BY processed_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn fetch_pending_orders(&self) -> Result<Vec<Order>> {
        self.fetch_pending_orders().await
    }

    async fn persist_verdicts(&self, verdicts: &[OrderVerdict]) -> Result<u64> {
        self.persist_verdicts(verdicts).await
    }

    async fn compute_balance(&self, owner: &str) -> Result<Balance> {
        self.compute_balance(owner).await
    }

    async fn record_withdrawal(&self, withdrawal: &Withdrawal) -> Result<WithdrawalOutcome> {
        self.record_withdrawal(withdrawal).await
    }

    async fn upload_order(&self, number: &str, owner: &str) -> Result<UploadOutcome> {
        self.upload_order(number, owner).await
    }

    async fn list_orders(&self, owner: &str) -> Result<Vec<Order>> {
        self.list_orders(owner).await
    }

    async fn list_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>> {
        self.list_withdrawals(owner).await
    }

    async fn ping(&self) -> Result<()> {
        self.ping().await
    }
}
