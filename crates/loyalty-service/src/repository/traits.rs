//! 存储 Trait 定义
//!
//! 服务层和同步引擎只依赖这里的抽象，便于 mock 测试

use async_trait::async_trait;
use loyalty_shared::error::Result;

use crate::models::{
    Balance, Order, OrderVerdict, UploadOutcome, UserRecord, Withdrawal, WithdrawalOutcome,
};

/// 订单存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 待对账订单（NEW / PROCESSING），按上传时间升序
    async fn fetch_pending_orders(&self) -> Result<Vec<Order>>;

    /// 在一个事务内写回整批结论，返回实际更新的行数
    ///
    /// 已进入终态的订单不会被覆盖，对应行计为未更新而不是失败。
    async fn persist_verdicts(&self, verdicts: &[OrderVerdict]) -> Result<u64>;

    async fn compute_balance(&self, owner: &str) -> Result<Balance>;

    /// 原子地检查重复提现与余额后写入提现记录
    async fn record_withdrawal(&self, withdrawal: &Withdrawal) -> Result<WithdrawalOutcome>;

    async fn upload_order(&self, number: &str, owner: &str) -> Result<UploadOutcome>;

    async fn list_orders(&self, owner: &str) -> Result<Vec<Order>>;

    async fn list_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>>;

    /// 存储连通性检查
    async fn ping(&self) -> Result<()>;
}

/// 用户存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 登录名重复时返回 `LoyaltyError::AlreadyExists`
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()>;

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>>;
}
