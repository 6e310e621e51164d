//! 存储层
//!
//! 订单、提现与用户的数据访问。
//!
//! - 仓储只负责持久化与原子性约束，不做重试，重试由调用方通过 `RetryPolicy` 包装
//! - 余额不变量（不可透支、同一订单只能提现一次）由存储的事务隔离保证
//! - PostgreSQL 实现用于生产，内存实现用于测试与本地开发

mod memory;
mod order_repo;
mod traits;
mod user_repo;

pub use memory::MemoryStore;
pub use order_repo::PgOrderStore;
pub use traits::*;
pub use user_repo::PgUserStore;
