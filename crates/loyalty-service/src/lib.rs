//! 积分系统服务
//!
//! 用户上传订单号，外部 accrual 服务异步计算每个订单的积分，
//! 本服务负责把计算结果同步回来，并维护用户的积分余额与提现记录。
//!
//! ## 模块结构
//!
//! - `models`: 订单、提现、余额等领域模型
//! - `repository`: 存储抽象及 PostgreSQL / 内存实现
//! - `accrual`: 外部 accrual 服务客户端
//! - `sync`: 订单积分同步引擎（调度器、worker 池、批量写回）
//! - `service`: 账户与用户服务
//! - `auth` / `middleware`: JWT 认证
//! - `handlers` / `routes` / `dto`: HTTP API

pub mod accrual;
pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod sync;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;

/// 启动时执行的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
