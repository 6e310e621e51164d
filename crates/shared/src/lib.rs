//! 共享库
//!
//! 包含积分服务与 mock 服务共用的配置、错误处理、重试策略、数据库连接、可观测性等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod retry;
pub mod shutdown;
