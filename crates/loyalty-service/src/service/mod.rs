//! 服务层
//!
//! HTTP 层只依赖这里的服务。每次存储调用都包一层新的 `RetryPolicy`，
//! 并绑定进程的关闭信号，返回枚举化的业务结果由 HTTP 层映射状态码。

mod ledger_service;
mod user_service;

pub use ledger_service::LedgerService;
pub use user_service::UserService;
