//! Mock Accrual Service
//!
//! 本地模拟外部积分计算服务，协议与真实服务一致，用于开发和客户端测试。
//!
//! - `GET /api/orders/{number}`：200 返回结论，204 未受理，429 超出每分钟请求配额
//! - `POST /api/orders`：登记一个订单的结论 `{order, status, accrual?}`
//!
//! # 使用示例
//!
//! ```rust
//! use mock_accrual::{AccrualState, OrderState, router};
//!
//! let state = AccrualState::new(0);
//! state.register("2000000000008", OrderState::Processing, None);
//! let app = router(state);
//! ```

pub mod limiter;
pub mod models;
pub mod routes;
pub mod store;

pub use limiter::RateLimiter;
pub use models::{AccrualOrder, OrderState};
pub use routes::{AccrualState, router};
pub use store::MemoryStore;
