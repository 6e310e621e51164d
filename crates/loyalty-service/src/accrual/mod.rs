//! 外部 accrual 服务客户端
//!
//! `GET {base}/api/orders/{number}` 的响应映射：
//!
//! | 状态码 | 结果 |
//! |---|---|
//! | 200 | `Verdict` |
//! | 204 | `Pending` |
//! | 429 | `RateLimited`，本轮放弃，等下一次调度 |
//! | 其它 / 传输失败 | `Unavailable`，本轮放弃 |

mod client;
mod dto;

pub use client::{AccrualClient, AccrualResponse, HttpAccrualClient};
pub use dto::AccrualOrderResponse;

#[cfg(test)]
pub use client::MockAccrualClient;
