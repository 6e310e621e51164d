//! 领域模型
//!
//! - `OrderNumber`: 经过 Luhn 校验的订单号
//! - `Order` / `OrderVerdict`: 订单及 accrual 给出的计算结论
//! - `Withdrawal` / `Balance`: 提现记录与派生余额
//! - `UploadOutcome` / `WithdrawalOutcome`: 返回给 HTTP 层的业务结果码

mod enums;
mod order;
mod order_number;
mod outcome;
mod user;
mod withdrawal;

pub use enums::{AccrualStatus, OrderStatus};
pub use order::{MAX_MONEY, MONEY_SCALE, Order, OrderVerdict};
pub use order_number::{MAX_ORDER_NUMBER_LEN, OrderNumber};
pub use outcome::{UploadOutcome, WithdrawalOutcome};
pub use user::UserRecord;
pub use withdrawal::{Balance, Withdrawal};
