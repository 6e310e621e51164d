//! 请求和响应 DTO

mod request;
mod response;

pub use request::{CredentialsRequest, WithdrawRequest};
pub use response::{BalanceResponse, OrderResponse, WithdrawalResponse};
