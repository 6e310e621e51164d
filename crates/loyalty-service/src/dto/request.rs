//! 请求 DTO

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

/// 注册/登录请求
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(length(min = 1, max = 64, message = "登录名长度必须在 1-64 之间"))]
    pub login: String,
    #[validate(length(min = 1, max = 128, message = "密码长度必须在 1-128 之间"))]
    pub password: String,
}

/// 提现请求
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}
