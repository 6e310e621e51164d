//! accrual 服务的响应体

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::AccrualStatus;

/// `GET /api/orders/{number}` 200 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualOrderResponse {
    pub order: String,
    pub status: AccrualStatus,
    /// 只有 PROCESSED 时存在
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_processed() {
        let body = r#"{"order":"2000000000008","status":"PROCESSED","accrual":729.98}"#;
        let resp: AccrualOrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, AccrualStatus::Processed);
        assert_eq!(resp.accrual, Some(dec!(729.98)));
    }

    #[test]
    fn test_deserialize_without_accrual() {
        let body = r#"{"order":"2000000000008","status":"REGISTERED"}"#;
        let resp: AccrualOrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, AccrualStatus::Registered);
        assert_eq!(resp.accrual, None);
    }
}
