//! 订单号
//!
//! 订单号由外部系统签发，为带 Luhn 校验位的纯数字串。

use std::fmt;

use loyalty_shared::error::LoyaltyError;

/// 订单号最大长度，与存储的 VARCHAR(32) 一致
pub const MAX_ORDER_NUMBER_LEN: usize = 32;

/// 通过 Luhn 校验的订单号
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// 解析并校验订单号，忽略首尾空白
    pub fn parse(raw: &str) -> Result<Self, LoyaltyError> {
        let number = raw.trim();

        if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LoyaltyError::InvalidOrderNumber(format!(
                "订单号必须为至少两位的数字: {:?}",
                number
            )));
        }
        if number.len() > MAX_ORDER_NUMBER_LEN {
            return Err(LoyaltyError::InvalidOrderNumber(format!(
                "订单号最长 {} 位: {}",
                MAX_ORDER_NUMBER_LEN, number
            )));
        }
        if !luhn_valid(number) {
            return Err(LoyaltyError::InvalidOrderNumber(format!(
                "订单号校验位错误: {}",
                number
            )));
        }

        Ok(Self(number.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Luhn 校验：从右往左，偶数位翻倍（超过 9 减 9），总和能被 10 整除
fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
