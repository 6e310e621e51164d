//! 业务结果码
//!
//! 由服务层返回、HTTP 层映射为状态码。这些是预期内的业务结果，不是错误。

/// 上传订单结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 新订单已接受，等待计算
    Accepted,
    /// 当前用户此前已上传过
    AlreadyUploadedByOwner,
    /// 订单号已被其他用户占用
    AlreadyUploadedByOther,
}

/// 提现结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Accepted,
    /// 可用余额不足
    InsufficientBalance,
    /// 该订单号已经提现过
    DuplicateWithdrawal,
}

impl WithdrawalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::InsufficientBalance => "insufficient_balance",
            Self::DuplicateWithdrawal => "duplicate",
        }
    }
}
