//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! `is_transient` 是重试策略的默认分类器：只有连接/可用性类故障才会被重试，
//! 约束冲突、参数校验等永久性错误直接返回给调用方。

use thiserror::Error;

/// PostgreSQL 唯一约束冲突
const PG_UNIQUE_VIOLATION: &str = "23505";

/// 系统错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // ==================== 存储错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} {field}={value}")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("订单号格式无效: {0}")]
    InvalidOrderNumber(String),

    // ==================== 权限错误 ====================
    #[error("未授权访问: {0}")]
    Unauthorized(String),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    // ==================== 通用错误 ====================
    #[error("操作已取消")]
    Cancelled,

    #[error("配置错误: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为瞬时错误（连接中断、连接池耗尽、数据库暂不可用）
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => is_transient_sqlx(err),
            _ => false,
        }
    }

    /// 是否为唯一约束冲突
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
            }
            Self::AlreadyExists { .. } => true,
            _ => false,
        }
    }

    /// 是否为取消信号导致的结束
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// sqlx 错误分类
///
/// SQLSTATE 08xxx 为连接异常；57P01-57P03 为数据库关闭/重启中；
/// 40001/40P01 为序列化失败与死锁，事务整体回滚后重放是安全的。
fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => {
                code.starts_with("08")
                    || matches!(code.as_ref(), "57P01" | "57P02" | "57P03" | "40001" | "40P01")
            }
            None => false,
        },
        _ => false,
    }
}
