//! 用户模型

/// 用户记录，密码仅保存 bcrypt 哈希
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub login: String,
    pub password_hash: String,
}
