//! 认证模块
//!
//! bcrypt 密码哈希与 JWT 签发/校验

mod jwt;
mod password;

pub use jwt::{Claims, JwtConfig, JwtManager};
pub use password::{hash_password, verify_password};
