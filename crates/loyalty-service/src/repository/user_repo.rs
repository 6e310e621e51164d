//! 用户仓储（PostgreSQL）

use async_trait::async_trait;
use loyalty_shared::error::{LoyaltyError, Result};
use sqlx::PgPool;

use super::traits::UserStore;
use crate::models::UserRecord;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("INSERT INTO users (login, password_hash) VALUES ($1, $2)")
            .bind(login)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = LoyaltyError::from(e);
                if err.is_unique_violation() {
                    Err(LoyaltyError::AlreadyExists {
                        entity: "User".to_string(),
                        field: "login".to_string(),
                        value: login.to_string(),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn find_user(&self, login: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT login, password_hash FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
