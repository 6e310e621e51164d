//! 用户注册与登录

use std::sync::Arc;

use loyalty_shared::error::{LoyaltyError, Result};
use loyalty_shared::retry::RetryPolicy;
use tokio::sync::watch;
use tracing::info;

use crate::auth::{JwtManager, hash_password, verify_password};
use crate::repository::UserStore;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    jwt: JwtManager,
    retry: RetryPolicy,
    cancel: watch::Receiver<bool>,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        jwt: JwtManager,
        retry: RetryPolicy,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            jwt,
            retry,
            cancel,
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    fn policy(&self) -> RetryPolicy {
        self.retry.clone().with_cancellation(self.cancel.clone())
    }

    /// 注册并返回 Token
    ///
    /// 登录名已被占用时返回 `LoyaltyError::AlreadyExists`
    pub async fn register(&self, login: &str, password: &str) -> Result<String> {
        let password_hash = hash_password(password)?;

        self.policy()
            .execute("create_user", || {
                self.store.create_user(login, &password_hash)
            })
            .await?;

        info!(login, "用户注册成功");
        self.jwt.generate_token(login)
    }

    /// 校验登录名和密码并返回 Token
    pub async fn login(&self, login: &str, password: &str) -> Result<String> {
        let user = self
            .policy()
            .execute("find_user", || self.store.find_user(login))
            .await?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid_credentials());
        }

        self.jwt.generate_token(&user.login)
    }
}

fn invalid_credentials() -> LoyaltyError {
    LoyaltyError::Unauthorized("用户名或密码错误".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::models::UserRecord;
    use crate::repository::{MemoryStore, MockUserStore};
    use loyalty_shared::shutdown;
    use std::time::Duration;

    fn service(store: Arc<dyn UserStore>) -> UserService {
        let (_tx, rx) = shutdown::channel();
        UserService::new(
            store,
            JwtManager::new(JwtConfig {
                secret: "test-secret".to_string(),
                expires_in_secs: 3600,
            }),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1)),
            rx,
        )
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let svc = service(Arc::new(MemoryStore::new()));

        let token = svc.register("alice", "pw").await.unwrap();
        assert_eq!(svc.jwt().verify_token(&token).unwrap().sub, "alice");

        let token = svc.login("alice", "pw").await.unwrap();
        assert_eq!(svc.jwt().verify_token(&token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_login_is_not_retried() {
        let mut store = MockUserStore::new();
        store.expect_create_user().times(1).returning(|login, _| {
            Err(LoyaltyError::AlreadyExists {
                entity: "User".to_string(),
                field: "login".to_string(),
                value: login.to_string(),
            })
        });

        let err = service(Arc::new(store))
            .register("alice", "pw")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let hash = hash_password("right").unwrap();
        let mut store = MockUserStore::new();
        store.expect_find_user().returning(move |login| {
            Ok(Some(UserRecord {
                login: login.to_string(),
                password_hash: hash.clone(),
            }))
        });

        let err = service(Arc::new(store))
            .login("alice", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let mut store = MockUserStore::new();
        store.expect_find_user().returning(|_| Ok(None));

        let err = service(Arc::new(store))
            .login("ghost", "pw")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
