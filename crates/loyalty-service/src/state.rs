//! 应用状态

use std::sync::Arc;

use loyalty_shared::retry::RetryPolicy;
use tokio::sync::watch;

use crate::auth::JwtManager;
use crate::repository::{OrderStore, UserStore};
use crate::service::{LedgerService, UserService};

/// Axum 路由共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
    pub users: UserService,
}

impl AppState {
    pub fn new(ledger: LedgerService, users: UserService) -> Self {
        Self { ledger, users }
    }

    /// 基于同一组存储和重试策略组装全部服务
    pub fn build(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
        jwt: JwtManager,
        retry: RetryPolicy,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger: LedgerService::new(orders, retry.clone(), cancel.clone()),
            users: UserService::new(users, jwt, retry, cancel),
        }
    }
}
