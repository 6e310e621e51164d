//! 积分系统服务入口
//!
//! 启动顺序：配置 → 可观测性 → 数据库连接与迁移 → 同步引擎 → HTTP 服务。
//! 收到 SIGINT/SIGTERM 后先停止接收新请求，再通知同步引擎退出并等待其写回，最后关闭连接池。

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use loyalty_service::{
    AppState, MIGRATOR,
    accrual::HttpAccrualClient,
    auth::{JwtConfig, JwtManager},
    build_router,
    repository::{MemoryStore, OrderStore, PgOrderStore, PgUserStore, UserStore},
    sync::{SyncEngine, SyncSettings},
};
use loyalty_shared::{
    config::AppConfig, database::Database, observability, retry::RetryPolicy, shutdown,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

const SERVICE_NAME: &str = "loyalty-service";

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Postgres,
    /// 进程内存储，仅用于本地开发
    Memory,
}

/// 积分系统服务
///
/// 命令行参数覆盖配置文件和 LOYALTY_ 环境变量，
/// 但 RUN_ADDRESS、DATABASE_URI、ACCRUAL_SYSTEM_ADDRESS、READING_ACCRUAL_INTERVAL 优先于命令行。
#[derive(Parser, Debug)]
#[command(name = SERVICE_NAME)]
#[command(version, about = "积分系统服务")]
struct Cli {
    /// HTTP 监听地址 (host:port)
    #[arg(short = 'a', long = "addr")]
    addr: Option<String>,

    /// PostgreSQL 连接串
    #[arg(short = 'd', long = "database-uri")]
    database_uri: Option<String>,

    /// accrual 服务地址
    #[arg(short = 'r', long = "accrual-address")]
    accrual_address: Option<String>,

    /// 对账轮询间隔（秒）
    #[arg(short = 'i', long = "accrual-interval")]
    accrual_interval: Option<u64>,

    /// 存储后端
    #[arg(long, value_enum, default_value_t = StoreKind::Postgres)]
    store: StoreKind,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(addr) = &self.addr {
            config.set_run_address(addr)?;
        }
        if let Some(uri) = &self.database_uri {
            config.database.url = uri.clone();
        }
        if let Some(addr) = &self.accrual_address {
            config.accrual.base_url = addr.clone();
        }
        if let Some(interval) = self.accrual_interval {
            config.sync.poll_interval_secs = interval;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;
    cli.apply(&mut config)?;
    config.apply_env_overrides().context("环境变量无效")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let default_secret = loyalty_shared::config::AuthConfig::default().jwt_secret;
    if config.auth.jwt_secret == default_secret {
        if config.is_production() {
            anyhow::bail!("生产环境必须通过 LOYALTY_AUTH__JWT_SECRET 设置 JWT 密钥");
        }
        warn!("Using default JWT secret - set LOYALTY_AUTH__JWT_SECRET for production");
    }

    // 存储不可达是唯一的致命启动错误
    let (order_store, user_store, db): (Arc<dyn OrderStore>, Arc<dyn UserStore>, _) =
        match cli.store {
            StoreKind::Postgres => {
                let db = Database::connect(&config.database)
                    .await
                    .context("连接数据库失败")?;
                MIGRATOR.run(db.pool()).await.context("数据库迁移失败")?;
                info!("Database migrations applied");

                let orders: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(db.pool().clone()));
                let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db.pool().clone()));
                (orders, users, Some(db))
            }
            StoreKind::Memory => {
                warn!("Using in-memory store - data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                let orders: Arc<dyn OrderStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                (orders, users, None)
            }
        };

    let (cancel_tx, cancel_rx) = shutdown::channel();
    let retry = RetryPolicy::from_config(&config.retry);

    let accrual = Arc::new(HttpAccrualClient::new(&config.accrual)?);
    let engine = SyncEngine::spawn(
        order_store.clone(),
        accrual,
        SyncSettings::from_config(&config.sync),
        retry.clone(),
        cancel_rx.clone(),
    );

    let jwt = JwtManager::new(JwtConfig::from(&config.auth));
    let state = AppState::build(order_store, user_store, jwt, retry, cancel_rx);
    let app = build_router(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for sync engine");
    // 接收端都已持有同一通道，发送失败说明已无任务在运行
    let _ = cancel_tx.send(true);
    engine.join().await;

    if let Some(db) = db {
        db.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// 监听关闭信号
///
/// 容器编排通过 SIGTERM 通知停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
