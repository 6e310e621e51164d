//! Mock Accrual CLI
//!
//! 启动模拟积分计算服务。

use clap::Parser;
use mock_accrual::{AccrualState, router};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mock-accrual", version, about = "模拟积分计算服务")]
struct Cli {
    /// 监听端口
    #[arg(short, long, default_value_t = 8081, env = "MOCK_ACCRUAL_PORT")]
    port: u16,

    /// 每分钟允许的查询数，0 表示不限流
    #[arg(long, default_value_t = 0, env = "MOCK_ACCRUAL_RPM")]
    rpm: u32,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 优先使用环境变量 RUST_LOG，否则使用命令行参数指定的级别
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .init();

    let app = router(AccrualState::new(cli.rpm));

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, rpm = cli.rpm, "Mock accrual service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
