//! ethflow 主入口

use std::sync::Arc;

use anyhow::{Context, Result};
use ethflow::{
    api,
    config::{Config, StorageBackend},
    infrastructure::{db, logging},
    service::chain_gateway::EthersGateway,
    AppState, Repositories,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量与配置文件
    dotenvy::dotenv().ok();
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    // 2. 初始化日志
    logging::init_logging(&config.logging)?;
    tracing::info!(
        chain_id = config.blockchain.chain_id,
        backend = ?config.database.backend,
        "Starting ethflow"
    );

    // 3. 存储后端
    let repos = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = db::init_pool(&config.database)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");
            if std::env::var("SKIP_MIGRATIONS").is_err() {
                db::run_migrations(&pool).await?;
            } else {
                tracing::info!("Database migrations skipped (SKIP_MIGRATIONS set)");
            }
            Repositories::postgres(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Repositories::memory()
        }
    };

    // 4. 链网关与服务组装
    let gateway = Arc::new(EthersGateway::new(&config.blockchain.rpc_url)?);
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone(), gateway, repos));

    // 5. 后台交易监控
    if config.blockchain.monitor_enabled {
        let monitor = Arc::new(state.monitor());
        tokio::spawn(monitor.start_background_monitor());
    } else {
        tracing::info!("Transaction monitor disabled");
    }

    // 6. 启动服务器
    let app = api::routes(state);
    let bind_addr = &config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!(%bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
