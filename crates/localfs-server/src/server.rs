//! HTTP 服务器
//!
//! # 路由
//!
//! - `GET /` 首页（地址 + 二维码）
//! - `GET /upload` 上传页
//! - `POST /upload/file` 接收上传，303 跳转到状态页
//! - `GET /upload/status?uid=` 一次性校验结果
//! - `GET /download/*name` 下载已存储的文件

use crate::handlers;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use localfs_core::{FsStorage, ServerSettings, UploadLedger, UploadService};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// 服务器状态
pub struct AppState {
    pub service: UploadService<FsStorage>,
    /// 实际监听的端口（用于生成二维码地址）
    pub port: u16,
}

pub type SharedState = Arc<AppState>;

/// 构建路由
pub fn router(state: SharedState, max_upload_bytes: Option<u64>) -> Router {
    let body_limit = match max_upload_bytes {
        Some(max) => DefaultBodyLimit::max(usize::try_from(max).unwrap_or(usize::MAX)),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", get(handlers::upload_page))
        .route("/upload/", get(handlers::upload_page))
        .route("/upload/file", post(handlers::upload_file).layer(body_limit))
        .route("/upload/status", get(handlers::upload_status))
        .route("/download/*name", get(handlers::download))
        .route("/favicon.ico", get(handlers::favicon))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动服务器并一直运行
pub async fn run(settings: ServerSettings) -> anyhow::Result<()> {
    let storage = FsStorage::init(&settings.storage_dir).await?;
    let ledger = UploadLedger::new(settings.ledger_ttl(), settings.ledger_capacity);

    let listener = TcpListener::bind(settings.bind_addr()).await?;
    let addr = listener.local_addr()?;

    let state = Arc::new(AppState {
        service: UploadService::new(storage, ledger),
        port: addr.port(),
    });
    let _sweeper = spawn_ledger_sweeper(state.clone());

    let app = router(state, settings.max_upload_bytes);

    info!("Server is listening on {}...", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// 定期清理过期的未校验记录
fn spawn_ledger_sweeper(state: SharedState) -> JoinHandle<()> {
    let period = (state.service.ledger().ttl() / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = state.service.ledger().purge_expired();
            if purged > 0 {
                debug!("Purged {} expired upload records", purged);
            }
        }
    })
}
