//! 请求处理器
//!
//! 只做 HTTP 与核心之间的转换，业务逻辑都在 `localfs-core`。

use crate::error::AppError;
use crate::server::SharedState;
use crate::{netutil, qr, view};
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use futures_util::TryStreamExt;
use localfs_core::naming::sanitize_name;
use localfs_core::{Storage, UploadToken};
use serde::Deserialize;
use std::io;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info};

/// `size` 字段允许的最大长度（字节）
const MAX_SIZE_FIELD_LEN: usize = 32;

#[derive(Deserialize)]
pub struct StatusQuery {
    pub uid: Option<String>,
}

/// 首页
pub async fn index(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    let host = netutil::primary_host();
    let upload_url = format!("http://{}:{}/upload", host, state.port);
    let svg = qr::upload_qr_svg(&upload_url).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Html(view::index_page(&host, &upload_url, &svg)))
}

/// 上传页
pub async fn upload_page(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    let files = state.service.storage().list().await?;
    Ok(Html(view::upload_page(&files)))
}

/// 接收上传表单
///
/// 可选的 `size` 字段必须位于 `file` 字段之前才会被记录。
pub async fn upload_file(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut declared_size = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("size") => {
                declared_size = read_size_field(field).await?;
            }
            Some("file") => {
                let raw_name = field.file_name().unwrap_or_default().to_string();
                debug!("Receiving upload {:?}", raw_name);

                let body = Box::pin(field.map_err(io::Error::other));
                let token = match state
                    .service
                    .accept_upload(&raw_name, StreamReader::new(body), declared_size)
                    .await
                {
                    Ok(token) => token,
                    Err(localfs_core::Error::Io(e)) => return Err(AppError::from_upload_io(e)),
                    Err(e) => return Err(e.into()),
                };

                return Ok(Redirect::to(&format!("/upload/status?uid={token}")));
            }
            _ => {}
        }
    }

    Err(AppError::BadRequest("missing file field".to_string()))
}

/// 读取声明的大小；超长的字段直接拒绝，不在内存中累积
async fn read_size_field(mut field: Field<'_>) -> Result<Option<u64>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > MAX_SIZE_FIELD_LEN {
            return Err(AppError::BadRequest("size field too long".to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(std::str::from_utf8(&buf)
        .ok()
        .and_then(|text| text.trim().parse().ok()))
}

/// 上传状态页：消费令牌并校验
pub async fn upload_status(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> Result<Html<String>, AppError> {
    let bad_request = || AppError::BadRequest("Bad Request".to_string());

    let token: UploadToken = query
        .uid
        .as_deref()
        .and_then(|uid| uid.parse().ok())
        .ok_or_else(bad_request)?;

    let result = match state.service.verify(&token).await {
        Ok(result) => result,
        Err(localfs_core::Error::NotFound(_)) => return Err(bad_request()),
        Err(e) => return Err(e.into()),
    };

    info!(
        "Verified {:?}: {}",
        result.stored_name,
        if result.matched { "ok" } else { "MISMATCH" }
    );
    Ok(Html(view::status_page(&result)))
}

/// 下载已存储的文件
pub async fn download(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("Not Found".to_string());

    if sanitize_name(&name).ok().as_deref() != Some(name.as_str()) {
        return Err(not_found());
    }

    let file = match state.service.storage().open(&name).await {
        Ok(file) => file,
        Err(localfs_core::Error::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await.map_err(localfs_core::Error::from)?.len();

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        view::encode_path_segment(&name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}
