//! HTTP 错误响应

use crate::view;
use axum::extract::multipart::MultipartError;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::io;

/// 请求处理错误，渲染为 HTML 错误页
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}

impl AppError {
    /// 上传流中断：区分客户端问题（表单损坏、超出大小）与服务端磁盘错误
    pub fn from_upload_io(err: io::Error) -> Self {
        let multipart = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>());
        match multipart {
            Some(inner) if inner.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge(inner.body_text())
            }
            Some(inner) => AppError::BadRequest(inner.body_text()),
            None => localfs_core::Error::Io(err).into(),
        }
    }
}

impl From<localfs_core::Error> for AppError {
    fn from(err: localfs_core::Error) -> Self {
        use localfs_core::Error;
        match err {
            Error::InvalidName(_) => AppError::BadRequest(err.to_string()),
            Error::NotFound(_) => AppError::NotFound(err.to_string()),
            Error::Io(_) if err.is_storage_full() => {
                AppError::Internal("storage is full".to_string())
            }
            Error::StorageInconsistency { .. } | Error::Io(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}: {}", status, self);
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        let page = view::error_page(status.as_u16(), reason, &self.to_string());
        (
            status,
            [(header::X_CONTENT_TYPE_OPTIONS, "nosniff")],
            Html(page),
        )
            .into_response()
    }
}
