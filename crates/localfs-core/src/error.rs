//! 核心错误类型

use std::io;

/// 上传与校验过程中的错误
///
/// 摘要不一致不是错误，而是 [`crate::VerificationResult`] 中的 `matched = false`。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 底层读写失败（磁盘已满、权限不足、设备错误）
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 无法存储的文件名（空名、`.`、`..`、包含 NUL）
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// 令牌未知/已被消费，或请求的文件不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 已登记记录对应的文件在校验前消失
    #[error("stored file {name:?} vanished before verification")]
    StorageInconsistency { name: String },
}

impl Error {
    /// 是否为磁盘空间不足
    pub fn is_storage_full(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::StorageFull)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_storage_full());
    }

    #[test]
    fn test_storage_full() {
        let err = Error::Io(io::Error::from(io::ErrorKind::StorageFull));
        assert!(err.is_storage_full());
        assert!(!Error::NotFound("x".to_string()).is_storage_full());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_enospc_is_storage_full() {
        // ENOSPC
        let err = Error::Io(io::Error::from_raw_os_error(28));
        assert!(err.is_storage_full());
    }
}
