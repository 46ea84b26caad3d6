//! LocalFS Core Library
//!
//! 局域网文件交换服务的核心实现：上传完整性校验与文件命名。
//!
//! # 模块
//!
//! - **digest**: SHA-256 内容摘要（流式计算）
//! - **naming**: 文件名清洗与冲突解决 (`report(1).pdf`)
//! - **storage**: 存储目录的写入/读取/列举
//! - **ledger**: 一次性上传状态令牌登记表
//! - **upload**: 组合以上组件的上传编排器
//! - **config**: 服务器设置的加载与持久化
//!
//! # 使用示例
//!
//! ```ignore
//! use localfs_core::{FsStorage, UploadLedger, UploadService};
//!
//! let storage = FsStorage::init("/home/me/.localfs").await?;
//! let service = UploadService::new(storage, UploadLedger::default());
//!
//! // 1. 接收上传，得到一次性令牌
//! let token = service.accept_upload("report.pdf", body, Some(3)).await?;
//!
//! // 2. 之后凭令牌校验落盘内容
//! let result = service.verify(&token).await?;
//! assert!(result.matched);
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod naming;
pub mod storage;
pub mod upload;

pub use config::ServerSettings;
pub use error::{Error, Result};
pub use ledger::{PendingUpload, UploadLedger, UploadRecord, UploadToken};
pub use storage::{FsStorage, MemoryStorage, Storage, StoredEntry};
pub use upload::{UploadService, VerificationResult};
