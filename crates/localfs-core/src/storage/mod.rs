//! 存储层
//!
//! 所有文件平铺在一个存储目录下，不含子目录。
//!
//! 写入分两步：先把入站流完整写入临时文件 ([`Storage::stage`])，
//! 成功后再以排他方式提交到最终文件名 ([`Storage::commit`])。
//! 写入中途失败不会在最终文件名下留下残缺文件；
//! 目标名已被占用时提交返回 `AlreadyExists`，而不是覆盖。

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use crate::error::{Error, Result};
use async_trait::async_trait;
use log::warn;
use std::collections::HashSet;
use std::time::SystemTime;
use tokio::io::AsyncRead;

/// 已暂存、尚未提交的上传内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// 存储层内部的临时标识
    pub id: String,
    /// 写入的字节数
    pub size: u64,
}

/// 目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// 存储后端
#[async_trait]
pub trait Storage: Send + Sync {
    /// 读取已存储文件的流
    type Reader: AsyncRead + Unpin + Send;

    /// 当前目录中已占用的全部名字
    async fn entries(&self) -> Result<HashSet<String>>;

    /// 已存储的文件，按修改时间从新到旧
    async fn list(&self) -> Result<Vec<StoredEntry>>;

    /// 把整个流写入临时位置
    async fn stage<R>(&self, source: R) -> Result<StagedFile>
    where
        R: AsyncRead + Unpin + Send;

    /// 以排他方式把暂存内容提交为 `name`
    ///
    /// `name` 已存在时返回 `Error::Io`（`ErrorKind::AlreadyExists`），暂存内容保持不变。
    async fn commit(&self, staged: &StagedFile, name: &str) -> Result<()>;

    /// 丢弃暂存内容
    async fn discard(&self, staged: StagedFile) -> Result<()>;

    /// 打开已存储的文件；不存在时返回 `Error::NotFound`
    async fn open(&self, name: &str) -> Result<Self::Reader>;

    /// 写入并提交为 `name`，失败时清理暂存内容
    async fn write<R>(&self, name: &str, source: R) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staged = self.stage(source).await?;
        match self.commit(&staged, name).await {
            Ok(()) => Ok(staged.size),
            Err(e) => {
                if let Err(discard) = self.discard(staged).await {
                    warn!("Failed to discard staged upload: {}", discard);
                }
                Err(e)
            }
        }
    }
}

/// 判断提交失败是否因为目标名已被占用
pub(crate) fn is_name_taken(err: &Error) -> bool {
    matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::AlreadyExists)
}
