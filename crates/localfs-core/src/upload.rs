//! 上传编排
//!
//! 接收: 入站流 → 暂存写入（同时计算摘要） → 解决文件名 → 排他提交 → 登记 → 令牌
//!
//! 校验: 令牌 → 取出记录 → 重新读取文件 → 计算摘要 → 比较
//!
//! 任一接收阶段失败都不会产生登记记录；校验时记录在第一步就被删除，
//! 之后无论成功与否都不会放回。

use crate::digest::{HashingReader, digest, digests_match};
use crate::error::{Error, Result};
use crate::ledger::{PendingUpload, UploadLedger, UploadToken};
use crate::naming::{resolve_name, sanitize_name};
use crate::storage::{StagedFile, Storage, is_name_taken};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use tokio::io::AsyncRead;

/// 提交时名字被抢占后的最大重试次数
const MAX_COMMIT_ATTEMPTS: usize = 16;

/// 摘要不一致时的提示
pub const MISMATCH_MESSAGE: &str = "hash mismatch detected.";

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// 重新计算的摘要与上传时一致
    pub matched: bool,
    /// 不一致时的说明
    pub message: Option<String>,
    pub stored_name: String,
    pub declared_size: Option<u64>,
    pub stored_size: u64,
    pub expected_digest: String,
    /// 校验时重新计算的摘要
    pub digest: String,
}

impl VerificationResult {
    /// 用于显示的大小：优先使用声明值
    pub fn display_size(&self) -> u64 {
        self.declared_size.unwrap_or(self.stored_size)
    }
}

/// 上传编排器
pub struct UploadService<S> {
    storage: S,
    ledger: UploadLedger,
}

impl<S: Storage> UploadService<S> {
    pub fn new(storage: S, ledger: UploadLedger) -> Self {
        Self { storage, ledger }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    /// 接收一次上传，返回一次性状态令牌
    pub async fn accept_upload<R>(
        &self,
        raw_name: &str,
        source: R,
        declared_size: Option<u64>,
    ) -> Result<UploadToken>
    where
        R: AsyncRead + Unpin + Send,
    {
        let desired = sanitize_name(raw_name)?;

        let mut reader = HashingReader::new(source);
        let staged = self.storage.stage(&mut reader).await?;
        let expected_digest = reader.finalize();

        let stored_name = match self.commit_resolved(&staged, &desired).await {
            Ok(name) => name,
            Err(e) => {
                if let Err(discard) = self.storage.discard(staged).await {
                    warn!("Failed to discard staged upload: {}", discard);
                }
                return Err(e);
            }
        };

        let stored_size = staged.size;
        let token = self.ledger.put(PendingUpload {
            stored_name: stored_name.clone(),
            declared_size,
            stored_size,
            expected_digest: expected_digest.clone(),
        });

        info!(
            "Stored upload {:?} ({} bytes, sha256 {}…)",
            stored_name,
            stored_size,
            &expected_digest[..12]
        );
        Ok(token)
    }

    /// 校验令牌对应的上传
    pub async fn verify(&self, token: &UploadToken) -> Result<VerificationResult> {
        let record = self
            .ledger
            .take_and_remove(token)
            .ok_or_else(|| Error::NotFound(format!("upload token {token}")))?;

        let reader = match self.storage.open(&record.stored_name).await {
            Ok(reader) => reader,
            Err(Error::NotFound(_)) => {
                error!(
                    "Stored file {:?} vanished before verification",
                    record.stored_name
                );
                return Err(Error::StorageInconsistency {
                    name: record.stored_name,
                });
            }
            Err(e) => return Err(e),
        };

        let actual = digest(reader).await?;
        let matched = digests_match(&record.expected_digest, &actual);
        if matched {
            debug!("Upload {:?} verified", record.stored_name);
        } else {
            warn!(
                "Digest mismatch for {:?}: expected {}, got {}",
                record.stored_name, record.expected_digest, actual
            );
        }

        Ok(VerificationResult {
            matched,
            message: (!matched).then(|| MISMATCH_MESSAGE.to_string()),
            stored_name: record.stored_name,
            declared_size: record.declared_size,
            stored_size: record.stored_size,
            expected_digest: record.expected_digest,
            digest: actual,
        })
    }

    /// 解决文件名并提交；提交时名字被抢占则重新解决
    async fn commit_resolved(&self, staged: &StagedFile, desired: &str) -> Result<String> {
        // 列目录时还看不到、提交时却已被占用的名字
        let mut taken = HashSet::new();
        let mut last_err = None;
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut existing = self.storage.entries().await?;
            existing.extend(taken.iter().cloned());
            let name = resolve_name(&existing, desired);
            match self.storage.commit(staged, &name).await {
                Ok(()) => return Ok(name),
                Err(e) if is_name_taken(&e) => {
                    debug!(
                        "Name {:?} taken at commit (attempt {}), resolving again",
                        name, attempt
                    );
                    taken.insert(name);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::from(std::io::ErrorKind::AlreadyExists).into()
        }))
    }
}
