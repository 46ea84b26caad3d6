//! 上传登记表
//!
//! 令牌 → 待校验的上传记录。每条记录只能被取走一次。
//!
//! 登记表是有界的：超过 TTL 的记录会被淘汰，超过容量时按先进先出淘汰最旧的记录。

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 默认 TTL：1 小时
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// 默认容量
pub const DEFAULT_CAPACITY: usize = 1024;

/// 一次性状态令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(Uuid);

impl UploadToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UploadToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// 登记前的上传信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// 解决冲突后的文件名
    pub stored_name: String,
    /// 发送方声明的大小（仅用于显示）
    pub declared_size: Option<u64>,
    /// 实际写入的字节数
    pub stored_size: u64,
    /// 写入完成时的摘要
    pub expected_digest: String,
}

/// 已完成、尚未校验的上传
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub token: UploadToken,
    pub stored_name: String,
    pub declared_size: Option<u64>,
    pub stored_size: u64,
    pub expected_digest: String,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<UploadToken, UploadRecord>,
    /// 按插入顺序排列；被取走的令牌会残留在这里，淘汰时跳过
    order: VecDeque<UploadToken>,
}

/// 上传登记表
#[derive(Debug)]
pub struct UploadLedger {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl Default for UploadLedger {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl UploadLedger {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 登记一条记录并返回新令牌
    pub fn put(&self, upload: PendingUpload) -> UploadToken {
        self.put_at(upload, Instant::now())
    }

    /// 原子地取出并删除记录
    ///
    /// 未知、已被取走或已过期的令牌都返回 `None`。
    pub fn take_and_remove(&self, token: &UploadToken) -> Option<UploadRecord> {
        self.take_and_remove_at(token, Instant::now())
    }

    /// 清除所有过期记录，返回清除的数量
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put_at(&self, upload: PendingUpload, now: Instant) -> UploadToken {
        let mut inner = self.inner.lock();
        self.evict(&mut inner, now, true);

        let mut token = UploadToken::generate();
        while inner.records.contains_key(&token) {
            token = UploadToken::generate();
        }

        inner.records.insert(
            token,
            UploadRecord {
                token,
                stored_name: upload.stored_name,
                declared_size: upload.declared_size,
                stored_size: upload.stored_size,
                expected_digest: upload.expected_digest,
                created_at: now,
            },
        );
        inner.order.push_back(token);
        Self::compact(&mut inner, self.capacity);
        token
    }

    fn take_and_remove_at(&self, token: &UploadToken, now: Instant) -> Option<UploadRecord> {
        let mut inner = self.inner.lock();
        let record = inner.records.remove(token)?;
        if self.is_expired(&record, now) {
            debug!("Upload token {} expired before verification", token);
            return None;
        }
        Some(record)
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        self.evict(&mut inner, now, false);
        before - inner.records.len()
    }

    /// 队首记录未过期时，已取走的令牌会堆积在队列中；超过两倍容量时整体清理
    fn compact(inner: &mut Inner, capacity: usize) {
        if inner.order.len() <= capacity.saturating_mul(2) {
            return;
        }
        let Inner { records, order } = inner;
        order.retain(|token| records.contains_key(token));
    }

    fn is_expired(&self, record: &UploadRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.created_at) >= self.ttl
    }

    /// 从队首开始淘汰已取走和已过期的记录；`make_room` 时还为新记录腾出容量
    fn evict(&self, inner: &mut Inner, now: Instant, make_room: bool) {
        while let Some(front) = inner.order.front().copied() {
            let evict = match inner.records.get(&front) {
                None => true,
                Some(record) => {
                    self.is_expired(record, now)
                        || (make_room && inner.records.len() >= self.capacity)
                }
            };
            if !evict {
                break;
            }
            inner.order.pop_front();
            if inner.records.remove(&front).is_some() {
                debug!("Evicted unverified upload {}", front);
            }
        }
    }
}
