//! 内存存储（测试替身）

use super::{StagedFile, Storage, StoredEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone)]
struct MemFile {
    data: Vec<u8>,
    modified: SystemTime,
    listed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, MemFile>,
    staged: HashMap<String, Vec<u8>>,
    next_staged: u64,
}

/// 把文件保存在内存中的存储，供测试篡改和删除内容
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入一个文件
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.put_file(name, data.into(), true);
    }

    /// 放入一个不出现在 [`Storage::entries`] 中的文件
    ///
    /// 模拟另一个写入者在列目录之后、提交之前抢占了名字。
    pub fn insert_unlisted(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.put_file(name, data.into(), false);
    }

    /// 覆盖已有文件的内容
    pub fn tamper(&self, name: &str, data: impl Into<Vec<u8>>) -> bool {
        let mut inner = self.inner.lock();
        match inner.files.get_mut(name) {
            Some(file) => {
                file.data = data.into();
                file.modified = SystemTime::now();
                true
            }
            None => false,
        }
    }

    /// 删除文件
    pub fn delete(&self, name: &str) -> bool {
        self.inner.lock().files.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(name).map(|f| f.data.clone())
    }

    /// 尚未提交或丢弃的暂存数量
    pub fn staged_count(&self) -> usize {
        self.inner.lock().staged.len()
    }

    fn put_file(&self, name: &str, data: Vec<u8>, listed: bool) {
        self.inner.lock().files.insert(
            name.to_string(),
            MemFile {
                data,
                modified: SystemTime::now(),
                listed,
            },
        );
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Reader = Cursor<Vec<u8>>;

    async fn entries(&self) -> Result<HashSet<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .files
            .iter()
            .filter(|(_, f)| f.listed)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn list(&self) -> Result<Vec<StoredEntry>> {
        let inner = self.inner.lock();
        let mut files: Vec<StoredEntry> = inner
            .files
            .iter()
            .filter(|(_, f)| f.listed)
            .map(|(name, f)| StoredEntry {
                name: name.clone(),
                size: f.data.len() as u64,
                modified: f.modified,
            })
            .collect();
        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    async fn stage<R>(&self, mut source: R) -> Result<StagedFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        source.read_to_end(&mut data).await?;

        let mut inner = self.inner.lock();
        inner.next_staged += 1;
        let id = format!("staged-{}", inner.next_staged);
        let size = data.len() as u64;
        inner.staged.insert(id.clone(), data);
        Ok(StagedFile { id, size })
    }

    async fn commit(&self, staged: &StagedFile, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.files.contains_key(name) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists).into());
        }
        let data = inner
            .staged
            .remove(&staged.id)
            .ok_or_else(|| Error::NotFound(staged.id.clone()))?;
        inner.files.insert(
            name.to_string(),
            MemFile {
                data,
                modified: SystemTime::now(),
                listed: true,
            },
        );
        Ok(())
    }

    async fn discard(&self, staged: StagedFile) -> Result<()> {
        self.inner.lock().staged.remove(&staged.id);
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<Cursor<Vec<u8>>> {
        self.inner
            .lock()
            .files
            .get(name)
            .map(|f| Cursor::new(f.data.clone()))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_basics() {
        let storage = MemoryStorage::new();
        storage.write("a.txt", &b"abc"[..]).await.unwrap();

        assert_eq!(storage.get("a.txt").unwrap(), b"abc");
        assert!(storage.entries().await.unwrap().contains("a.txt"));
        assert_eq!(storage.staged_count(), 0);

        let err = storage.write("a.txt", &b"again"[..]).await.unwrap_err();
        assert!(super::super::is_name_taken(&err));
        assert_eq!(storage.staged_count(), 0);
        assert_eq!(storage.get("a.txt").unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_unlisted_blocks_commit() {
        let storage = MemoryStorage::new();
        storage.insert_unlisted("race.txt", "other");

        assert!(storage.entries().await.unwrap().is_empty());
        assert!(storage.write("race.txt", &b"mine"[..]).await.is_err());
    }
}
