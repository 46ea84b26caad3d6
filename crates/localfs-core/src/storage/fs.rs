//! 基于本地文件系统的存储

use super::{StagedFile, Storage, StoredEntry};
use crate::error::{Error, Result};
use crate::naming::sanitize_name;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirBuilder, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

const STAGING_PREFIX: &str = ".localfs-";
const STAGING_SUFFIX: &str = ".part";

/// 本地目录存储
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// 创建存储目录（仅所有者可访问）并返回存储句柄
    pub async fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let root = path.into();
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(&root).await?;

        let storage = Self { root };
        let swept = storage.sweep_staging().await?;
        if swept > 0 {
            info!("Removed {} stale staging files", swept);
        }

        info!("Storage directory ready at {:?}", storage.root);
        Ok(storage)
    }

    /// 删除上次运行中断时残留的暂存文件
    async fn sweep_staging(&self) -> Result<usize> {
        let mut swept = 0;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !Self::is_staging_name(&name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => swept += 1,
                Err(e) => warn!("Failed to remove stale staging file {:?}: {}", name, e),
            }
        }
        Ok(swept)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 名字必须是单个、干净的路径分量
    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if sanitize_name(name)? != name {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn staging_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn is_staging_name(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
    }

    /// 先用 `create_new` 占住目标名，再用暂存文件替换自己的占位文件
    async fn commit_by_rename(source: &Path, target: &Path) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .await?;

        if let Err(e) = fs::rename(source, target).await {
            if let Err(rm) = fs::remove_file(target).await {
                warn!("Failed to remove placeholder {:?}: {}", target, rm);
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn copy_into<R>(path: &Path, mut source: R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        let size = tokio::io::copy(&mut source, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(size)
    }
}

#[async_trait]
impl Storage for FsStorage {
    type Reader = File;

    async fn entries(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn list(&self) -> Result<Vec<StoredEntry>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::is_staging_name(&name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            files.push(StoredEntry {
                name,
                size: meta.len(),
                modified: meta.modified()?,
            });
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    async fn stage<R>(&self, source: R) -> Result<StagedFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let id = format!("{STAGING_PREFIX}{}{STAGING_SUFFIX}", uuid::Uuid::new_v4());
        let path = self.staging_path(&id);

        match Self::copy_into(&path, source).await {
            Ok(size) => {
                debug!("Staged {} bytes at {:?}", size, path);
                Ok(StagedFile { id, size })
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path).await
                    && rm.kind() != io::ErrorKind::NotFound
                {
                    warn!("Failed to remove partial upload {:?}: {}", path, rm);
                }
                Err(e.into())
            }
        }
    }

    async fn commit(&self, staged: &StagedFile, name: &str) -> Result<()> {
        let target = self.path_of(name)?;
        let source = self.staging_path(&staged.id);

        // hard_link 在目标已存在时失败，不会覆盖
        match fs::hard_link(&source, &target).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e.into()),
            Err(e) => {
                // 不支持硬链接的文件系统（如 FAT）
                debug!("hard_link unavailable ({}), falling back to rename", e);
                return Self::commit_by_rename(&source, &target).await;
            }
        }

        if let Err(e) = fs::remove_file(&source).await {
            warn!("Failed to remove staging file {:?}: {}", source, e);
        }
        Ok(())
    }

    async fn discard(&self, staged: StagedFile) -> Result<()> {
        match fs::remove_file(self.staging_path(&staged.id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, name: &str) -> Result<File> {
        let path = self.path_of(name)?;
        match File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    /// 读取过程中出错的流
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "client went away",
                )));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_init_creates_private_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("localfs");

        let storage = FsStorage::init(&path).await.unwrap();
        assert!(storage.root().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn test_init_sweeps_stale_staging_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".localfs-crashed.part"), b"half").unwrap();
        std::fs::write(tmp.path().join("keep.txt"), b"kept").unwrap();

        let storage = FsStorage::init(tmp.path()).await.unwrap();
        let names = storage.entries().await.unwrap();
        assert_eq!(names.len(), 1);
        assert!(names.contains("keep.txt"));
    }

    #[tokio::test]
    async fn test_rename_commit_reserves_name() {
        let tmp = TempDir::new().unwrap();
        let taken = tmp.path().join("a.txt");
        let free = tmp.path().join("b.txt");
        let source = tmp.path().join(".localfs-x.part");
        std::fs::write(&taken, b"first").unwrap();
        std::fs::write(&source, b"second").unwrap();

        let err = FsStorage::commit_by_rename(&source, &taken).await.unwrap_err();
        assert!(super::super::is_name_taken(&err));
        assert_eq!(std::fs::read(&taken).unwrap(), b"first");
        assert!(source.exists());

        FsStorage::commit_by_rename(&source, &free).await.unwrap();
        assert_eq!(std::fs::read(&free).unwrap(), b"second");
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_write_and_open() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();

        let size = storage.write("hello.txt", &b"hello"[..]).await.unwrap();
        assert_eq!(size, 5);

        let mut content = String::new();
        storage
            .open("hello.txt")
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "hello");

        // 暂存文件已被清理
        let names = storage.entries().await.unwrap();
        assert_eq!(names.len(), 1);
        assert!(names.contains("hello.txt"));
    }

    #[tokio::test]
    async fn test_commit_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();
        storage.write("a.txt", &b"first"[..]).await.unwrap();

        let staged = storage.stage(&b"second"[..]).await.unwrap();
        let err = storage.commit(&staged, "a.txt").await.unwrap_err();
        assert!(super::super::is_name_taken(&err));

        storage.commit(&staged, "a(1).txt").await.unwrap();
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"first");
        assert_eq!(std::fs::read(tmp.path().join("a(1).txt")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();

        let err = storage
            .write("broken.bin", FailingReader { sent: false })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(storage.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();
        assert!(matches!(
            storage.open("nope.txt").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();
        assert!(matches!(
            storage.open("../secret").await,
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            storage.write("sub/file", &b"x"[..]).await,
            Err(Error::InvalidName(_))
        ));
        assert!(storage.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_dirs_and_staging() {
        let tmp = TempDir::new().unwrap();
        let storage = FsStorage::init(tmp.path()).await.unwrap();

        storage.write("old.txt", &b"1"[..]).await.unwrap();
        let old = std::fs::File::options()
            .write(true)
            .open(tmp.path().join("old.txt"))
            .unwrap();
        old.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();
        storage.write("new.txt", &b"22"[..]).await.unwrap();
        std::fs::create_dir(tmp.path().join("subdir")).unwrap();
        let _pending = storage.stage(&b"in flight"[..]).await.unwrap();

        let listing = storage.list().await.unwrap();
        let names: Vec<_> = listing.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["new.txt", "old.txt"]);
        assert_eq!(listing[0].size, 2);
    }
}
