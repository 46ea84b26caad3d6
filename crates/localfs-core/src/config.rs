//! 服务器配置和持久化
//!
//! 提供端口、存储目录、登记表上限等设置的存储和读取。

use crate::ledger::{DEFAULT_CAPACITY, DEFAULT_TTL};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// 默认端口
pub const DEFAULT_PORT: u16 = 5000;
/// 默认存储目录名（位于用户主目录下）
pub const DEFAULT_STORAGE: &str = ".localfs";

/// 服务器设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 存储目录
    pub storage_dir: PathBuf,
    /// 未校验上传记录的保留时间（秒）
    pub ledger_ttl_secs: u64,
    /// 最多保留的未校验上传记录数
    pub ledger_capacity: usize,
    /// 单次上传请求体的上限（字节），`None` 表示不限制
    pub max_upload_bytes: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            storage_dir: default_storage_dir(),
            ledger_ttl_secs: DEFAULT_TTL.as_secs(),
            ledger_capacity: DEFAULT_CAPACITY,
            max_upload_bytes: None,
        }
    }
}

impl ServerSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("localfs");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_secs(self.ledger_ttl_secs.max(1))
    }

    /// 监听地址 `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_STORAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = ServerSettings::default();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.host, "0.0.0.0");
        assert!(settings.storage_dir.ends_with(".localfs"));
        assert_eq!(settings.ledger_ttl(), DEFAULT_TTL);
        assert_eq!(settings.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf").join("settings.toml");

        let settings = ServerSettings {
            port: 8080,
            storage_dir: PathBuf::from("/srv/drop"),
            max_upload_bytes: Some(1 << 30),
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(ServerSettings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "port = 7000\n").unwrap();

        let settings = ServerSettings::load_from(&path);
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.host, DEFAULT_HOST);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "port = \"not a number\"").unwrap();

        assert_eq!(ServerSettings::load_from(&path), ServerSettings::default());
    }
}
