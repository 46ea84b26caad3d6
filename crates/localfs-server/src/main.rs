//! LocalFS
//!
//! 局域网网页文件服务器：
//! - 手机扫码打开上传页
//! - 上传后校验 SHA-256
//! - 浏览器下载已存储的文件

mod error;
mod handlers;
mod netutil;
mod qr;
mod server;
mod view;

use anyhow::Result;
use clap::Parser;
use localfs_core::ServerSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "localfs", version, about = "LocalFS - 便携的局域网网页文件服务器")]
struct Cli {
    /// 服务器端口 (默认 5000)
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听地址 (默认 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// 存储目录 (默认 ~/.localfs)
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// 单次上传的最大字节数
    #[arg(long, value_name = "BYTES")]
    max_upload: Option<u64>,

    /// 详细日志
    #[arg(short, long)]
    verbose: bool,

    /// 把当前生效的设置写入配置文件
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(self, settings: &mut ServerSettings) {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(storage) = self.storage {
            settings.storage_dir = storage;
        }
        if self.max_upload.is_some() {
            settings.max_upload_bytes = self.max_upload;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 桥接 log crate（localfs-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "info,localfs_core=debug"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();

    let save_config = cli.save_config;
    let mut settings = ServerSettings::load();
    cli.apply(&mut settings);

    if save_config {
        settings.save()?;
        tracing::info!("Settings saved to {:?}", ServerSettings::config_path());
    }

    tracing::info!("LocalFS {} starting...", env!("CARGO_PKG_VERSION"));
    tracing::info!("Storage '{}'", settings.storage_dir.display());

    server::run(settings).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from(["localfs", "-p", "8080", "--storage", "/srv/drop"]);
        let mut settings = ServerSettings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.storage_dir, PathBuf::from("/srv/drop"));
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.max_upload_bytes, None);
    }

    #[test]
    fn test_cli_defaults_keep_settings() {
        let cli = Cli::parse_from(["localfs"]);
        let mut settings = ServerSettings {
            port: 7000,
            ..Default::default()
        };
        cli.apply(&mut settings);
        assert_eq!(settings.port, 7000);
    }
}
