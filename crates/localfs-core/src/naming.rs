//! 文件命名
//!
//! 清洗客户端提交的文件名，并在存储目录中解决重名冲突。
//!
//! 冲突时按 `stem(1)ext`, `stem(2)ext`, ... 线性探测，返回第一个未被占用的名字。
//! 探测不加锁；并发提交的最终仲裁由存储层的排他提交完成。

use crate::error::{Error, Result};
use std::collections::HashSet;

/// 清洗不可信的文件名
///
/// 只保留最后一个路径分量（同时按 `/` 和 `\` 切分，部分浏览器会发送
/// `C:\fakepath\name`），去掉首尾空白。
pub fn sanitize_name(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(name.to_string())
}

/// 拆分为 (stem, extension)
///
/// 扩展名从最后一个 `.` 开始（含 `.`）；没有 `.` 时扩展名为空。
/// `.gitignore` 的 stem 为空，整个名字都是扩展名。
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// 在给定的目录列表上解决重名
pub fn resolve_name(existing: &HashSet<String>, desired: &str) -> String {
    if !existing.contains(desired) {
        return desired.to_string();
    }

    let (stem, ext) = split_extension(desired);
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{stem}({counter}){ext}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
