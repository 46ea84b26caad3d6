//! HTML 页面

use localfs_core::{StoredEntry, VerificationResult};
use std::fmt::Write;

const STYLE: &str = r"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 46rem; padding: 1rem; }
nav a, nav span { margin-right: 1rem; }
nav span { font-weight: bold; }
table { border-collapse: collapse; width: 100%; }
td { padding: .4rem; word-break: break-all; }
tr:nth-child(even) { background: #f2f2f2; }
.error { color: #b00020; }
.ok { color: #1b7f3b; }
code { word-break: break-all; }
footer { color: #888; font-size: .8rem; margin-top: 2rem; }
";

/// 导航栏项
struct NavItem {
    name: &'static str,
    link: &'static str,
}

/// HTML 转义
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// URL 路径段编码
pub fn encode_path_segment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

fn layout(title: &str, active: &str, nav: &[NavItem], body: &str) -> String {
    let mut links = String::new();
    for item in nav {
        let _ = write!(links, r#"<a href="{}">{}</a>"#, item.link, item.name);
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - LocalFS</title>
<style>{STYLE}</style>
</head>
<body>
<nav>{links}<span>{active}</span></nav>
{body}
<footer>LocalFS build#{version}</footer>
</body>
</html>"#,
        title = escape(title),
        active = escape(active),
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// 首页：地址与二维码
pub fn index_page(address: &str, upload_url: &str, qr_svg: &str) -> String {
    let body = format!(
        r#"<h1>LocalFS</h1>
<p>Scan the QR code with a device on the same network, or open
<a href="{url}">{url}</a>.</p>
<div>{qr_svg}</div>
<p>Server address: <code>{address}</code></p>"#,
        url = escape(upload_url),
        address = escape(address),
    );
    layout("Home", "Home", &[], &body)
}

/// 上传页：表单与已存储文件列表
pub fn upload_page(files: &[StoredEntry]) -> String {
    let mut rows = String::new();
    for (i, file) in files.iter().enumerate() {
        let _ = write!(
            rows,
            r#"<tr><td>{index}</td><td><a href="/download/{link}">{name}</a></td><td>{size}</td></tr>"#,
            index = i + 1,
            link = encode_path_segment(&file.name),
            name = escape(&file.name),
            size = file.size,
        );
    }
    if rows.is_empty() {
        rows.push_str(r#"<tr><td colspan="3">No files yet.</td></tr>"#);
    }

    let body = format!(
        r#"<h1>Upload</h1>
<form action="/upload/file" method="post" enctype="multipart/form-data">
<input type="hidden" name="size" id="size" value="">
<input type="file" name="file" id="file" required
 onchange="document.getElementById('size').value = this.files.length ? this.files[0].size : ''">
<button type="submit">Upload</button>
</form>
<h2>Files</h2>
<table>{rows}</table>"#
    );
    layout(
        "Upload",
        "Upload",
        &[NavItem {
            name: "Home",
            link: "/",
        }],
        &body,
    )
}

/// 上传状态页：校验结果
pub fn status_page(result: &VerificationResult) -> String {
    let verdict = match &result.message {
        Some(message) => format!(r#"<p class="error">{}</p>"#, escape(message)),
        None => r#"<p class="ok">File uploaded and verified.</p>"#.to_string(),
    };
    let body = format!(
        r#"<h1>Upload Status</h1>
{verdict}
<table>
<tr><td>Filename</td><td><a href="/download/{link}">{name}</a></td></tr>
<tr><td>Size</td><td>{size} bytes</td></tr>
<tr><td>SHA-256</td><td><code>{digest}</code></td></tr>
</table>"#,
        link = encode_path_segment(&result.stored_name),
        name = escape(&result.stored_name),
        size = result.display_size(),
        digest = escape(&result.digest),
    );
    layout(
        "Status",
        "Status",
        &[
            NavItem {
                name: "Home",
                link: "/",
            },
            NavItem {
                name: "Upload",
                link: "/upload",
            },
        ],
        &body,
    )
}

/// 错误页
pub fn error_page(code: u16, status: &str, message: &str) -> String {
    let body = format!(
        r#"<h1>{code} {status}</h1>
<p class="error">{message}</p>"#,
        status = escape(status),
        message = escape(message),
    );
    layout(
        status,
        "Error",
        &[NavItem {
            name: "Home",
            link: "/",
        }],
        &body,
    )
}
