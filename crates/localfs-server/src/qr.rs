//! 上传地址二维码

use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

/// 二维码最小边长（像素）
const QR_SIZE: u32 = 320;

/// 把上传地址渲染为内嵌 SVG
pub fn upload_qr_svg(url: &str) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();
    // 内嵌到 HTML 时去掉 XML 声明
    Ok(match image.find("<svg") {
        Some(start) => image[start..].to_string(),
        None => image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_svg() {
        let svg = upload_qr_svg("http://192.168.1.20:5000/upload").unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
