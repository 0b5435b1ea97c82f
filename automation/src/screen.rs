use anyhow::{Context, Result, anyhow};
use rpa_engine::{Platform, Screen};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use xcap::{
    Monitor,
    image::{DynamicImage, RgbaImage},
};

use crate::frontmost;

/// 前台应用探测的超时。
const FRONTMOST_TIMEOUT: Duration = Duration::from_secs(1);

/// 基于 `xcap` 主显示器的屏幕能力。
pub struct XcapScreen {
    platform: Platform,
}

impl XcapScreen {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Screen for XcapScreen {
    /// 显示器的逻辑尺寸；macOS 上为点而非像素。
    fn logical_size(&mut self) -> Result<(u32, u32)> {
        let monitor = primary_monitor()?;
        Ok((monitor.width()?, monitor.height()?))
    }

    fn capture_size(&mut self) -> Result<(u32, u32)> {
        Ok(capture_primary()?.dimensions())
    }

    fn save_capture(&mut self, path: &Path) -> Result<()> {
        let image = capture_primary()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建截图目录 {}", parent.display()))?;
        }
        encode_for(path, image)
            .save(path)
            .with_context(|| format!("截图保存失败 {}", path.display()))?;
        debug!(path = %path.display(), "screenshot saved");
        Ok(())
    }

    fn frontmost_app(&mut self) -> Option<String> {
        match self.platform {
            Platform::MacOs => frontmost::query(FRONTMOST_TIMEOUT),
            Platform::Windows | Platform::Linux => None,
        }
    }
}

/// 以 RGBA 格式截取主显示器。
pub fn capture_primary() -> Result<RgbaImage> {
    let image = primary_monitor()?
        .capture_image()
        .context("截图失败，请检查屏幕录制权限")?;
    Ok(image)
}

fn primary_monitor() -> Result<Monitor> {
    let monitors = Monitor::all().context("无法枚举显示器")?;
    let index = monitors
        .iter()
        .position(|m| m.is_primary().unwrap_or(false))
        .unwrap_or(0);
    monitors
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow!("未找到显示器"))
}

// JPEG 不支持 alpha 通道，除 PNG 外一律转成 RGB
fn encode_for(path: &Path, image: RgbaImage) -> DynamicImage {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    let image = DynamicImage::ImageRgba8(image);
    if is_png {
        image
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_png_keeps_alpha() {
        let image = RgbaImage::from_pixel(2, 2, xcap::image::Rgba([1, 2, 3, 128]));
        assert!(matches!(
            encode_for(Path::new("a.PNG"), image.clone()),
            DynamicImage::ImageRgba8(_)
        ));
        assert!(matches!(
            encode_for(Path::new("a.jpg"), image),
            DynamicImage::ImageRgb8(_)
        ));
    }

    #[test]
    fn saves_and_reopens_every_accepted_format() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbaImage::from_pixel(4, 3, xcap::image::Rgba([10, 120, 200, 255]));
        for name in ["shot.png", "shot.jpg", "shot.bmp"] {
            let path = dir.path().join(name);
            encode_for(&path, image.clone()).save(&path).unwrap();
            let reopened = image::open(&path).unwrap();
            assert_eq!((reopened.width(), reopened.height()), (4, 3), "{name}");
        }
    }

    #[test]
    #[ignore = "needs a real display and screen recording permission"]
    fn captures_the_primary_monitor() {
        let mut screen = XcapScreen::new(Platform::current());
        let logical = screen.logical_size().unwrap();
        let capture = screen.capture_size().unwrap();
        assert!(logical.0 > 0 && logical.1 > 0);
        assert!(capture.0 >= logical.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/shot.jpg");
        screen.save_capture(&path).unwrap();
        assert!(path.exists());
    }
}
