//! 屏幕找图。
//!
//! 启用 `opencv` 特性时使用归一化相关系数做模板匹配，支持置信度阈值与带透明通道的模板；
//! 否则退化为逐像素精确匹配，并向引擎声明不支持置信度。

use rpa_engine::{LocateError, Locator, Point};
use tracing::debug;
use xcap::image::RgbaImage;

use crate::screen::capture_primary;

/// 在主显示器截图中查找模板图片。坐标为截图像素。
pub struct TemplateLocator;

impl Locator for TemplateLocator {
    fn supports_confidence(&self) -> bool {
        cfg!(feature = "opencv")
    }

    fn locate_center(
        &mut self,
        image: &str,
        confidence: Option<f64>,
    ) -> Result<Option<Point>, LocateError> {
        let screenshot = capture_primary()?;
        let found = match confidence {
            Some(threshold) => matching::locate(&screenshot, image, threshold)?,
            None => locate_exact(&screenshot, image)?,
        };
        debug!(image, ?confidence, ?found, "template search finished");
        Ok(found)
    }
}

fn locate_exact(screenshot: &RgbaImage, template_path: &str) -> Result<Option<Point>, LocateError> {
    let template = image::open(template_path)
        .map_err(|err| anyhow::anyhow!("模板读取失败 {template_path}: {err}"))?
        .to_rgba8();
    Ok(find_exact(screenshot, &template))
}

/// 逐像素比较 RGB，忽略模板中完全透明的像素。
///
/// 返回第一个命中区域的中心；模板含透明像素时取不透明区域外接框的中心，与 OpenCV 路径的 mask 中心一致。
pub fn find_exact(haystack: &RgbaImage, needle: &RgbaImage) -> Option<Point> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return None;
    }

    let opaque: Vec<(u32, u32, [u8; 3])> = needle
        .enumerate_pixels()
        .filter(|(_, _, p)| p[3] != 0)
        .map(|(x, y, p)| (x, y, [p[0], p[1], p[2]]))
        .collect();
    if opaque.is_empty() {
        return None;
    }
    let (cx, cy) = opaque_center(&opaque, nw, nh);

    for y in 0..=hh - nh {
        for x in 0..=hw - nw {
            let hit = opaque.iter().all(|&(dx, dy, rgb)| {
                let p = haystack.get_pixel(x + dx, y + dy);
                p[0] == rgb[0] && p[1] == rgb[1] && p[2] == rgb[2]
            });
            if hit {
                return Some(Point::new(f64::from(x) + cx, f64::from(y) + cy));
            }
        }
    }
    None
}

/// 点击点相对模板左上角的偏移。
fn opaque_center(opaque: &[(u32, u32, [u8; 3])], width: u32, height: u32) -> (f64, f64) {
    if opaque.len() as u64 == u64::from(width) * u64::from(height) {
        return (f64::from(width / 2), f64::from(height / 2));
    }
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for &(x, y, _) in opaque {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    (
        f64::from(min_x + max_x) / 2.0,
        f64::from(min_y + max_y) / 2.0,
    )
}

#[cfg(feature = "opencv")]
mod matching {
    use anyhow::{Result, bail};
    use opencv::{
        core::{self, Mat, Point as CvPoint},
        imgcodecs, imgproc,
        prelude::*,
    };
    use rpa_engine::{LocateError, Point};
    use xcap::image::RgbaImage;

    /// 模板匹配的结果。
    struct TemplateMatch {
        top_left: CvPoint,
        /// 0.0–1.0 的匹配分数。
        score: f64,
        tpl_w: i32,
        tpl_h: i32,
        /// 非透明区域的中心，相对模板左上角。
        center: Option<(f64, f64)>,
    }

    pub fn locate(
        screenshot: &RgbaImage,
        template_path: &str,
        threshold: f64,
    ) -> Result<Option<Point>, LocateError> {
        let screenshot_bgr = rgba_to_bgr(screenshot)?;
        let Some(found) = match_template_on_bgr(&screenshot_bgr, template_path)? else {
            return Ok(None);
        };
        if found.score < threshold {
            return Ok(None);
        }
        let (cx, cy) = found.center.unwrap_or((
            f64::from(found.tpl_w / 2),
            f64::from(found.tpl_h / 2),
        ));
        Ok(Some(Point::new(
            f64::from(found.top_left.x) + cx,
            f64::from(found.top_left.y) + cy,
        )))
    }

    /// 将 `xcap` 提供的 RGBA 图像复制到 OpenCV `Mat` 并转换为 BGR。
    fn rgba_to_bgr(image: &RgbaImage) -> Result<Mat> {
        let (w, h) = image.dimensions();
        let mut screenshot_rgba = Mat::zeros(h as i32, w as i32, core::CV_8UC4)?.to_mat()?;
        screenshot_rgba.data_bytes_mut()?.copy_from_slice(image.as_raw());
        let mut screenshot_bgr = Mat::default();
        imgproc::cvt_color(
            &screenshot_rgba,
            &mut screenshot_bgr,
            imgproc::COLOR_RGBA2BGR,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(screenshot_bgr)
    }

    /// 单尺度模板匹配；模板带 alpha 通道时以其为 mask。模板比截图大时返回 `None`。
    fn match_template_on_bgr(
        screenshot_bgr: &Mat,
        template_path: &str,
    ) -> Result<Option<TemplateMatch>> {
        let template_raw = imgcodecs::imread(template_path, imgcodecs::IMREAD_UNCHANGED)?;
        if template_raw.empty() {
            bail!("模板读取失败: {template_path}");
        }

        let mut template_bgr = Mat::default();
        let mut mask = Mat::default();
        if template_raw.channels() == 4 {
            imgproc::cvt_color(
                &template_raw,
                &mut template_bgr,
                imgproc::COLOR_BGRA2BGR,
                0,
                core::AlgorithmHint::ALGO_HINT_DEFAULT,
            )?;
            let mut alpha = Mat::default();
            core::extract_channel(&template_raw, &mut alpha, 3)?;
            imgproc::threshold(&alpha, &mut mask, 0.0, 255.0, imgproc::THRESH_BINARY)?;
        } else {
            template_bgr = template_raw;
        }

        let result_cols = screenshot_bgr.cols() - template_bgr.cols() + 1;
        let result_rows = screenshot_bgr.rows() - template_bgr.rows() + 1;
        if result_cols <= 0 || result_rows <= 0 {
            return Ok(None);
        }

        let mut result = Mat::zeros(result_rows, result_cols, core::CV_32FC1)?.to_mat()?;
        if mask.empty() {
            imgproc::match_template(
                screenshot_bgr,
                &template_bgr,
                &mut result,
                imgproc::TM_CCOEFF_NORMED,
                &core::no_array(),
            )?;
        } else {
            imgproc::match_template(
                screenshot_bgr,
                &template_bgr,
                &mut result,
                imgproc::TM_CCORR_NORMED,
                &mask,
            )?;
        }

        let mut max_val = 0.0;
        let mut max_loc = CvPoint::new(0, 0);
        core::min_max_loc(
            &result,
            None,
            Some(&mut max_val),
            None,
            Some(&mut max_loc),
            &core::no_array(),
        )?;

        let center = if mask.empty() {
            None
        } else {
            mask_center(&mask)?
        };
        Ok(Some(TemplateMatch {
            top_left: max_loc,
            score: max_val,
            tpl_w: template_bgr.cols(),
            tpl_h: template_bgr.rows(),
            center,
        }))
    }

    /// 二值 mask 非零区域的中心点；mask 全零时返回 `None`。
    fn mask_center(mask: &Mat) -> Result<Option<(f64, f64)>> {
        let rows = mask.rows();
        let cols = mask.cols();
        let mut min_x = cols;
        let mut min_y = rows;
        let mut max_x = -1;
        let mut max_y = -1;

        for y in 0..rows {
            for x in 0..cols {
                if *mask.at_2d::<u8>(y, x)? != 0 {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if max_x < 0 || max_y < 0 {
            return Ok(None);
        }
        Ok(Some((
            f64::from(min_x + max_x) / 2.0,
            f64::from(min_y + max_y) / 2.0,
        )))
    }
}

#[cfg(not(feature = "opencv"))]
mod matching {
    use rpa_engine::{LocateError, Point};
    use xcap::image::RgbaImage;

    pub fn locate(
        _screenshot: &RgbaImage,
        _template_path: &str,
        _threshold: f64,
    ) -> Result<Option<Point>, LocateError> {
        Err(LocateError::ConfidenceUnsupported(
            "未启用 opencv 特性".to_string(),
        ))
    }
}
