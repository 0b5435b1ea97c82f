//! 截图像素坐标 → 输入注入坐标。

/// 运行平台。只有 macOS 存在“截图像素 ≠ 屏幕点”的问题，也只有它的命令键不是 Ctrl。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    /// 编译目标对应的平台。
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

/// 找图返回的位置（截图像素坐标，允许小数）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 四舍五入到整数像素，供键鼠注入使用。
    pub fn rounded(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// 截图分辨率 / 逻辑屏幕分辨率。每次运行开始时计算一次。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    pub x: f64,
    pub y: f64,
}

/// 与 1.0 的差距在此范围内视为没有缩放。
const SCALE_TOLERANCE: f64 = 0.01;

impl ScaleFactor {
    /// 由截图尺寸与逻辑屏幕尺寸推算；任一尺寸为零时无法推算。
    pub fn from_sizes(capture: (u32, u32), logical: (u32, u32)) -> Option<Self> {
        if capture.0 == 0 || capture.1 == 0 || logical.0 == 0 || logical.1 == 0 {
            return None;
        }
        Some(Self {
            x: capture.0 as f64 / logical.0 as f64,
            y: capture.1 as f64 / logical.1 as f64,
        })
    }

    fn is_identity(&self) -> bool {
        (self.x - 1.0).abs() < SCALE_TOLERANCE && (self.y - 1.0).abs() < SCALE_TOLERANCE
    }

    fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }
}

/// 将找图坐标换算为屏幕坐标。
///
/// macOS Retina 下截图像素通常是屏幕点的 2 倍，此时除以缩放系数；
/// 其他平台、缺少缩放系数或系数接近 1.0 时原样返回。
pub fn normalize(point: Point, scale: Option<ScaleFactor>, platform: Platform) -> Point {
    if platform != Platform::MacOs {
        return point;
    }
    let Some(scale) = scale else {
        return point;
    };
    if !scale.is_usable() || scale.is_identity() {
        return point;
    }

    Point::new(point.x / scale.x, point.y / scale.y)
}
