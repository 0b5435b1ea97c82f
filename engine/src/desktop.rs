//! 引擎依赖的桌面能力。
//!
//! 引擎本身不碰屏幕与键鼠，只通过这里的 trait 调用；具体实现由调用方注入。
//! 每个 trait 都要求 `Send`，因为整个 [`Desktop`] 会被移动到执行线程。

use std::path::Path;

use anyhow::Result;

use crate::coords::{Platform, Point};
use crate::error::LocateError;

/// 在当前屏幕上找图。
pub trait Locator: Send {
    /// 是否支持按置信度匹配。不支持时引擎会降级为精确匹配并提示一次。
    fn supports_confidence(&self) -> bool {
        true
    }

    /// 返回最佳匹配的中心点（截图像素坐标），未找到返回 `Ok(None)`。
    ///
    /// `confidence` 为 `None` 表示不带置信度的匹配。
    fn locate_center(
        &mut self,
        image: &str,
        confidence: Option<f64>,
    ) -> Result<Option<Point>, LocateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// 组合键中的单个按键（已完成别名归一化）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Ctrl,
    Alt,
    Shift,
    /// macOS 的 Command，Windows 的 Win，Linux 的 Super。
    Meta,
    Enter,
    Tab,
    Space,
    Escape,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    CapsLock,
    /// F1–F12。
    F(u8),
    Char(char),
}

/// 键鼠注入。
pub trait InputDriver: Send {
    /// 移动鼠标，不点击。
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;

    /// 移动到 `(x, y)` 后点击 `clicks` 次。
    fn click(&mut self, x: i32, y: i32, button: MouseButton, clicks: u32) -> Result<()>;

    /// 垂直滚动，正值向上。
    fn scroll(&mut self, delta: i32) -> Result<()>;

    /// 按下整组按键后再依次松开。
    fn chord(&mut self, keys: &[Key]) -> Result<()>;
}

pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// 屏幕信息、截图与前台应用探测。
pub trait Screen: Send {
    /// 逻辑屏幕尺寸（输入注入使用的坐标系）。
    fn logical_size(&mut self) -> Result<(u32, u32)>;

    /// 一次截图的像素尺寸。
    fn capture_size(&mut self) -> Result<(u32, u32)>;

    /// 截取整个屏幕并写入 `path`。
    fn save_capture(&mut self, path: &Path) -> Result<()>;

    /// 当前最前台应用的名称；平台不支持或探测失败时返回 `None`。
    fn frontmost_app(&mut self) -> Option<String> {
        None
    }
}

/// 一次运行所需的全部桌面能力。
pub struct Desktop {
    pub locator: Box<dyn Locator>,
    pub input: Box<dyn InputDriver>,
    pub clipboard: Box<dyn Clipboard>,
    pub screen: Box<dyn Screen>,
    pub platform: Platform,
}
