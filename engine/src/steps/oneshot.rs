//! 不需要找图的一次性步骤：输入文本、等待、滚动、组合键与截图。
//!
//! 这些步骤忽略重试值，执行一次即结束。

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::{Effect, StepCtx};
use crate::error::StepError;
use crate::hotkey::{paste_chord, parse_chord};

const IMAGE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".bmp"];
const DEFAULT_EXTENSION: &str = "png";

/// 通过剪贴板粘贴文本，之后等待目标程序处理粘贴。
pub fn type_text(ctx: &mut StepCtx<'_>, text: &str) -> Result<Effect, StepError> {
    ctx.desktop.clipboard.set_text(text)?;
    ctx.desktop.input.chord(&paste_chord(ctx.desktop.platform))?;
    ctx.sleep(ctx.config.paste_settle())?;
    Ok(Effect::Typed {
        text: text.to_string(),
    })
}

pub fn wait(ctx: &mut StepCtx<'_>, value: &str) -> Result<Effect, StepError> {
    let duration = parse_seconds(value)?;
    ctx.sleep(duration)?;
    Ok(Effect::Waited {
        secs: duration.as_secs_f64(),
    })
}

pub fn scroll(ctx: &mut StepCtx<'_>, value: &str) -> Result<Effect, StepError> {
    let delta: i32 = value
        .trim()
        .parse()
        .map_err(|_| StepError::InvalidInput(format!("滚动量必须是整数: {value:?}")))?;
    ctx.desktop.input.scroll(delta)?;
    Ok(Effect::Scrolled { delta })
}

pub fn hotkey(ctx: &mut StepCtx<'_>, value: &str) -> Result<Effect, StepError> {
    let keys = parse_chord(value, ctx.desktop.platform)?;
    debug!(?keys, "pressing chord");
    ctx.desktop.input.chord(&keys)?;
    Ok(Effect::Pressed {
        chord: value.trim().to_string(),
    })
}

pub fn screenshot(ctx: &mut StepCtx<'_>, value: &str) -> Result<Effect, StepError> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let path = screenshot_path(value, &stamp)?;
    ctx.desktop.screen.save_capture(&path)?;
    Ok(Effect::Captured { path })
}

/// 等待秒数：负数按 0 处理，非数字或非有限值报错。
fn parse_seconds(value: &str) -> Result<Duration, StepError> {
    let invalid = || StepError::InvalidInput(format!("等待时间必须是数字: {value:?}"));
    let secs: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() {
        return Err(invalid());
    }
    if secs <= 0.0 {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// 计算截图的保存路径。
///
/// 已存在的目录下生成 `screenshot_<stamp>.png`；否则按文件路径处理，
/// 扩展名不在 png/jpg/bmp 之列时追加 `.png`。
pub fn screenshot_path(value: &str, stamp: &str) -> Result<PathBuf, StepError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StepError::InvalidInput("截图保存路径为空".to_string()));
    }

    let path = Path::new(value);
    if path.is_dir() {
        return Ok(path.join(format!("screenshot_{stamp}.{DEFAULT_EXTENSION}")));
    }

    // 按字符串后缀判断，`.png` 这样的名字也算带扩展名
    let lowered = value.to_lowercase();
    let known = IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext));
    if known {
        Ok(path.to_path_buf())
    } else {
        Ok(PathBuf::from(format!("{value}.{DEFAULT_EXTENSION}")))
    }
}
