//! 各类步骤的执行器。
//!
//! 找图类（单击、双击、右键、悬停）见 [`search`]，其余一次性动作见 [`oneshot`]。
//! 执行器只返回 [`Effect`] 或 [`StepError`]，如何处置整个任务由引擎决定。

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::clock::{Clock, cancellable_sleep};
use crate::config::EngineConfig;
use crate::coords::{Point, ScaleFactor};
use crate::desktop::{Desktop, MouseButton};
use crate::error::StepError;
use crate::locator::LocatorAdapter;
use crate::step::{Step, StepKind};

pub mod oneshot;
pub mod search;

/// 执行单个步骤所需的上下文，由引擎在每一步前组装。
pub struct StepCtx<'a> {
    pub desktop: &'a mut Desktop,
    pub clock: &'a dyn Clock,
    pub config: &'a EngineConfig,
    /// 本次运行开始时测得的缩放系数。
    pub scale: Option<ScaleFactor>,
    pub locator: &'a mut LocatorAdapter,
    pub should_stop: &'a dyn Fn() -> bool,
    /// 一次性提示（如找图降级）的出口。
    pub on_warn: &'a mut dyn FnMut(String),
}

impl StepCtx<'_> {
    /// 已请求停止时返回 [`StepError::Cancelled`]。
    pub fn check_stop(&self) -> Result<(), StepError> {
        if (self.should_stop)() {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    /// 可取消的等待，粒度取自配置。
    pub fn sleep(&self, duration: Duration) -> Result<(), StepError> {
        let should_stop = self.should_stop;
        cancellable_sleep(self.clock, duration, self.config.tick(), should_stop)?;
        Ok(())
    }

    /// 通过适配层找一次图。
    pub fn locate(&mut self, image: &str) -> Result<Option<Point>, StepError> {
        self.locator.locate(
            self.desktop.locator.as_mut(),
            image,
            self.config.confidence,
            &mut *self.on_warn,
        )
    }
}

/// 步骤执行后可观察到的效果，用于进度输出。
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Clicked {
        image: String,
        button: MouseButton,
        clicks: u32,
        x: i32,
        y: i32,
        /// 首次点击只切换了前台应用，已补点一次。
        compensated: bool,
    },
    Hovered {
        image: String,
        x: i32,
        y: i32,
    },
    Typed {
        text: String,
    },
    Waited {
        secs: f64,
    },
    Scrolled {
        delta: i32,
    },
    Pressed {
        chord: String,
    },
    Captured {
        path: PathBuf,
    },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Clicked {
                image,
                button,
                clicks,
                x,
                y,
                compensated,
            } => {
                let action = match (button, clicks) {
                    (MouseButton::Right, _) => "右键单击",
                    (MouseButton::Left, 2) => "双击左键",
                    (MouseButton::Left, _) => "单击左键",
                };
                write!(f, "{action}: {image} @ ({x}, {y})")?;
                if *compensated {
                    f.write_str("（前台应用切换，已补点一次）")?;
                }
                Ok(())
            }
            Effect::Hovered { image, x, y } => write!(f, "鼠标悬停: {image} @ ({x}, {y})"),
            Effect::Typed { text } => write!(f, "输入文本: {text}"),
            Effect::Waited { secs } => write!(f, "等待 {secs} 秒"),
            Effect::Scrolled { delta } => write!(f, "滚轮滑动 {delta}"),
            Effect::Pressed { chord } => write!(f, "按键组合: {chord}"),
            Effect::Captured { path } => write!(f, "截图已保存: {}", path.display()),
        }
    }
}

/// 按类型分派执行一个步骤。
pub fn execute(step: &Step, ctx: &mut StepCtx<'_>) -> Result<Effect, StepError> {
    let policy = step.retry_policy();
    match step.kind {
        StepKind::ClickLeft => search::click(ctx, &step.value, policy, MouseButton::Left, 1),
        StepKind::DoubleClickLeft => search::click(ctx, &step.value, policy, MouseButton::Left, 2),
        StepKind::ClickRight => search::click(ctx, &step.value, policy, MouseButton::Right, 1),
        StepKind::Hover => search::hover(ctx, &step.value, policy),
        StepKind::TypeText => oneshot::type_text(ctx, &step.value),
        StepKind::Wait => oneshot::wait(ctx, &step.value),
        StepKind::Scroll => oneshot::scroll(ctx, &step.value),
        StepKind::Hotkey => oneshot::hotkey(ctx, &step.value),
        StepKind::Screenshot => oneshot::screenshot(ctx, &step.value),
        StepKind::Unknown(code) => Err(StepError::UnknownKind(code)),
    }
}
