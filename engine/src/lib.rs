//! 桌面自动化的执行引擎。
//!
//! 一个任务由有序的 [`Step`] 列表组成（点击、输入、滚动、组合键、截图……），
//! [`Engine`] 在独立线程上单次或循环执行它们。所有等待都走 [`clock::cancellable_sleep`]，
//! 因此外部调用 [`Engine::stop`] 后最多一个 tick 即可生效；找图步骤带有重试次数与总超时，
//! 不会无限卡死。
//!
//! 屏幕相关的能力（找图、键鼠注入、剪贴板、截图、前台应用）都以 trait 的形式注入，
//! 见 [`desktop`]，具体实现位于 `water-rpa` 二进制 crate。

pub mod clock;
pub mod config;
pub mod coords;
pub mod desktop;
mod engine;
mod error;
pub mod hotkey;
pub mod locator;
mod step;
pub mod steps;
pub mod taskfile;

#[cfg(test)]
mod testing;

pub use clock::{Cancelled, Clock, SystemClock, cancellable_sleep};
pub use config::EngineConfig;
pub use coords::{Platform, Point, ScaleFactor, normalize};
pub use desktop::{Clipboard, Desktop, InputDriver, Key, Locator, MouseButton, Screen};
pub use engine::{
    Engine, EngineState, ProgressSink, RunEvent, RunFailure, RunHandle, RunOutcome, RunRequest,
};
pub use error::{EngineError, LocateError, StepError};
pub use step::{RetryPolicy, Step, StepKind};
pub use steps::Effect;
pub use taskfile::TaskFileError;
