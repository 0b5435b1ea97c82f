//! 单元测试用的虚拟时钟与桌面替身。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::coords::{Platform, Point, ScaleFactor};
use crate::desktop::{Clipboard, Desktop, InputDriver, Key, Locator, MouseButton, Screen};
use crate::error::LocateError;
use crate::locator::LocatorAdapter;
use crate::steps::StepCtx;

/// 虚拟时钟：`sleep` 只推进时间并记录时长，不真正阻塞。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// 找图调用记录：每次调用传入的置信度。
#[derive(Debug, Clone, Default)]
pub struct LocatorLog(Arc<Mutex<Vec<Option<f64>>>>);

impl LocatorLog {
    pub fn attempts(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn confidences(&self) -> Vec<Option<f64>> {
        self.0.lock().unwrap().clone()
    }
}

/// 按脚本返回结果的找图替身。默认永远找不到。
pub struct ScriptedLocator {
    log: LocatorLog,
    hit_on: Option<(usize, Point)>,
    always: Option<Point>,
    supports_confidence: bool,
    reject_at_runtime: bool,
    fail: Option<String>,
    /// 每次调用额外消耗的时间，模拟截图与匹配的开销。
    cost: Option<(Arc<ManualClock>, Duration)>,
}

impl ScriptedLocator {
    pub fn new(log: LocatorLog) -> Self {
        Self {
            log,
            hit_on: None,
            always: None,
            supports_confidence: true,
            reject_at_runtime: false,
            fail: None,
            cost: None,
        }
    }

    /// 第 `attempt` 次调用（从 1 开始）起返回 `point`。
    pub fn hit_on(mut self, attempt: usize, point: Point) -> Self {
        self.hit_on = Some((attempt, point));
        self
    }

    pub fn always_hit(mut self, point: Point) -> Self {
        self.always = Some(point);
        self
    }

    pub fn without_confidence(mut self) -> Self {
        self.supports_confidence = false;
        self
    }

    pub fn reject_confidence_at_runtime(mut self) -> Self {
        self.reject_at_runtime = true;
        self
    }

    pub fn fail_with(mut self, msg: &str) -> Self {
        self.fail = Some(msg.to_string());
        self
    }

    pub fn costing(mut self, clock: Arc<ManualClock>, per_call: Duration) -> Self {
        self.cost = Some((clock, per_call));
        self
    }
}

impl Locator for ScriptedLocator {
    fn supports_confidence(&self) -> bool {
        self.supports_confidence
    }

    fn locate_center(
        &mut self,
        _image: &str,
        confidence: Option<f64>,
    ) -> Result<Option<Point>, LocateError> {
        let attempt = {
            let mut calls = self.log.0.lock().unwrap();
            calls.push(confidence);
            calls.len()
        };
        if let Some((clock, cost)) = &self.cost {
            clock.advance(*cost);
        }
        if let Some(msg) = &self.fail {
            return Err(LocateError::Failed(anyhow!("{msg}")));
        }
        if self.reject_at_runtime && confidence.is_some() {
            return Err(LocateError::ConfidenceUnsupported(
                "confidence requires opencv".to_string(),
            ));
        }
        if let Some(point) = self.always {
            return Ok(Some(point));
        }
        Ok(match self.hit_on {
            Some((n, point)) if attempt >= n => Some(point),
            _ => None,
        })
    }
}

/// 桌面副作用的统一记录，便于断言调用顺序。
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Move(i32, i32),
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    },
    Scroll(i32),
    Chord(Vec<Key>),
    Clipboard(String),
    Capture(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Click { .. }))
            .collect()
    }

    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct RecordingInput(pub CallLog);

impl InputDriver for RecordingInput {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.0.push(Call::Move(x, y));
        Ok(())
    }

    fn click(&mut self, x: i32, y: i32, button: MouseButton, clicks: u32) -> Result<()> {
        self.0.push(Call::Click {
            x,
            y,
            button,
            clicks,
        });
        Ok(())
    }

    fn scroll(&mut self, delta: i32) -> Result<()> {
        self.0.push(Call::Scroll(delta));
        Ok(())
    }

    fn chord(&mut self, keys: &[Key]) -> Result<()> {
        self.0.push(Call::Chord(keys.to_vec()));
        Ok(())
    }
}

pub struct RecordingClipboard(pub CallLog);

impl Clipboard for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.0.push(Call::Clipboard(text.to_string()));
        Ok(())
    }
}

/// 屏幕替身：固定尺寸，前台应用按脚本依次返回（最后一个值重复使用）。
pub struct FakeScreen {
    pub log: CallLog,
    pub logical: Option<(u32, u32)>,
    pub capture: Option<(u32, u32)>,
    pub frontmost: VecDeque<Option<String>>,
}

impl FakeScreen {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            logical: Some((1440, 900)),
            capture: Some((1440, 900)),
            frontmost: VecDeque::new(),
        }
    }
}

impl Screen for FakeScreen {
    fn logical_size(&mut self) -> Result<(u32, u32)> {
        self.logical.ok_or_else(|| anyhow!("no display"))
    }

    fn capture_size(&mut self) -> Result<(u32, u32)> {
        self.capture.ok_or_else(|| anyhow!("capture denied"))
    }

    fn save_capture(&mut self, path: &Path) -> Result<()> {
        self.log.push(Call::Capture(path.to_path_buf()));
        Ok(())
    }

    fn frontmost_app(&mut self) -> Option<String> {
        if self.frontmost.len() > 1 {
            self.frontmost.pop_front().flatten()
        } else {
            self.frontmost.front().cloned().flatten()
        }
    }
}

/// 组装一个全部由替身构成的 [`Desktop`]。
pub fn fake_desktop(
    locator: ScriptedLocator,
    screen: FakeScreen,
    log: &CallLog,
    platform: Platform,
) -> Desktop {
    Desktop {
        locator: Box::new(locator),
        input: Box::new(RecordingInput(log.clone())),
        clipboard: Box::new(RecordingClipboard(log.clone())),
        screen: Box::new(screen),
        platform,
    }
}

/// 单步执行器的测试夹具：拥有桌面替身、虚拟时钟与适配层，按需借出 [`StepCtx`]。
pub struct Harness {
    pub desktop: Desktop,
    pub clock: Arc<ManualClock>,
    pub config: EngineConfig,
    pub scale: Option<ScaleFactor>,
    pub adapter: LocatorAdapter,
    pub stop: Box<dyn Fn() -> bool>,
    pub warnings: Vec<String>,
    pub log: CallLog,
    pub locator_log: LocatorLog,
}

impl Harness {
    pub fn new(platform: Platform) -> Self {
        let log = CallLog::default();
        let locator_log = LocatorLog::default();
        let desktop = fake_desktop(
            ScriptedLocator::new(locator_log.clone()),
            FakeScreen::new(log.clone()),
            &log,
            platform,
        );
        Self {
            desktop,
            clock: Arc::new(ManualClock::new()),
            config: EngineConfig::default(),
            scale: None,
            adapter: LocatorAdapter::new(),
            stop: Box::new(|| false),
            warnings: Vec::new(),
            log,
            locator_log,
        }
    }

    pub fn with_locator(mut self, build: impl FnOnce(ScriptedLocator) -> ScriptedLocator) -> Self {
        self.desktop.locator = Box::new(build(ScriptedLocator::new(self.locator_log.clone())));
        self
    }

    pub fn with_screen(mut self, build: impl FnOnce(FakeScreen) -> FakeScreen) -> Self {
        self.desktop.screen = Box::new(build(FakeScreen::new(self.log.clone())));
        self
    }

    pub fn run<R>(&mut self, f: impl FnOnce(&mut StepCtx<'_>) -> R) -> R {
        let warnings = &mut self.warnings;
        let mut on_warn = |msg: String| warnings.push(msg);
        let mut ctx = StepCtx {
            desktop: &mut self.desktop,
            clock: self.clock.as_ref(),
            config: &self.config,
            scale: self.scale,
            locator: &mut self.adapter,
            should_stop: self.stop.as_ref(),
            on_warn: &mut on_warn,
        };
        f(&mut ctx)
    }
}
