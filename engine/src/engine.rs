//! 任务引擎：单次或循环执行步骤列表，支持协作式停止。
//!
//! 同一个 [`Engine`] 同时只允许一次运行；停止请求只置位标志，
//! 由执行线程在每个等待点与每一步之前轮询。

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock, cancellable_sleep};
use crate::config::EngineConfig;
use crate::coords::ScaleFactor;
use crate::desktop::{Desktop, Screen};
use crate::error::{EngineError, StepError};
use crate::locator::LocatorAdapter;
use crate::step::{Step, StepKind};
use crate::steps::{self, Effect, StepCtx};

/// 运行状态，在控制方与执行线程之间共享。
#[derive(Debug, Default)]
pub struct EngineState {
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// 尝试进入运行态，同时清除上一次遗留的停止请求。
    fn acquire(self: &Arc<Self>) -> Result<RunningGuard, EngineError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::AlreadyRunning)?;
        self.stop_requested.store(false, Ordering::SeqCst);
        Ok(RunningGuard(Arc::clone(self)))
    }
}

/// 离开作用域时清除运行标志，覆盖 panic 在内的所有退出路径。
struct RunningGuard(Arc<EngineState>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// 一次运行的输入。
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub steps: Vec<Step>,
    /// 为真时一轮结束后等待片刻再从第一步开始，直到被停止或某一步失败。
    pub loop_forever: bool,
}

impl RunRequest {
    pub fn once(steps: Vec<Step>) -> Self {
        Self {
            steps,
            loop_forever: false,
        }
    }

    pub fn looping(steps: Vec<Step>) -> Self {
        Self {
            steps,
            loop_forever: true,
        }
    }
}

/// 导致运行失败的步骤（从 1 开始编号）与原因。
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    /// 非步骤引起的失败（如执行线程 panic）为 `None`。
    pub step: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("任务完成"),
            RunOutcome::Stopped => f.write_str("任务已停止"),
            RunOutcome::Failed(RunFailure {
                step: Some(index),
                reason,
            }) => write!(f, "任务失败（步骤 {index}）: {reason}"),
            RunOutcome::Failed(RunFailure { step: None, reason }) => {
                write!(f, "任务失败: {reason}")
            }
        }
    }
}

/// 执行过程中推送给调用方的进度事件。`Display` 即面向用户的提示文案。
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        steps: usize,
        loop_forever: bool,
    },
    StepStarted {
        index: usize,
        kind: StepKind,
        value: String,
    },
    StepDone {
        index: usize,
        effect: Effect,
    },
    /// 一次性提示，例如找图降级。
    Warning(String),
    StepFailed {
        index: usize,
        kind: StepKind,
        value: String,
        reason: String,
    },
    /// 底层能力抛出的意外错误。
    Error(String),
    LoopDelay(Duration),
    /// 每次运行恰好一次，且总是最后一个事件。
    Finished(RunOutcome),
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Started {
                steps,
                loop_forever: true,
            } => write!(f, "任务开始，共 {steps} 步，循环执行"),
            RunEvent::Started { steps, .. } => write!(f, "任务开始，共 {steps} 步"),
            RunEvent::StepStarted { index, kind, value } => {
                write!(f, "执行步骤 {index}: 类型={kind}, 内容={value}")
            }
            RunEvent::StepDone { index, effect } => write!(f, "步骤 {index} 完成: {effect}"),
            RunEvent::Warning(msg) => write!(f, "提示: {msg}"),
            RunEvent::StepFailed {
                index,
                kind,
                value,
                reason,
            } => write!(
                f,
                "步骤 {index} 失败: 类型={kind}, 内容={value}, 原因={reason}"
            ),
            RunEvent::Error(msg) => write!(f, "执行出错: {msg}"),
            RunEvent::LoopDelay(delay) => {
                write!(f, "等待 {} 秒进入下一轮循环...", delay.as_secs_f64())
            }
            RunEvent::Finished(outcome) => write!(f, "任务结束: {outcome}"),
        }
    }
}

/// 进度事件的接收方。任何 `FnMut(&RunEvent)` 闭包都可直接使用。
pub trait ProgressSink {
    fn emit(&mut self, event: &RunEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&RunEvent),
{
    fn emit(&mut self, event: &RunEvent) {
        self(event)
    }
}

/// 后台运行的句柄。
pub struct RunHandle {
    thread: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// 等待运行结束并取得结果。
    pub fn join(self) -> RunOutcome {
        self.thread.join().unwrap_or_else(|payload| {
            RunOutcome::Failed(RunFailure {
                step: None,
                reason: panic_message(payload.as_ref()),
            })
        })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

#[derive(Clone)]
pub struct Engine {
    state: Arc<EngineState>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(EngineState::default()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// 请求停止当前运行。只置位标志，最迟一个 tick 后生效；空闲时调用无副作用。
    pub fn stop(&self) {
        if self.state.is_running() {
            info!("stop requested");
        }
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }

    /// 在新线程上执行任务，已有运行时返回 [`EngineError::AlreadyRunning`]。
    pub fn start<S>(
        &self,
        request: RunRequest,
        desktop: Desktop,
        mut sink: S,
    ) -> Result<RunHandle, EngineError>
    where
        S: ProgressSink + Send + 'static,
    {
        let guard = self.state.acquire()?;
        let engine = self.clone();
        let thread = thread::Builder::new()
            .name("rpa-run".to_string())
            .spawn(move || engine.execute(&request, desktop, &mut sink, guard))
            .map_err(EngineError::Spawn)?;
        Ok(RunHandle { thread })
    }

    /// 在当前线程上执行任务直到结束。
    pub fn run(
        &self,
        request: &RunRequest,
        desktop: Desktop,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunOutcome, EngineError> {
        let guard = self.state.acquire()?;
        Ok(self.execute(request, desktop, sink, guard))
    }

    fn execute(
        &self,
        request: &RunRequest,
        mut desktop: Desktop,
        sink: &mut dyn ProgressSink,
        guard: RunningGuard,
    ) -> RunOutcome {
        info!(
            steps = request.steps.len(),
            loop_forever = request.loop_forever,
            "run started"
        );
        sink.emit(&RunEvent::Started {
            steps: request.steps.len(),
            loop_forever: request.loop_forever,
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_passes(request, &mut desktop, &mut *sink)
        }));
        let outcome = result.unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            error!(%reason, "run panicked");
            sink.emit(&RunEvent::Error(reason.clone()));
            RunOutcome::Failed(RunFailure { step: None, reason })
        });

        info!(%outcome, "run finished");
        // 收到结束事件时引擎已空闲，回调里可以直接重新开始
        drop(guard);
        sink.emit(&RunEvent::Finished(outcome.clone()));
        outcome
    }

    fn run_passes(
        &self,
        request: &RunRequest,
        desktop: &mut Desktop,
        sink: &mut dyn ProgressSink,
    ) -> RunOutcome {
        let scale = probe_scale(desktop.screen.as_mut());
        let mut adapter = LocatorAdapter::new();
        let state = &self.state;
        let should_stop = || state.stop_requested();

        loop {
            for (offset, step) in request.steps.iter().enumerate() {
                let index = offset + 1;
                if should_stop() {
                    return RunOutcome::Stopped;
                }

                info!(index, kind = %step.kind, value = %step.value, "step started");
                sink.emit(&RunEvent::StepStarted {
                    index,
                    kind: step.kind,
                    value: step.value.clone(),
                });

                let result = {
                    let mut on_warn = |msg: String| sink.emit(&RunEvent::Warning(msg));
                    let mut ctx = StepCtx {
                        desktop: &mut *desktop,
                        clock: self.clock.as_ref(),
                        config: &self.config,
                        scale,
                        locator: &mut adapter,
                        should_stop: &should_stop,
                        on_warn: &mut on_warn,
                    };
                    steps::execute(step, &mut ctx)
                };

                match result {
                    Ok(effect) => {
                        info!(index, %effect, "step done");
                        sink.emit(&RunEvent::StepDone { index, effect });
                    }
                    Err(StepError::Cancelled) => return RunOutcome::Stopped,
                    Err(err) => return fail_step(index, step, &err, sink),
                }
            }

            if !request.loop_forever {
                return RunOutcome::Completed;
            }

            let delay = self.config.loop_delay();
            sink.emit(&RunEvent::LoopDelay(delay));
            if cancellable_sleep(self.clock.as_ref(), delay, self.config.tick(), should_stop)
                .is_err()
            {
                return RunOutcome::Stopped;
            }
        }
    }
}

fn fail_step(index: usize, step: &Step, err: &StepError, sink: &mut dyn ProgressSink) -> RunOutcome {
    let reason = format!("{err:#}");
    if err.is_step_failure() {
        warn!(index, %reason, "step failed");
        sink.emit(&RunEvent::StepFailed {
            index,
            kind: step.kind,
            value: step.value.clone(),
            reason: reason.clone(),
        });
    } else {
        error!(index, %reason, "step errored");
        sink.emit(&RunEvent::Error(format!("步骤 {index}: {reason}")));
    }
    RunOutcome::Failed(RunFailure {
        step: Some(index),
        reason,
    })
}

/// 每次运行开始时测一次缩放系数；任何一步失败都退化为不缩放。
fn probe_scale(screen: &mut dyn Screen) -> Option<ScaleFactor> {
    let logical = screen
        .logical_size()
        .inspect_err(|err| warn!("无法读取屏幕尺寸: {err:#}"))
        .ok()?;
    let capture = screen
        .capture_size()
        .inspect_err(|err| warn!("无法读取截图尺寸: {err:#}"))
        .ok()?;
    let scale = ScaleFactor::from_sizes(capture, logical);
    info!(?logical, ?capture, ?scale, "scale probed");
    scale
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "执行线程异常退出".to_string()
    }
}
