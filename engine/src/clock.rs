//! 单调时钟与可取消等待。

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// 默认轮询粒度：停止请求最迟在这么久之后被观察到。
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// 外部请求停止时，等待/重试循环返回的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("任务已停止")]
pub struct Cancelled;

/// 单调时间源。
///
/// 引擎中所有“现在几点”与“睡一会儿”都经过这里，测试可以换成虚拟时钟。
pub trait Clock: Send + Sync {
    /// 自时钟创建以来经过的时间。
    fn now(&self) -> Duration;

    /// 阻塞当前线程 `duration`。
    fn sleep(&self, duration: Duration);
}

/// 基于 [`Instant`] 与 [`thread::sleep`] 的真实时钟。
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// 分片等待 `duration`，每个 tick 检查一次 `should_stop`。
///
/// - `duration` 为零时立即返回，不会调用 `should_stop`。
/// - `should_stop()` 一旦为真立即返回 [`Cancelled`]，不会等满剩余时间。
/// - 最后一片会被截短，恰好落在截止时间上。
/// - `tick` 为零时退回 [`DEFAULT_TICK`]。
pub fn cancellable_sleep(
    clock: &dyn Clock,
    duration: Duration,
    tick: Duration,
    should_stop: impl Fn() -> bool,
) -> Result<(), Cancelled> {
    if duration.is_zero() {
        return Ok(());
    }
    let tick = if tick.is_zero() { DEFAULT_TICK } else { tick };

    let deadline = clock.now() + duration;
    loop {
        if should_stop() {
            return Err(Cancelled);
        }

        let now = clock.now();
        if now >= deadline {
            return Ok(());
        }

        clock.sleep(tick.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;
    use std::cell::Cell;

    #[test]
    fn zero_duration_returns_without_polling() {
        let clock = ManualClock::new();
        let polled = Cell::new(0);
        let res = cancellable_sleep(&clock, Duration::ZERO, DEFAULT_TICK, || {
            polled.set(polled.get() + 1);
            true
        });
        assert_eq!(res, Ok(()));
        assert_eq!(polled.get(), 0);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn last_tick_is_shortened_to_the_deadline() {
        let clock = ManualClock::new();
        cancellable_sleep(&clock, Duration::from_millis(250), DEFAULT_TICK, || false).unwrap();

        assert_eq!(clock.now(), Duration::from_millis(250));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(50)
            ]
        );
    }

    #[test]
    fn stop_mid_wait_cancels_within_one_tick() {
        let clock = ManualClock::new();
        let stop_at = Duration::from_millis(1_230);
        let res = cancellable_sleep(&clock, Duration::from_secs(10), DEFAULT_TICK, || {
            clock.now() >= stop_at
        });

        assert_eq!(res, Err(Cancelled));
        let elapsed = clock.now();
        assert!(elapsed >= stop_at);
        assert!(elapsed - stop_at <= DEFAULT_TICK, "cancelled late: {elapsed:?}");
    }

    #[test]
    fn stop_before_start_cancels_immediately() {
        let clock = ManualClock::new();
        let res = cancellable_sleep(&clock, Duration::from_secs(1), DEFAULT_TICK, || true);
        assert_eq!(res, Err(Cancelled));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn zero_tick_falls_back_to_default() {
        let clock = ManualClock::new();
        cancellable_sleep(&clock, Duration::from_millis(200), Duration::ZERO, || false).unwrap();
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn system_clock_really_sleeps() {
        let clock = SystemClock::new();
        let before = clock.now();
        cancellable_sleep(&clock, Duration::from_millis(30), Duration::from_millis(10), || {
            false
        })
        .unwrap();
        assert!(clock.now() - before >= Duration::from_millis(30));
    }
}
