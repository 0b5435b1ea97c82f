//! 找图类步骤：按重试策略找图，换算坐标后点击或悬停。

use tracing::{debug, info};

use super::{Effect, StepCtx};
use crate::coords::{Point, normalize};
use crate::desktop::MouseButton;
use crate::error::StepError;
use crate::step::RetryPolicy;

/// 按 `policy` 反复找图，直到命中、次数用尽、超时或被停止。
///
/// - 每次尝试前检查停止请求与总超时（`config.step_timeout_secs`）。
/// - 两次尝试之间可取消地等待 `config.retry_interval_ms`；最后一次尝试之后不再等待。
/// - 次数用尽返回 [`StepError::NotFound`]，超时返回 [`StepError::Timeout`]。
pub fn find(ctx: &mut StepCtx<'_>, image: &str, policy: RetryPolicy) -> Result<Point, StepError> {
    let timeout = ctx.config.step_timeout();
    let started = ctx.clock.now();
    let mut attempt: u32 = 0;

    loop {
        ctx.check_stop()?;
        if ctx.clock.now().saturating_sub(started) > timeout {
            return Err(StepError::Timeout {
                image: image.to_string(),
                secs: timeout.as_secs(),
            });
        }

        attempt = attempt.saturating_add(1);
        if let Some(point) = ctx.locate(image)? {
            debug!(image, attempt, x = point.x, y = point.y, "image located");
            return Ok(point);
        }
        debug!(image, attempt, "image not found");

        if policy.max_attempts().is_some_and(|max| attempt >= max) {
            return Err(StepError::NotFound(image.to_string()));
        }
        ctx.sleep(ctx.config.retry_interval())?;
    }
}

/// 找图后在中心点点击 `clicks` 次。
///
/// 点击前后各读一次前台应用；若发生了切换，说明第一次点击很可能只是激活了窗口，
/// 于是在同一位置立即补点一次。补点不会再次找图，也不会递归。
pub fn click(
    ctx: &mut StepCtx<'_>,
    image: &str,
    policy: RetryPolicy,
    button: MouseButton,
    clicks: u32,
) -> Result<Effect, StepError> {
    let found = find(ctx, image, policy)?;
    let (x, y) = normalize(found, ctx.scale, ctx.desktop.platform).rounded();

    let before = ctx.desktop.screen.frontmost_app();
    ctx.desktop.input.click(x, y, button, clicks)?;
    let after = ctx.desktop.screen.frontmost_app();

    let compensated = focus_changed(before.as_deref(), after.as_deref());
    if compensated {
        info!(
            before = before.as_deref().unwrap_or_default(),
            after = after.as_deref().unwrap_or_default(),
            "frontmost app changed, clicking again"
        );
        ctx.desktop.input.click(x, y, button, clicks)?;
    }

    Ok(Effect::Clicked {
        image: image.to_string(),
        button,
        clicks,
        x,
        y,
        compensated,
    })
}

/// 找图后把鼠标移到中心点，不点击。
pub fn hover(ctx: &mut StepCtx<'_>, image: &str, policy: RetryPolicy) -> Result<Effect, StepError> {
    let found = find(ctx, image, policy)?;
    let (x, y) = normalize(found, ctx.scale, ctx.desktop.platform).rounded();
    ctx.desktop.input.move_to(x, y)?;
    Ok(Effect::Hovered {
        image: image.to_string(),
        x,
        y,
    })
}

fn focus_changed(before: Option<&str>, after: Option<&str>) -> bool {
    matches!((before, after), (Some(b), Some(a)) if b != a)
}
