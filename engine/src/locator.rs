//! 找图能力的适配层：文件存在性前置校验、置信度降级与一次性提示。

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::coords::Point;
use crate::desktop::Locator;
use crate::error::{LocateError, StepError};

/// 降级提示文案，同一次运行只输出一次。
pub const CONFIDENCE_DOWNGRADE_NOTICE: &str =
    "检测到环境不支持按置信度找图，已降级为不带置信度的精确匹配。建议启用 opencv 特性提升稳定性。";

/// 包装 [`Locator`]，生命周期为一次运行。
#[derive(Debug, Default)]
pub struct LocatorAdapter {
    warned: HashSet<String>,
    degraded: bool,
}

impl LocatorAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已降级为不带置信度的匹配。
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// 查找 `image` 的中心点。
    ///
    /// - `image` 看起来像路径（含 `/` 或 `\`）但文件不存在时，直接返回
    ///   [`StepError::InvalidInput`]，不进行任何找图。
    /// - 后端不支持置信度时降级为精确匹配，并通过 `on_warn` 提示一次。
    /// - 其他错误按步骤的意外错误向上传递。
    pub fn locate(
        &mut self,
        locator: &mut dyn Locator,
        image: &str,
        confidence: f64,
        on_warn: &mut dyn FnMut(String),
    ) -> Result<Option<Point>, StepError> {
        if image.trim().is_empty() {
            return Err(StepError::InvalidInput("图片路径为空".to_string()));
        }
        if looks_like_path(image) && !Path::new(image).exists() {
            return Err(StepError::InvalidInput(format!("图片文件不存在: {image}")));
        }

        if !self.degraded && !locator.supports_confidence() {
            self.degrade(CONFIDENCE_DOWNGRADE_NOTICE, on_warn);
        }

        if self.degraded {
            return locator
                .locate_center(image, None)
                .map_err(into_step_error);
        }

        match locator.locate_center(image, Some(confidence)) {
            Ok(found) => Ok(found),
            Err(LocateError::ConfidenceUnsupported(reason)) => {
                debug!(%reason, "locator rejected confidence matching");
                self.degrade(CONFIDENCE_DOWNGRADE_NOTICE, on_warn);
                locator
                    .locate_center(image, None)
                    .map_err(into_step_error)
            }
            Err(err) => Err(into_step_error(err)),
        }
    }

    fn degrade(&mut self, notice: &str, on_warn: &mut dyn FnMut(String)) {
        self.degraded = true;
        if self.warned.insert(notice.to_string()) {
            warn!("{notice}");
            on_warn(notice.to_string());
        }
    }
}

fn looks_like_path(image: &str) -> bool {
    image.contains('/') || image.contains('\\')
}

fn into_step_error(err: LocateError) -> StepError {
    match err {
        LocateError::ConfidenceUnsupported(reason) => {
            StepError::Capability(anyhow::anyhow!("找图失败: {reason}"))
        }
        LocateError::Failed(err) => StepError::Capability(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LocatorLog, ScriptedLocator};

    #[test]
    fn missing_file_fails_before_any_search() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log.clone()).hit_on(1, Point::new(1.0, 1.0));
        let mut adapter = LocatorAdapter::new();
        let mut sink = |_: String| {};

        let err = adapter
            .locate(&mut locator, "assets/does-not-exist.png", 0.9, &mut sink)
            .unwrap_err();

        assert!(matches!(err, StepError::InvalidInput(ref m) if m.contains("图片文件不存在")));
        assert_eq!(log.attempts(), 0);
    }

    #[test]
    fn bare_names_skip_the_existence_check() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log.clone()).hit_on(1, Point::new(3.0, 4.0));
        let mut adapter = LocatorAdapter::new();
        let mut sink = |_: String| {};

        let found = adapter
            .locate(&mut locator, "button.png", 0.9, &mut sink)
            .unwrap();

        assert_eq!(found, Some(Point::new(3.0, 4.0)));
        assert_eq!(log.confidences(), vec![Some(0.9)]);
    }

    #[test]
    fn unsupported_backend_degrades_and_warns_once() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log.clone()).without_confidence();
        let mut adapter = LocatorAdapter::new();
        let mut warnings = Vec::new();

        for _ in 0..3 {
            let found = adapter
                .locate(&mut locator, "x.png", 0.9, &mut |m: String| warnings.push(m))
                .unwrap();
            assert_eq!(found, None);
        }

        assert!(adapter.is_degraded());
        assert_eq!(warnings, vec![CONFIDENCE_DOWNGRADE_NOTICE.to_string()]);
        assert_eq!(log.confidences(), vec![None, None, None]);
    }

    #[test]
    fn runtime_rejection_retries_without_confidence() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log.clone())
            .reject_confidence_at_runtime()
            .hit_on(2, Point::new(7.0, 8.0));
        let mut adapter = LocatorAdapter::new();
        let mut warnings = Vec::new();

        let found = adapter
            .locate(&mut locator, "x.png", 0.9, &mut |m: String| warnings.push(m))
            .unwrap();

        assert_eq!(found, Some(Point::new(7.0, 8.0)));
        assert_eq!(log.confidences(), vec![Some(0.9), None]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn backend_failures_propagate() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log).fail_with("capture denied");
        let mut adapter = LocatorAdapter::new();
        let mut sink = |_: String| {};

        let err = adapter
            .locate(&mut locator, "x.png", 0.9, &mut sink)
            .unwrap_err();
        assert!(matches!(err, StepError::Capability(_)));
        assert!(err.to_string().contains("capture denied"));
    }

    #[test]
    fn empty_image_reference_is_invalid_input() {
        let log = LocatorLog::default();
        let mut locator = ScriptedLocator::new(log.clone());
        let mut adapter = LocatorAdapter::new();
        let mut sink = |_: String| {};

        let err = adapter.locate(&mut locator, "  ", 0.9, &mut sink).unwrap_err();
        assert!(err.is_step_failure());
        assert_eq!(log.attempts(), 0);
    }
}
