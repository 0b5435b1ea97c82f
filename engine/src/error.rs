use std::io;

use thiserror::Error;

use crate::clock::Cancelled;

/// 单个步骤执行失败的原因。
///
/// 前四种属于“步骤失败”：任务按失败即停的策略整体终止；`Cancelled` 代表外部请求停止，
/// 不算错误；`Capability` 是底层能力（键鼠、截图、剪贴板……）抛出的意外错误。
#[derive(Debug, Error)]
pub enum StepError {
    /// 参数格式错误、引用的文件不存在等，不会重试。
    #[error("{0}")]
    InvalidInput(String),
    /// 重试次数用尽仍未找到图片。
    #[error("未找到匹配图片: {0}")]
    NotFound(String),
    /// 找图超过总超时，无论重试模式如何。
    #[error("等待图片超时 ({secs}秒): {image}")]
    Timeout { image: String, secs: u64 },
    #[error("未知指令类型: {0}")]
    UnknownKind(i64),
    #[error("任务已停止")]
    Cancelled,
    #[error(transparent)]
    Capability(#[from] anyhow::Error),
}

impl StepError {
    /// 是否属于步骤级失败（而非停止请求或意外错误）。
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            StepError::InvalidInput(_)
                | StepError::NotFound(_)
                | StepError::Timeout { .. }
                | StepError::UnknownKind(_)
        )
    }
}

impl From<Cancelled> for StepError {
    fn from(_: Cancelled) -> Self {
        StepError::Cancelled
    }
}

/// 找图能力返回的错误。
#[derive(Debug, Error)]
pub enum LocateError {
    /// 后端在调用时才发现不支持按置信度匹配（兼容层，优先使用 `Locator::supports_confidence`）。
    #[error("当前环境不支持按置信度找图: {0}")]
    ConfidenceUnsupported(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// 引擎控制面的错误。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("任务正在运行中")]
    AlreadyRunning,
    #[error("无法启动执行线程: {0}")]
    Spawn(#[source] io::Error),
}
