use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 引擎的可调参数，可从 JSON 文件读取；缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 可取消等待的轮询粒度（毫秒）。
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// 两次找图之间的间隔（毫秒）。
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// 单个找图步骤的总超时（秒），对无限重试同样生效。
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// 循环模式下两轮之间的间隔（毫秒）。
    #[serde(default = "default_loop_delay_ms")]
    pub loop_delay_ms: u64,
    /// 粘贴文本后给目标程序留的处理时间（毫秒）。
    #[serde(default = "default_paste_settle_ms")]
    pub paste_settle_ms: u64,
    /// 找图置信度阈值。
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            step_timeout_secs: default_step_timeout_secs(),
            loop_delay_ms: default_loop_delay_ms(),
            paste_settle_ms: default_paste_settle_ms(),
            confidence: default_confidence(),
        }
    }
}

impl EngineConfig {
    /// 从 JSON 文件读取配置。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取引擎配置 {}", path.display()))?;
        let cfg: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("引擎配置格式错误 {}", path.display()))?;
        Ok(cfg)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }
}

fn default_tick_ms() -> u64 {
    100
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_loop_delay_ms() -> u64 {
    100
}

fn default_paste_settle_ms() -> u64 {
    500
}

fn default_confidence() -> f64 {
    0.9
}
