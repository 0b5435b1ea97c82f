use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 步骤类型。任务文件里以数字编码（1–9），沿用配置编辑器的写法存为浮点数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum StepKind {
    ClickLeft,
    DoubleClickLeft,
    ClickRight,
    TypeText,
    Wait,
    Scroll,
    Hotkey,
    Hover,
    Screenshot,
    /// 无法识别的编码：照原样保存，执行时失败。
    ///
    /// 编码以浮点数落盘，只有绝对值不超过 2^53 的编码能原样往返。
    Unknown(i64),
}

impl StepKind {
    pub fn code(self) -> i64 {
        match self {
            StepKind::ClickLeft => 1,
            StepKind::DoubleClickLeft => 2,
            StepKind::ClickRight => 3,
            StepKind::TypeText => 4,
            StepKind::Wait => 5,
            StepKind::Scroll => 6,
            StepKind::Hotkey => 7,
            StepKind::Hover => 8,
            StepKind::Screenshot => 9,
            StepKind::Unknown(code) => code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => StepKind::ClickLeft,
            2 => StepKind::DoubleClickLeft,
            3 => StepKind::ClickRight,
            4 => StepKind::TypeText,
            5 => StepKind::Wait,
            6 => StepKind::Scroll,
            7 => StepKind::Hotkey,
            8 => StepKind::Hover,
            9 => StepKind::Screenshot,
            other => StepKind::Unknown(other),
        }
    }

    /// 是否需要在屏幕上找图（只有这些类型使用重试策略）。
    pub fn searches_screen(self) -> bool {
        matches!(
            self,
            StepKind::ClickLeft | StepKind::DoubleClickLeft | StepKind::ClickRight | StepKind::Hover
        )
    }
}

/// 浮点数能精确表示的最大整数。
const MAX_EXACT_CODE: f64 = 9_007_199_254_740_992.0;

impl TryFrom<f64> for StepKind {
    type Error = String;

    fn try_from(code: f64) -> Result<Self, Self::Error> {
        if !code.is_finite() || code.fract() != 0.0 {
            return Err(format!("指令类型编码必须是整数: {code}"));
        }
        if code.abs() > MAX_EXACT_CODE {
            return Err(format!("指令类型编码超出范围: {code}"));
        }
        Ok(StepKind::from_code(code as i64))
    }
}

impl From<StepKind> for f64 {
    fn from(kind: StepKind) -> Self {
        kind.code() as f64
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::ClickLeft => f.write_str("左键单击"),
            StepKind::DoubleClickLeft => f.write_str("左键双击"),
            StepKind::ClickRight => f.write_str("右键单击"),
            StepKind::TypeText => f.write_str("输入文本"),
            StepKind::Wait => f.write_str("等待(秒)"),
            StepKind::Scroll => f.write_str("滚轮滑动"),
            StepKind::Hotkey => f.write_str("系统按键"),
            StepKind::Hover => f.write_str("鼠标悬停"),
            StepKind::Screenshot => f.write_str("截图保存"),
            StepKind::Unknown(code) => write!(f, "未知({code})"),
        }
    }
}

/// 找图的重试策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// 只找一次。
    Once,
    /// 最多找 N 次（N > 1）。
    Attempts(u32),
    /// 一直找直到命中（仍受总超时约束）。
    Unbounded,
}

impl RetryPolicy {
    /// 由任务文件中的原始值归一：`-1` 无限，`>1` 有限次，其余（含 0 与小于 -1）按一次处理。
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            -1 => RetryPolicy::Unbounded,
            n if n > 1 => RetryPolicy::Attempts(u32::try_from(n).unwrap_or(u32::MAX)),
            _ => RetryPolicy::Once,
        }
    }

    /// 最大尝试次数；无限模式返回 `None`。
    pub fn max_attempts(self) -> Option<u32> {
        match self {
            RetryPolicy::Once => Some(1),
            RetryPolicy::Attempts(n) => Some(n),
            RetryPolicy::Unbounded => None,
        }
    }
}

/// 一条自动化指令。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// 含义随 `kind` 变化：图片路径、文本、秒数、滚动量、组合键或截图保存位置。
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    /// 原样保存的重试值，执行时经 [`RetryPolicy::from_raw`] 归一。
    #[serde(default = "default_retry", deserialize_with = "lenient_retry")]
    pub retry: i64,
}

impl Step {
    pub fn new(kind: StepKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            retry: default_retry(),
        }
    }

    pub fn with_retry(mut self, retry: i64) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_raw(self.retry)
    }
}

fn default_retry() -> i64 {
    1
}

// 编辑器可能把数字写成 JSON number，这里统一收成字符串
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("参数值必须是字符串: {other}"))),
    }
}

// 无法解析的重试值按 1 处理，与编辑器行为一致
fn lenient_retry<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let retry = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(retry.unwrap_or_else(default_retry))
}
