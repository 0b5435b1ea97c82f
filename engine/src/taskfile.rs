//! 任务文件的读写与运行前校验。
//!
//! 文件内容是步骤对象的 JSON 数组，4 空格缩进，中文原样保存：
//!
//! ```json
//! [
//!     {
//!         "type": 1.0,
//!         "value": "images/ok.png",
//!         "retry": -1
//!     }
//! ]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::debug;

use crate::step::Step;

#[derive(Debug, Error)]
pub enum TaskFileError {
    #[error("无法读取任务文件 {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("无法写入任务文件 {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("任务文件格式错误: {0}")]
    Format(#[from] serde_json::Error),
    #[error("没有可保存的指令")]
    NothingToSave,
    #[error("请至少添加一条指令")]
    Empty,
    #[error("第 {index} 条指令参数为空")]
    EmptyValue { index: usize },
}

pub fn from_str(text: &str) -> Result<Vec<Step>, TaskFileError> {
    Ok(serde_json::from_str(text)?)
}

/// 序列化为 4 空格缩进的 JSON。
pub fn to_string(steps: &[Step]) -> Result<String, TaskFileError> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    steps.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<Step>, TaskFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| TaskFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let steps = from_str(&text)?;
    debug!(path = %path.display(), steps = steps.len(), "task file loaded");
    Ok(steps)
}

/// 保存任务。允许参数为空的指令，方便之后继续编辑；空列表不保存。
pub fn save(path: impl AsRef<Path>, steps: &[Step]) -> Result<(), TaskFileError> {
    if steps.is_empty() {
        return Err(TaskFileError::NothingToSave);
    }
    let path = path.as_ref();
    let text = to_string(steps)?;
    fs::write(path, text).map_err(|source| TaskFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), steps = steps.len(), "task file saved");
    Ok(())
}

/// 开始运行前的检查：至少一条指令，且每条指令的参数都不为空。
pub fn validate_for_run(steps: &[Step]) -> Result<(), TaskFileError> {
    if let Some(offset) = steps.iter().position(|step| step.value.is_empty()) {
        return Err(TaskFileError::EmptyValue { index: offset + 1 });
    }
    if steps.is_empty() {
        return Err(TaskFileError::Empty);
    }
    Ok(())
}
