//! macOS 前台应用探测。任何失败都返回 `None`，调用方据此跳过补点。

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

const SCRIPT: &str =
    "tell application \"System Events\" to get name of first application process whose frontmost is true";

/// 通过 `osascript` 查询最前台应用的名称，超过 `timeout` 即放弃。
pub fn query(timeout: Duration) -> Option<String> {
    let mut child = Command::new("osascript")
        .args(["-e", SCRIPT])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .inspect_err(|err| debug!("osascript spawn failed: {err}"))
        .ok()?;

    match child.wait_timeout(timeout) {
        Ok(Some(status)) if status.success() => {
            let output = child.wait_with_output().ok()?;
            parse_app_name(&output.stdout)
        }
        Ok(Some(status)) => {
            debug!(%status, "osascript exited with failure");
            None
        }
        Ok(None) | Err(_) => {
            debug!("osascript timed out");
            let _ = child.kill();
            let _ = child.wait();
            None
        }
    }
}

fn parse_app_name(stdout: &[u8]) -> Option<String> {
    let name = String::from_utf8_lossy(stdout).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_output_and_rejects_blank() {
        assert_eq!(parse_app_name(b"WeChat\n").as_deref(), Some("WeChat"));
        assert_eq!(parse_app_name(b"  \n"), None);
    }
}
