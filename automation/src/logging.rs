use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// 本程序自己的日志目标，`--log-level` 只作用于这些 crate。
const OUR_CRATES: [&str; 2] = ["water_rpa", "rpa_engine"];

/// 初始化日志，输出到 stderr。
///
/// 优先级：`--log-level` > `RUST_LOG` > 默认 `info`。
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level_directive(level))
            .map_err(|err| anyhow!("无效的日志级别 {level}: {err}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive("info"))),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("初始化日志失败: {err}"))
}

fn level_directive(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    OUR_CRATES
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_applies_to_both_crates() {
        assert_eq!(level_directive("DEBUG"), "water_rpa=debug,rpa_engine=debug");
    }
}
