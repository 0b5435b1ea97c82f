mod clipboard;
mod frontmost;
mod input;
mod logging;
mod screen;
mod vision;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpa_engine::{
    Desktop, Engine, EngineConfig, Platform, RetryPolicy, RunEvent, RunRequest, StepKind,
    taskfile,
};
use tracing::info;

use crate::clipboard::SystemClipboard;
use crate::input::EnigoInput;
use crate::screen::XcapScreen;
use crate::vision::TemplateLocator;

/// 命令行参数。
#[derive(Parser, Debug)]
#[command(
    name = "water-rpa",
    version,
    about = "按任务文件依次执行点击、输入、滚动、按键与截图的桌面自动化工具"
)]
struct Cli {
    /// 本程序的日志级别（error|warn|info|debug|trace），未指定时读取 RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 执行任务文件；运行中输入 q 回车可停止
    Run {
        /// 任务文件（JSON）
        tasks: PathBuf,

        /// 循环执行，直到手动停止或某一步失败
        #[arg(long = "loop", default_value_t = false)]
        loop_forever: bool,

        /// 引擎参数文件（JSON），缺省字段取默认值
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 只检查任务文件，不执行
    Check {
        /// 任务文件（JSON）
        tasks: PathBuf,
    },
}

/// 程序入口：解析参数、初始化日志并分派子命令。
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    match cli.command {
        Command::Run {
            tasks,
            loop_forever,
            config,
        } => run(&tasks, loop_forever, config.as_deref()),
        Command::Check { tasks } => Ok(if check(&tasks)? {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }),
    }
}

/// 加载并校验任务，在后台线程执行，同时监听标准输入上的停止指令。
///
/// 只有任务失败时返回非零退出码；手动停止视为正常结束。
fn run(tasks: &Path, loop_forever: bool, config: Option<&Path>) -> Result<ExitCode> {
    let steps = taskfile::load(tasks)?;
    taskfile::validate_for_run(&steps)?;
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    println!(
        "加载任务 [{}]，共 {} 条指令{}",
        tasks.display(),
        steps.len(),
        if loop_forever { "，循环执行" } else { "" }
    );
    println!("输入 q 并回车可随时停止");

    let engine = Engine::new(config);
    let request = RunRequest {
        steps,
        loop_forever,
    };
    let handle = engine
        .start(request, system_desktop(), |event: &RunEvent| println!("{event}"))
        .context("无法启动任务")?;
    listen_for_stop(engine.clone());

    let outcome = handle.join();
    info!(%outcome, "run returned");
    Ok(if outcome.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// 打印任务列表并做运行前检查；存在未知指令类型时返回 `false`。
fn check(tasks: &Path) -> Result<bool> {
    let steps = taskfile::load(tasks)?;
    taskfile::validate_for_run(&steps)?;

    let mut unknown = 0;
    for (offset, step) in steps.iter().enumerate() {
        let retry = if step.kind.searches_screen() {
            match step.retry_policy() {
                RetryPolicy::Once => "找一次".to_string(),
                RetryPolicy::Attempts(n) => format!("最多 {n} 次"),
                RetryPolicy::Unbounded => "直到找到".to_string(),
            }
        } else {
            "-".to_string()
        };
        println!("{:>3}. {} | {} | {}", offset + 1, step.kind, step.value, retry);
        if matches!(step.kind, StepKind::Unknown(_)) {
            unknown += 1;
        }
    }

    if unknown > 0 {
        println!("发现 {unknown} 条未知类型的指令，执行时会失败");
        return Ok(false);
    }
    println!("检查通过，共 {} 条指令", steps.len());
    Ok(true)
}

fn system_desktop() -> Desktop {
    let platform = Platform::current();
    Desktop {
        locator: Box::new(TemplateLocator),
        input: Box::new(EnigoInput),
        clipboard: Box::new(SystemClipboard),
        screen: Box::new(XcapScreen::new(platform)),
        platform,
    }
}

/// 后台读取标准输入，收到 `q` 或 `stop` 时请求停止。
fn listen_for_stop(engine: Engine) {
    let spawned = thread::Builder::new()
        .name("stdin-stop".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_stop_command(&line) {
                    println!("正在停止...");
                    engine.stop();
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        tracing::warn!("无法监听标准输入，只能通过结束进程停止: {err}");
    }
}

fn is_stop_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "stop")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_commands() {
        assert!(is_stop_command(" Q "));
        assert!(is_stop_command("stop\n"));
        assert!(!is_stop_command("quit"));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "water-rpa",
            "run",
            "tasks.json",
            "--loop",
            "--config",
            "engine.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run {
                tasks,
                loop_forever,
                config,
            } => {
                assert_eq!(tasks, PathBuf::from("tasks.json"));
                assert!(loop_forever);
                assert_eq!(config, Some(PathBuf::from("engine.json")));
            }
            Command::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn check_flags_unknown_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, r#"[{"type": 5.0, "value": "1"}, {"type": 99, "value": "x"}]"#)
            .unwrap();
        assert!(!check(&path).unwrap());

        std::fs::write(&path, r#"[{"type": 5.0, "value": "1"}]"#).unwrap();
        assert!(check(&path).unwrap());
    }

    #[test]
    fn check_rejects_empty_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, r#"[{"type": 1.0, "value": ""}]"#).unwrap();
        let err = check(&path).unwrap_err();
        assert!(err.to_string().contains("第 1 条指令参数为空"));
    }
}
