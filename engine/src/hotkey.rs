//! 组合键文本解析，如 `ctrl+s`、`cmd + shift + 4`、`alt+tab`。

use crate::coords::Platform;
use crate::desktop::Key;
use crate::error::StepError;

/// 将 `+` 连接的按键名解析为按键序列。
///
/// 先转小写、按 `+` 切分并去掉空白与空段，再做别名归一：
/// `cmd`/`command` → 平台主修饰键（macOS 为 Command，其余为 Ctrl），
/// `control`/`ctl` → `ctrl`，`option` → `alt`，`win`/`windows`/`super` → Super 键。
pub fn parse_chord(text: &str, platform: Platform) -> Result<Vec<Key>, StepError> {
    let lowered = text.to_lowercase();
    let keys = lowered
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_key(part, platform))
        .collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(StepError::InvalidInput(format!("组合键为空: {text:?}")));
    }
    Ok(keys)
}

/// 当前平台的粘贴快捷键。
pub fn paste_chord(platform: Platform) -> [Key; 2] {
    [command_key(platform), Key::Char('v')]
}

fn command_key(platform: Platform) -> Key {
    match platform {
        Platform::MacOs => Key::Meta,
        Platform::Windows | Platform::Linux => Key::Ctrl,
    }
}

fn parse_key(name: &str, platform: Platform) -> Result<Key, StepError> {
    let key = match name {
        "cmd" | "command" => command_key(platform),
        "ctrl" | "control" | "ctl" => Key::Ctrl,
        "alt" | "option" => Key::Alt,
        "shift" => Key::Shift,
        "win" | "windows" | "super" | "meta" => Key::Meta,
        "enter" | "return" => Key::Enter,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "esc" | "escape" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "capslock" => Key::CapsLock,
        other => return parse_other(other),
    };
    Ok(key)
}

fn parse_other(name: &str) -> Result<Key, StepError> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(Key::Char(c));
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=12).contains(&n) {
            return Ok(Key::F(n));
        }
    }

    Err(StepError::InvalidInput(format!("无法识别的按键: {name}")))
}
