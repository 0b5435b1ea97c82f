use anyhow::Result;
use enigo::{Enigo, KeyboardControllable, MouseControllable};
use rpa_engine::{InputDriver, Key, MouseButton};
use std::{thread, time::Duration};

/// 移动后、按下前的停顿，降低误触概率。
const MOVE_SETTLE: Duration = Duration::from_millis(60);
/// 多次点击之间的间隔。
const CLICK_INTERVAL: Duration = Duration::from_millis(200);

/// 基于 `enigo` 的键鼠注入。
///
/// `Enigo` 持有平台句柄、不能跨线程移动，因此每次调用现建一个。
/// 若系统未授予辅助功能权限，macOS 上的注入会静默失效。
pub struct EnigoInput;

impl InputDriver for EnigoInput {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let mut enigo = Enigo::new();
        enigo.mouse_move_to(x, y);
        Ok(())
    }

    fn click(&mut self, x: i32, y: i32, button: MouseButton, clicks: u32) -> Result<()> {
        let mut enigo = Enigo::new();
        enigo.mouse_move_to(x, y);
        thread::sleep(MOVE_SETTLE);
        for i in 0..clicks {
            if i > 0 {
                thread::sleep(CLICK_INTERVAL);
            }
            enigo.mouse_click(to_enigo_button(button));
        }
        Ok(())
    }

    /// 正值向上。enigo 的纵向滚动以向下为正，这里取反。
    fn scroll(&mut self, delta: i32) -> Result<()> {
        let mut enigo = Enigo::new();
        enigo.mouse_scroll_y(delta.saturating_neg());
        Ok(())
    }

    /// 依次按下，逆序松开。
    fn chord(&mut self, keys: &[Key]) -> Result<()> {
        let mut enigo = Enigo::new();
        let keys: Vec<enigo::Key> = keys.iter().copied().map(to_enigo_key).collect();
        for key in &keys {
            enigo.key_down(*key);
        }
        for key in keys.iter().rev() {
            enigo.key_up(*key);
        }
        Ok(())
    }
}

fn to_enigo_button(button: MouseButton) -> enigo::MouseButton {
    match button {
        MouseButton::Left => enigo::MouseButton::Left,
        MouseButton::Right => enigo::MouseButton::Right,
    }
}

fn to_enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Ctrl => enigo::Key::Control,
        Key::Alt => enigo::Key::Alt,
        Key::Shift => enigo::Key::Shift,
        Key::Meta => enigo::Key::Meta,
        Key::Enter => enigo::Key::Return,
        Key::Tab => enigo::Key::Tab,
        Key::Space => enigo::Key::Space,
        Key::Escape => enigo::Key::Escape,
        Key::Backspace => enigo::Key::Backspace,
        Key::Delete => enigo::Key::Delete,
        Key::Up => enigo::Key::UpArrow,
        Key::Down => enigo::Key::DownArrow,
        Key::Left => enigo::Key::LeftArrow,
        Key::Right => enigo::Key::RightArrow,
        Key::Home => enigo::Key::Home,
        Key::End => enigo::Key::End,
        Key::PageUp => enigo::Key::PageUp,
        Key::PageDown => enigo::Key::PageDown,
        Key::CapsLock => enigo::Key::CapsLock,
        Key::F(n) => function_key(n),
        Key::Char(c) => enigo::Key::Layout(c),
    }
}

fn function_key(n: u8) -> enigo::Key {
    match n {
        1 => enigo::Key::F1,
        2 => enigo::Key::F2,
        3 => enigo::Key::F3,
        4 => enigo::Key::F4,
        5 => enigo::Key::F5,
        6 => enigo::Key::F6,
        7 => enigo::Key::F7,
        8 => enigo::Key::F8,
        9 => enigo::Key::F9,
        10 => enigo::Key::F10,
        11 => enigo::Key::F11,
        _ => enigo::Key::F12,
    }
}
