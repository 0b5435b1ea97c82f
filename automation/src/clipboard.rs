use std::cell::RefCell;

use anyhow::{Context, Result};
use rpa_engine::Clipboard;

thread_local! {
    // X11 下剪贴板内容由持有者进程提供，句柄要一直活到粘贴完成之后
    static CLIPBOARD: RefCell<Option<arboard::Clipboard>> = const { RefCell::new(None) };
}

/// 基于 `arboard` 的剪贴板。
///
/// 句柄在执行线程上首次使用时创建，并随该线程存活。
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        CLIPBOARD.with(|cell| {
            let mut slot = cell.borrow_mut();
            let mut clipboard = match slot.take() {
                Some(clipboard) => clipboard,
                None => arboard::Clipboard::new().context("无法打开系统剪贴板")?,
            };
            let result = clipboard
                .set_text(text.to_string())
                .context("写入剪贴板失败");
            *slot = Some(clipboard);
            result
        })
    }
}
