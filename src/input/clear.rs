use tracing::debug;

use crate::device::Injector;
use crate::error::Result;
use crate::tree::element::{Element, FramePoint};

/// HID usage for backspace.
pub const BACKSPACE_KEY_CODE: &str = "42";
pub const DEFAULT_CLEAR_KEYS: usize = 72;
pub const MAX_CLEAR_KEYS: usize = 220;

/// Text fields are tapped near their trailing edge so the caret lands after
/// the existing text.
pub fn clear_point(elem: &Element) -> FramePoint {
    if !elem.is_text_input() || elem.frame.w <= 0.0 {
        return elem.center;
    }
    let inset = (elem.frame.w * 0.15).clamp(8.0, 24.0);
    let mut x = elem.frame.right() - inset;
    if x < elem.frame.x + 6.0 {
        x = elem.center.x;
    }
    FramePoint {
        x,
        y: elem.center.y,
    }
}

/// Backspaces needed to empty a field, from its current value length.
pub fn estimate_clear_backspaces(elem: &Element) -> usize {
    match elem.value.trim().chars().count() {
        0 => DEFAULT_CLEAR_KEYS,
        n if n < 16 => 24,
        n if n < 40 => n + 12,
        n => (n + 16).min(MAX_CLEAR_KEYS),
    }
}

/// Send `count` backspaces as one key sequence, falling back to single key
/// presses when the sequence call fails.
pub fn clear_focused_input<D: Injector + ?Sized>(device: &D, count: usize) -> Result<()> {
    let count = if count == 0 { DEFAULT_CLEAR_KEYS } else { count };
    let codes = vec![BACKSPACE_KEY_CODE; count];
    if device.key_sequence(&codes).is_ok() {
        return Ok(());
    }
    debug!(count, "key-sequence failed, sending single backspaces");
    for _ in 0..count {
        device
            .key(BACKSPACE_KEY_CODE)
            .map_err(|e| e.recode("IDB_UI_FAILED", "clear text failed"))?;
    }
    Ok(())
}
