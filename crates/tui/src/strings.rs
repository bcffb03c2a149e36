// Centralized UI strings and labels. ASCII-friendly by default.

use gemchat_core::Phase;
use unicode_width::UnicodeWidthStr;

// Role prefixes; colors are applied in the UI.
pub const PREFIX_USER: &str = "| ";
pub const PREFIX_BOT: &str = "> ";
pub const PREFIX_ERROR: &str = "! ";
pub const PREFIX_PENDING: &str = "~ ";

pub const INPUT_HINT: &str = "Type message, Enter to send / Shift+Enter for newline";
pub const INPUT_HINT_NO_KEY: &str = "Press F2 to enter your API key first";

// UI block titles (keep surrounding spaces for visual padding)
pub const TITLE_CHAT: &str = " Chat ";
pub const TITLE_INPUT: &str = " Message ";
pub const TITLE_HELP: &str = " Help / Shortcuts ";
pub const TITLE_API_KEY: &str = " API Key ";
pub const TITLE_MODELS: &str = " Select Model ";
pub const TITLE_ALERT: &str = " Notice ";

pub const KEY_EDITOR_HINT: &str = "Enter to save, Esc to cancel, F3 to show/hide";
pub const ALERT_HINT: &str = "Press Enter or Esc to dismiss";
pub const PICKER_EMPTY: &str = "No models loaded. Press F5 to refresh.";

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn spinner(tick: u64) -> &'static str {
    SPINNER[(tick as usize / 2) % SPINNER.len()]
}

pub fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::AwaitingKey => "Awaiting key",
        Phase::Idle => "Ready",
        Phase::Sending => "Sending",
        Phase::Thinking => "Thinking",
        Phase::Error => "Error",
    }
}

/// Masked form of the key, e.g. `AIza************9f`.
pub fn mask_key(key: &str, reveal: bool) -> String {
    if reveal {
        return key.to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 6), tail)
}

pub fn key_status(key: &str) -> String {
    if key.is_empty() {
        "Key: missing".to_string()
    } else {
        format!("Key: {}", mask_key(key, false))
    }
}

// Status bar stick label
pub const STICK_BOTTOM: &str = "Bottom";

pub fn build_stick_label(scroll: u16) -> String {
    if scroll == 0 {
        STICK_BOTTOM.to_string()
    } else {
        format!("+{} lines", scroll)
    }
}

// Build the status bar line with width-aware compaction.
// Segments are dropped from the right once they no longer fit.
pub fn build_status_line(
    phase: &str,
    stick: &str,
    model: &str,
    refresh: &str,
    send_enabled: bool,
    max_width: u16,
) -> String {
    let mut segments: Vec<String> = Vec::new();
    segments.push(format!("[{}][{}]", phase, model));
    segments.push(format!("[{}]", stick));
    segments.push(format!("Send:{}", if send_enabled { "on" } else { "off" }));
    segments.push(format!("[{}]", refresh));
    let hints: [&str; 5] = [
        "Enter: send; Shift+Enter: newline",
        "F2: key",
        "F4: models; F5: refresh",
        "PgUp/PgDn: scroll",
        "?: help",
    ];
    for h in hints {
        segments.push(h.to_string());
    }

    let sep = "  |  ";
    let mut out = String::new();
    let mut used = 0usize;
    for (i, seg) in segments.iter().enumerate() {
        let segw = UnicodeWidthStr::width(seg.as_str());
        let addw = segw
            + if i == 0 {
                0
            } else {
                UnicodeWidthStr::width(sep)
            };
        if used + addw > max_width as usize {
            break;
        }
        if i > 0 {
            out.push_str(sep);
            used += UnicodeWidthStr::width(sep);
        }
        out.push_str(seg);
        used += segw;
    }
    out
}

pub fn help_lines_ascii() -> &'static [&'static str] {
    &[
        "Basic",
        "  Enter: Send    Shift+Enter: Newline    Esc/Ctrl-C: Quit",
        "Session",
        "  F2: Edit API key    F3: Show/hide key",
        "  F4 or /model: Pick model    /model <id>: Select model directly",
        "  F5, Ctrl+R or /refresh: Refresh model list",
        "Input Editing",
        "  Arrow: Move cursor    Backspace/Delete: Delete prev/next char",
        "  Home/End, Ctrl+A/E: Line start/end    Ctrl+W: Delete prev word",
        "  Ctrl+U/K: Kill to line start/end",
        "Chat Scrolling",
        "  Mouse wheel: Scroll    PgUp/PgDn: Page    Ctrl+Up/Down: Fine scroll",
        "  Ctrl+Home/End: Top/bottom",
        "Help",
        "  ?: Open/close this panel    F1: Open/close this panel",
    ]
}
