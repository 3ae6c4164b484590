// SPDX-License-Identifier: MIT
//
// VT100 / xterm control sequences.
//
// Fixed sequences are byte constants; parameterised ones are small
// `Display` values so they can be formatted straight into a render buffer
// or any writer without an intermediate `String`.
//
// Positions in our API are 0-indexed and converted to the terminal's
// 1-indexed coordinates here, and only here.

use std::fmt;

/// The escape byte that introduces every control sequence.
pub const ESC: u8 = 0x1B;

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Erase the entire screen (ED 2).
pub const ERASE_ALL: &[u8] = b"\x1b[2J";

/// Erase from the cursor to the end of the current line (EL 0).
pub const ERASE_LINE_REST: &[u8] = b"\x1b[0K";

/// Row separator. `OPOST` is off in raw mode, so the carriage return is explicit.
pub const CRLF: &[u8] = b"\r\n";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to row 1, column 1.
pub const CURSOR_HOME: &[u8] = b"\x1b[H";

/// Hide the cursor (DECTCEM reset).
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

/// Show the cursor (DECTCEM set).
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";

/// Device Status Report: ask the terminal where the cursor is.
///
/// The terminal answers on the input stream with `ESC [ row ; col R`.
pub const REPORT_CURSOR: &[u8] = b"\x1b[6n";

/// Erase the screen and home the cursor: the reset written on quit and
/// on every fatal exit path.
pub const SCREEN_RESET: &[u8] = b"\x1b[2J\x1b[H";

/// Cursor Position (CUP) to 0-indexed `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorTo {
    pub x: u16,
    pub y: u16,
}

impl fmt::Display for CursorTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\x1b[{};{}H",
            u32::from(self.y) + 1,
            u32::from(self.x) + 1
        )
    }
}

/// Cursor Forward (CUF) by `n` columns. The terminal stops at the right edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorForward(pub u16);

impl fmt::Display for CursorForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}C", self.0)
    }
}

/// Cursor Down (CUD) by `n` rows. The terminal stops at the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorDown(pub u16);

impl fmt::Display for CursorDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}B", self.0)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
