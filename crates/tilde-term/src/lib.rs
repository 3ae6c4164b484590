// SPDX-License-Identifier: MIT
//
// tilde-term — the terminal layer under the tilde screen editor.
//
// Raw mode with guaranteed restoration, a bounded-wait byte reader, a
// decoder that turns escape sequences into logical keys, window-size
// discovery (ioctl first, cursor-position probe second), a frame buffer
// that reaches the terminal in a single write, and the render → key →
// react loop that ties them together.
//
// No TUI framework sits underneath. Everything is termios and ANSI escape
// sequences written by hand.

#[cfg(not(unix))]
compile_error!("tilde-term drives termios directly and only supports Unix terminals");

pub mod ansi;
pub mod error;
pub mod event_loop;
pub mod geometry;
pub mod input;
pub mod output;
pub mod reader;
pub mod terminal;

/// Pseudo-terminal and scripted-input helpers for tests, here and in
/// dependent crates (feature `testing`).
#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;

pub use error::{Error, Result};
