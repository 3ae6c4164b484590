// SPDX-License-Identifier: MIT
//
// Error taxonomy for the terminal core.
//
// Every variant names the operation that failed so the binary can print a
// one-line diagnostic after the terminal has been restored. Malformed
// escape sequences are deliberately absent: the key decoder degrades them
// to plain keys instead of failing.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Errors raised by the terminal core.
#[derive(Debug, Error)]
pub enum Error {
    /// Capturing the terminal attributes failed (not a TTY, or no permission).
    #[error("tcgetattr: {0}")]
    TerminalQuery(#[source] io::Error),

    /// Installing terminal attributes failed.
    #[error("tcsetattr: {0}")]
    TerminalSet(#[source] io::Error),

    /// Reading from the input stream failed with something other than a timeout.
    #[error("read: {0}")]
    Read(#[source] io::Error),

    /// Writing to the output stream failed.
    #[error("write: {0}")]
    Write(#[source] io::Error),

    /// Neither the window-size ioctl nor the cursor probe produced a usable size.
    #[error("window size: {0}")]
    GeometryQuery(String),

    /// The render buffer could not grow to hold the next fragment.
    #[error("render buffer: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Result alias used throughout `tilde-term`.
pub type Result<T> = std::result::Result<T, Error>;
