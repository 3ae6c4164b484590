// SPDX-License-Identifier: MIT
//
// Terminal geometry — how many rows and columns we have to draw into.
//
// The fast path is `ioctl(TIOCGWINSZ)` (see `terminal::window_size`). Some
// environments (serial consoles, odd multiplexers) answer that ioctl with
// zeros or not at all, so there is a fallback that asks the terminal
// itself: push the cursor far past the bottom-right corner (the terminal
// clamps it to the last cell), then send a Device Status Report request
// and read back where the cursor ended up. That position *is* the size.
//
// The reply arrives on the input stream, interleaved with whatever the
// user typed, so it is parsed strictly: anything that is not exactly
// `ESC [ rows ; cols R` is rejected rather than turned into a bogus size.

use std::io::Write;

use tracing::{debug, info};

use crate::ansi::{self, CursorDown, CursorForward, ESC};
use crate::error::{Error, Result};
use crate::reader::ByteSource;

/// How far the probe pushes the cursor right and down.
///
/// Far beyond any real screen; the terminal clamps to its last row/column.
pub const PROBE_OFFSET: u16 = 999;

/// Longest cursor report we are willing to read (`ESC[65535;65535R` is 15).
const MAX_REPORT_LEN: usize = 32;

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells. Both dimensions are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    rows: u16,
    cols: u16,
}

impl Geometry {
    /// Build a geometry, rejecting zero-sized dimensions.
    #[must_use]
    pub const fn new(rows: u16, cols: u16) -> Option<Self> {
        if rows == 0 || cols == 0 {
            None
        } else {
            Some(Self { rows, cols })
        }
    }

    /// Number of rows (height).
    #[inline]
    #[must_use]
    pub const fn rows(self) -> u16 {
        self.rows
    }

    /// Number of columns (width).
    #[inline]
    #[must_use]
    pub const fn cols(self) -> u16 {
        self.cols
    }

    /// Index of the bottom row.
    #[inline]
    #[must_use]
    pub const fn last_row(self) -> u16 {
        self.rows - 1
    }

    /// Index of the rightmost column.
    #[inline]
    #[must_use]
    pub const fn last_col(self) -> u16 {
        self.cols - 1
    }
}

// ─── Position ────────────────────────────────────────────────────────────────

/// A 0-indexed cell position: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Pull the position back inside `geometry`.
    #[must_use]
    pub fn clamp_to(self, geometry: Geometry) -> Self {
        Self {
            x: self.x.min(geometry.last_col()),
            y: self.y.min(geometry.last_row()),
        }
    }

    /// Whether the position addresses a cell that exists in `geometry`.
    #[must_use]
    pub const fn is_within(self, geometry: Geometry) -> bool {
        self.x < geometry.cols && self.y < geometry.rows
    }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Resolve the terminal size.
///
/// `direct` is the result of the OS-level query (usually
/// [`window_size`](crate::terminal::window_size)). When it is `None` the
/// cursor probe runs against `input` / `output`.
///
/// # Errors
///
/// Returns [`Error::GeometryQuery`] if the probe reply is missing or
/// malformed, [`Error::Write`] / [`Error::Read`] on I/O failure.
pub fn query(
    direct: Option<Geometry>,
    input: &mut impl ByteSource,
    output: &mut impl Write,
) -> Result<Geometry> {
    if let Some(geometry) = direct {
        info!(rows = geometry.rows, cols = geometry.cols, "window size from ioctl");
        return Ok(geometry);
    }

    let geometry = probe(input, output)?;
    info!(rows = geometry.rows, cols = geometry.cols, "window size from cursor probe");
    Ok(geometry)
}

/// Measure the terminal by moving the cursor to its far corner and asking
/// where it landed.
///
/// The cursor is left in the bottom-right cell; the next full redraw homes
/// it again.
///
/// # Errors
///
/// See [`query`].
pub fn probe(input: &mut impl ByteSource, output: &mut impl Write) -> Result<Geometry> {
    write!(
        output,
        "{}{}",
        CursorForward(PROBE_OFFSET),
        CursorDown(PROBE_OFFSET)
    )
    .and_then(|()| output.write_all(ansi::REPORT_CURSOR))
    .and_then(|()| output.flush())
    .map_err(Error::Write)?;

    let reply = read_cursor_report(input)?;
    debug!(reply = ?String::from_utf8_lossy(&reply), "cursor report");
    parse_cursor_report(&reply)
}

/// Collect reply bytes up to and including the terminating `R`.
fn read_cursor_report(input: &mut impl ByteSource) -> Result<Vec<u8>> {
    let mut reply = Vec::with_capacity(16);

    while reply.len() < MAX_REPORT_LEN {
        match input.read_byte().map_err(Error::Read)? {
            Some(b) => {
                reply.push(b);
                if b == b'R' {
                    return Ok(reply);
                }
            }
            None => {
                return Err(Error::GeometryQuery(if reply.is_empty() {
                    "terminal did not answer the cursor position request".into()
                } else {
                    format!(
                        "cursor report cut short: {:?}",
                        String::from_utf8_lossy(&reply)
                    )
                }));
            }
        }
    }

    Err(Error::GeometryQuery(format!(
        "cursor report longer than {MAX_REPORT_LEN} bytes"
    )))
}

/// Parse a Cursor Position Report: `ESC [ rows ; cols R`.
///
/// # Errors
///
/// Returns [`Error::GeometryQuery`] for anything that is not exactly that
/// shape, or that reports a zero dimension.
pub fn parse_cursor_report(reply: &[u8]) -> Result<Geometry> {
    let malformed =
        || Error::GeometryQuery(format!("malformed cursor report: {:?}", String::from_utf8_lossy(reply)));

    let body = reply
        .strip_prefix(&[ESC, b'['])
        .and_then(|rest| rest.strip_suffix(b"R"))
        .ok_or_else(malformed)?;

    let mut fields = body.split(|&b| b == b';');
    let rows = fields.next().and_then(parse_decimal).ok_or_else(malformed)?;
    let cols = fields.next().and_then(parse_decimal).ok_or_else(malformed)?;
    if fields.next().is_some() {
        return Err(malformed());
    }

    Geometry::new(rows, cols).ok_or_else(malformed)
}

/// Parse a non-empty run of ASCII digits into a `u16`, rejecting overflow.
fn parse_decimal(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u16, |acc, &b| {
        if b.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add(u16::from(b - b'0'))
        } else {
            None
        }
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
