// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Output buffering.
//
// A frame is dozens of small fragments: cursor hide, home, one marker and
// one erase per row, a cursor move, cursor show. Written one by one, the
// terminal repaints between them and the screen flickers. `RenderBuffer`
// accumulates the whole frame in memory so it reaches the terminal in one
// `write()`.
//
// Growth goes through `try_reserve`, so running out of memory surfaces as
// an error for the current frame instead of silently truncating it.
//
// `TtyWriter` is the matching sink: `io::Write` straight onto a file
// descriptor. Rust's `Stdout` is line-buffered and would split a frame at
// every `\r\n`, which defeats the point.

use std::fmt;
use std::io::{self, Write};
use std::os::unix::io::RawFd;

use crate::error::{Error, Result};

// ─── RenderBuffer ────────────────────────────────────────────────────────────

/// Default capacity: a 200x60 screen of `~` + erase + CRLF fits comfortably.
const DEFAULT_CAPACITY: usize = 4096;

/// A growth-only byte buffer holding one frame until it is flushed.
#[derive(Debug, Default)]
pub struct RenderBuffer {
    buf: Vec<u8>,
}

impl RenderBuffer {
    /// Create an empty buffer. Nothing is allocated until the first append.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create an empty buffer with room for `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the reservation fails.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve(capacity)?;
        Ok(Self { buf })
    }

    /// Create an empty buffer with the default frame capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the reservation fails.
    pub fn for_frame() -> Result<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a fragment.
    ///
    /// Either the whole fragment is appended or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the buffer cannot grow.
    pub fn append(&mut self, fragment: &[u8]) -> Result<()> {
        self.buf.try_reserve(fragment.len())?;
        self.buf.extend_from_slice(fragment);
        Ok(())
    }

    /// Append formatted output, e.g. a cursor move built from `ansi::CursorTo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the buffer cannot grow. Bytes of the
    /// formatted text appended before the failure stay in the buffer; the
    /// caller is expected to abandon the frame.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        struct Adapter<'a> {
            buf: &'a mut RenderBuffer,
            error: Option<Error>,
        }

        impl fmt::Write for Adapter<'_> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.buf.append(s.as_bytes()).map_err(|e| {
                    self.error = Some(e);
                    fmt::Error
                })
            }
        }

        let mut adapter = Adapter { buf: self, error: None };
        match fmt::write(&mut adapter, args) {
            Ok(()) => Ok(()),
            Err(fmt::Error) => Err(adapter
                .error
                .unwrap_or_else(|| Error::Write(io::Error::other("formatter error")))),
        }
    }

    /// Send the whole buffer to `w` as a single write, then release it.
    ///
    /// `write_all` retries short writes and `EINTR`; in the normal case the
    /// frame goes out in exactly one `write` call. An empty buffer writes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the sink fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let frame = std::mem::take(&mut self.buf);
        w.write_all(&frame).map_err(Error::Write)?;
        w.flush().map_err(Error::Write)
    }
}

// ─── TtyWriter ───────────────────────────────────────────────────────────────

/// Unbuffered `io::Write` on a raw file descriptor.
#[derive(Debug, Clone, Copy)]
pub struct TtyWriter {
    fd: RawFd,
}

impl TtyWriter {
    #[must_use]
    pub const fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Write to standard output.
    #[must_use]
    pub const fn stdout() -> Self {
        Self::new(libc::STDOUT_FILENO)
    }
}

impl Write for TtyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
