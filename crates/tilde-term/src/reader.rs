// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Bounded-wait byte input.
//
// Raw mode configures the terminal with VMIN=0 / VTIME=n, so a `read()` of
// one byte returns within n deciseconds either with that byte or with
// nothing. `ByteSource` captures exactly that contract: one call, one
// bounded wait, `Some(byte)` or `None`. Callers decide whether a timeout
// means "try again" (the key decoder in its idle state) or "give up" (the
// middle of an escape sequence, or a cursor report that never came).
//
// Keeping the wait inside the source (rather than a poll loop or a reader
// thread) makes every consumer trivially testable with an in-memory slice.

use std::io;
use std::os::unix::io::RawFd;

/// A stream that yields at most one byte per bounded wait.
pub trait ByteSource {
    /// Wait up to the source's timeout for a single byte.
    ///
    /// Returns `Ok(None)` if no byte arrived in time. A timeout is never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error for anything other than a timeout,
    /// would-block, or signal interruption.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

/// In-memory source: yields its bytes in order, then times out forever.
impl ByteSource for &[u8] {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.split_first() {
            Some((&b, rest)) => {
                *self = rest;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }
}

/// Reads single bytes from a terminal file descriptor.
///
/// The wait is whatever the terminal's `VMIN`/`VTIME` settings impose; under
/// [`RawTerminal`](crate::terminal::RawTerminal) that is 100 ms by default.
#[derive(Debug, Clone, Copy)]
pub struct TtyReader {
    fd: RawFd,
}

impl TtyReader {
    /// Read from an arbitrary descriptor (a pty in tests, a tty in production).
    #[must_use]
    pub const fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Read from standard input.
    #[must_use]
    pub const fn stdin() -> Self {
        Self::new(libc::STDIN_FILENO)
    }
}

impl ByteSource for TtyReader {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        let n = unsafe { libc::read(self.fd, (&raw mut byte).cast::<libc::c_void>(), 1) };

        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    // EAGAIN (some platforms report VTIME expiry this way) and
                    // EINTR (SIGWINCH) both mean "nothing yet".
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
                    _ => Err(err),
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
