// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Test support: a real pseudo-terminal pair and a scripted byte source.
//
// Raw mode and TIOCGWINSZ only mean something on a terminal, and CI has no
// controlling tty. A pty gives each test its own. The raw-mode backup is
// process-global, so pty tests are serialized through `PTY_LOCK`.

use std::collections::VecDeque;
use std::ffi::CStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::reader::ByteSource;

static PTY_LOCK: Mutex<()> = Mutex::new(());

/// A master/slave pseudo-terminal pair, closed on drop.
pub struct Pty {
    master: File,
    slave: File,
    _serial: MutexGuard<'static, ()>,
}

impl Pty {
    /// Open a new pty, or `None` if the system has none to give.
    ///
    /// The `None` case is reported on stderr so skipped coverage shows up
    /// in the test output.
    pub fn open() -> Option<Self> {
        let pty = Self::try_open();
        if pty.is_none() {
            eprintln!("skipping: no pty available");
        }
        pty
    }

    fn try_open() -> Option<Self> {
        let serial = PTY_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if master_fd < 0 {
            return None;
        }
        let master = unsafe { File::from_raw_fd(master_fd) };

        if unsafe { libc::grantpt(master_fd) } != 0 || unsafe { libc::unlockpt(master_fd) } != 0 {
            return None;
        }

        // ptsname() uses a static buffer; PTY_LOCK makes that safe here.
        let name = unsafe { libc::ptsname(master_fd) };
        if name.is_null() {
            return None;
        }
        let path = unsafe { CStr::from_ptr(name) }.to_str().ok()?.to_owned();

        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .ok()?;

        Some(Self { master, slave, _serial: serial })
    }

    /// The terminal side: what an application would see as its tty.
    pub fn slave_fd(&self) -> RawFd {
        self.slave.as_raw_fd()
    }

    /// The emulator side: writes here arrive as keyboard input on the slave.
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Current attributes of the terminal side.
    pub fn attributes(&self) -> libc::termios {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::tcgetattr(self.slave_fd(), &raw mut termios) };
        assert_eq!(rc, 0, "tcgetattr failed");
        termios
    }

    /// Resize the pty as a terminal emulator would.
    pub fn set_size(&self, rows: u16, cols: u16) {
        let ws = libc::winsize { ws_row: rows, ws_col: cols, ws_xpixel: 0, ws_ypixel: 0 };
        let rc = unsafe { libc::ioctl(self.master_fd(), libc::TIOCSWINSZ, &raw const ws) };
        assert_eq!(rc, 0, "TIOCSWINSZ failed");
    }
}

/// Whether two attribute sets agree on every field raw mode touches.
pub fn same_attributes(a: &libc::termios, b: &libc::termios) -> bool {
    a.c_iflag == b.c_iflag
        && a.c_oflag == b.c_oflag
        && a.c_cflag == b.c_cflag
        && a.c_lflag == b.c_lflag
        && a.c_cc == b.c_cc
}

/// Byte source that replays a script of bytes, timeouts, and errors, then
/// times out forever.
pub struct Scripted(pub VecDeque<io::Result<Option<u8>>>);

impl Scripted {
    pub fn new(steps: impl IntoIterator<Item = Option<u8>>) -> Self {
        Self(steps.into_iter().map(Ok).collect())
    }

    /// Replay `steps`, then fail every further read.
    pub fn failing_after(steps: impl IntoIterator<Item = Option<u8>>) -> Self {
        let mut script = Self::new(steps);
        script.0.push_back(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        script
    }
}

impl ByteSource for Scripted {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.0.pop_front().unwrap_or(Ok(None))
    }
}
