// SPDX-License-Identifier: MIT
//
// Terminal control — raw mode and guaranteed restoration.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, and atexit. These are the
// standard POSIX interfaces for terminal control — there is no safe
// alternative. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// `RawTerminal` owns the attributes captured before entering raw mode and
// puts them back when the session ends. "Ends" covers more paths than a
// destructor can see:
//
//   - normal return        → `restore()` or `Drop`
//   - panic                → panic hook
//   - `process::exit(..)`  → `atexit` hook (destructors do not run)
//
// The hooks cannot reach the `RawTerminal` value, so a copy of the
// original attributes also lives in a process-global backup behind a
// `Mutex`. Both hooks restore from it; a successful `restore()` clears it.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Mutex, Once};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::Geometry;

/// Default per-byte read timeout in raw mode.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

// ─── Terminal Queries ───────────────────────────────────────────────────────

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if `fd` is not a terminal, the query fails, or the
/// terminal reports a zero dimension.
#[must_use]
pub fn window_size(fd: RawFd) -> Option<Geometry> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 {
        Geometry::new(ws.ws_row, ws.ws_col)
    } else {
        None
    }
}

/// Check whether `fd` is connected to a terminal.
#[must_use]
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

// ─── Exit-path Restore ──────────────────────────────────────────────────────

/// Original attributes for the hooks, with the descriptor they belong to.
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Hooks guard — installed at most once per process.
static HOOKS_INSTALLED: Once = Once::new();

/// Restore termios from the global backup. Best-effort, ignores errors.
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSAFLUSH, original);
            }
        }
    }
}

extern "C" fn restore_at_exit() {
    restore_termios_from_backup();
}

/// Register the `atexit` and panic hooks.
///
/// The panic hook restores first, then delegates to the previous hook so
/// the message prints to a terminal that echoes again.
fn install_exit_hooks() {
    HOOKS_INSTALLED.call_once(|| {
        unsafe {
            libc::atexit(restore_at_exit);
        }

        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_termios_from_backup();
            original(info);
        }));
    });
}

// ─── Raw Mode ────────────────────────────────────────────────────────────────

/// Convert a timeout to termios `VTIME` deciseconds (1..=255).
fn timeout_deciseconds(timeout: Duration) -> libc::cc_t {
    let ds = timeout.as_millis().div_ceil(100).clamp(1, 255);
    libc::cc_t::try_from(ds).unwrap_or(libc::cc_t::MAX)
}

/// Derive raw-mode attributes from `original`.
///
/// Disables echo, canonical input, signal keys, extended input processing,
/// CR→NL translation, parity checking, bit stripping, break signals, flow
/// control, and output post-processing; forces 8-bit characters. Reads
/// return after at most `timeout` with zero or more bytes.
fn raw_attributes(original: &libc::termios, timeout: Duration) -> libc::termios {
    let mut raw = *original;
    raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
    raw.c_oflag &= !libc::OPOST;
    raw.c_cflag &= !libc::CSIZE;
    raw.c_cflag |= libc::CS8;
    raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
    raw.c_cc[libc::VMIN] = 0;
    raw.c_cc[libc::VTIME] = timeout_deciseconds(timeout);
    raw
}

fn get_attributes(fd: RawFd) -> io::Result<libc::termios> {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &raw mut termios) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(termios)
    }
}

fn set_attributes(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// A raw-mode session on a terminal file descriptor.
///
/// # Example
///
/// ```no_run
/// use tilde_term::terminal::RawTerminal;
///
/// let mut term = RawTerminal::stdin();
/// term.enter()?;
/// // ... read keys, draw frames ...
/// term.restore()?;
/// # Ok::<(), tilde_term::Error>(())
/// ```
pub struct RawTerminal {
    fd: RawFd,
    read_timeout: Duration,

    /// Attributes captured by the last successful `enter()`. Never modified.
    original: Option<libc::termios>,

    /// Whether raw attributes are currently installed.
    active: bool,
}

impl RawTerminal {
    /// A session on `fd`. Nothing happens until [`enter`](Self::enter).
    #[must_use]
    pub const fn new(fd: RawFd) -> Self {
        Self {
            fd,
            read_timeout: DEFAULT_READ_TIMEOUT,
            original: None,
            active: false,
        }
    }

    /// A session on standard input.
    #[must_use]
    pub const fn stdin() -> Self {
        Self::new(libc::STDIN_FILENO)
    }

    /// Set the per-byte read timeout (rounded up to 100 ms steps, 0.1–25.5 s).
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The descriptor this session controls.
    #[inline]
    #[must_use]
    pub const fn fd(&self) -> RawFd {
        self.fd
    }

    /// Whether raw mode is currently installed.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The attributes captured on entry, if any.
    #[must_use]
    pub const fn original(&self) -> Option<&libc::termios> {
        self.original.as_ref()
    }

    /// Capture the current attributes and switch to raw mode.
    ///
    /// Idempotent: calling `enter()` while active is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalQuery`] if the attributes cannot be read
    /// (e.g. `fd` is not a terminal), [`Error::TerminalSet`] if raw mode
    /// cannot be installed. In the second case the original attributes are
    /// put back before returning.
    pub fn enter(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }

        let original = get_attributes(self.fd).map_err(Error::TerminalQuery)?;
        self.original = Some(original);

        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = Some((self.fd, original));
        }
        install_exit_hooks();

        let raw = raw_attributes(&original, self.read_timeout);
        if let Err(e) = set_attributes(self.fd, &raw) {
            let _ = set_attributes(self.fd, &original);
            self.clear_backup();
            return Err(Error::TerminalSet(e));
        }

        self.active = true;
        debug!(fd = self.fd, vtime = raw.c_cc[libc::VTIME], "entered raw mode");
        Ok(())
    }

    /// Put the captured attributes back.
    ///
    /// Idempotent: calling `restore()` while inactive is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TerminalSet`] if the attributes cannot be installed.
    /// The session stays active so the exit hook can try again.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        if let Some(ref original) = self.original {
            set_attributes(self.fd, original).map_err(Error::TerminalSet)?;
        }

        self.clear_backup();
        self.active = false;
        debug!(fd = self.fd, "restored terminal attributes");
        Ok(())
    }

    fn clear_backup(&self) {
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            if matches!(*guard, Some((fd, _)) if fd == self.fd) {
                *guard = None;
            }
        }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.active {
            let _ = self.restore();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Pty, same_attributes};
    use std::os::unix::io::AsRawFd;

    // ── Pure helpers ────────────────────────────────────────────────

    #[test]
    fn timeout_rounds_to_deciseconds() {
        assert_eq!(timeout_deciseconds(Duration::from_millis(100)), 1);
        assert_eq!(timeout_deciseconds(Duration::from_millis(150)), 2);
        assert_eq!(timeout_deciseconds(Duration::ZERO), 1);
        assert_eq!(timeout_deciseconds(Duration::from_secs(60)), 255);
    }

    #[test]
    fn raw_attributes_clear_line_discipline() {
        let original: libc::termios = unsafe {
            let mut t: libc::termios = std::mem::zeroed();
            t.c_iflag = libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON;
            t.c_oflag = libc::OPOST;
            t.c_cflag = libc::CS7 | libc::CREAD;
            t.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
            t.c_cc[libc::VMIN] = 1;
            t
        };

        let raw = raw_attributes(&original, DEFAULT_READ_TIMEOUT);

        assert_eq!(raw.c_iflag, 0);
        assert_eq!(raw.c_oflag & libc::OPOST, 0);
        assert_eq!(raw.c_lflag, 0);
        assert_eq!(raw.c_cflag & libc::CSIZE, libc::CS8);
        assert_ne!(raw.c_cflag & libc::CREAD, 0, "unrelated flags survive");
        assert_eq!(raw.c_cc[libc::VMIN], 0);
        assert_eq!(raw.c_cc[libc::VTIME], 1);
        // The input is never modified.
        assert_eq!(original.c_lflag, libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
    }

    // ── Descriptors that are not terminals ──────────────────────────

    #[test]
    fn enter_on_non_tty_is_query_error() {
        let null = std::fs::File::open("/dev/null").unwrap();
        let mut term = RawTerminal::new(null.as_raw_fd());
        assert!(matches!(term.enter(), Err(Error::TerminalQuery(_))));
        assert!(!term.is_active());
        assert!(term.original().is_none());
    }

    #[test]
    fn window_size_of_non_tty_is_none() {
        let null = std::fs::File::open("/dev/null").unwrap();
        assert!(window_size(null.as_raw_fd()).is_none());
        assert!(!is_tty(null.as_raw_fd()));
    }

    #[test]
    fn restore_without_enter_is_noop() {
        let mut term = RawTerminal::new(-1);
        term.restore().unwrap();
        term.restore().unwrap();
    }

    // ── Real pseudo-terminal ────────────────────────────────────────

    #[test]
    fn enter_installs_raw_mode_on_pty() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();

        let mut term = RawTerminal::new(fd);
        term.enter().unwrap();
        assert!(term.is_active());

        let now = get_attributes(fd).unwrap();
        assert_eq!(now.c_lflag & (libc::ECHO | libc::ICANON | libc::ISIG), 0);
        assert_eq!(now.c_iflag & (libc::ICRNL | libc::IXON), 0);
        assert_eq!(now.c_oflag & libc::OPOST, 0);
        assert_eq!(now.c_cc[libc::VMIN], 0);
        assert_eq!(now.c_cc[libc::VTIME], 1);

        term.restore().unwrap();
    }

    #[test]
    fn restore_puts_original_attributes_back() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();
        let before = get_attributes(fd).unwrap();

        let mut term = RawTerminal::new(fd).with_read_timeout(Duration::from_millis(300));
        term.enter().unwrap();
        assert_eq!(get_attributes(fd).unwrap().c_cc[libc::VTIME], 3);
        term.restore().unwrap();

        let after = get_attributes(fd).unwrap();
        assert!(same_attributes(&before, &after));
        assert!(same_attributes(term.original().unwrap(), &after));
    }

    #[test]
    fn restore_is_idempotent() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();
        let before = get_attributes(fd).unwrap();

        let mut term = RawTerminal::new(fd);
        term.enter().unwrap();
        term.restore().unwrap();
        term.restore().unwrap();
        assert!(!term.is_active());
        assert!(same_attributes(&before, &get_attributes(fd).unwrap()));
    }

    #[test]
    fn double_enter_keeps_first_capture() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();
        let before = get_attributes(fd).unwrap();

        let mut term = RawTerminal::new(fd);
        term.enter().unwrap();
        term.enter().unwrap();
        assert!(same_attributes(term.original().unwrap(), &before));
        term.restore().unwrap();
        assert!(same_attributes(&before, &get_attributes(fd).unwrap()));
    }

    #[test]
    fn drop_restores() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();
        let before = get_attributes(fd).unwrap();

        {
            let mut term = RawTerminal::new(fd);
            term.enter().unwrap();
        }

        assert!(same_attributes(&before, &get_attributes(fd).unwrap()));
    }

    #[test]
    fn backup_hook_restores_without_the_session() {
        let Some(pty) = Pty::open() else { return };
        let fd = pty.slave_fd();
        let before = get_attributes(fd).unwrap();

        let mut term = RawTerminal::new(fd);
        term.enter().unwrap();
        // What the atexit / panic hook does when the owner never gets to run.
        restore_termios_from_backup();
        assert!(same_attributes(&before, &get_attributes(fd).unwrap()));
        term.restore().unwrap();
    }

    #[test]
    fn window_size_reads_pty_dimensions() {
        let Some(pty) = Pty::open() else { return };
        pty.set_size(24, 80);
        assert_eq!(window_size(pty.slave_fd()), Geometry::new(24, 80));
        assert!(is_tty(pty.slave_fd()));
    }

    #[test]
    fn window_size_zero_is_none() {
        let Some(pty) = Pty::open() else { return };
        pty.set_size(24, 0);
        assert_eq!(window_size(pty.slave_fd()), None);
    }
}
