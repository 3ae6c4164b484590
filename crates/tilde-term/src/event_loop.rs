// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Event loop — render, wait for a key, react. Repeat.
//
// Each iteration composes a complete frame into a fresh `RenderBuffer` and
// sends it in one write, then waits for exactly one logical key and hands
// it to the application. The application answers with an `Action`; `Quit`
// erases the screen, homes the cursor, and returns.
//
// # Waiting
//
// The only place the loop blocks is the key decoder, and it never blocks
// longer than one read timeout (100 ms by default) before reporting "idle".
// Idle turns are used for one thing: resize handling.
//
// # SIGWINCH Handling
//
// Resize is detected via a SIGWINCH handler that sets an `AtomicBool`. On
// the next idle turn the loop re-queries the geometry (ioctl first, cursor
// probe second; the probe alone when no size descriptor was given), tells
// the application, and redraws. A failed re-query
// keeps the previous geometry: unlike at startup, there is a usable size
// to fall back on.

use std::io::Write;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::ansi::{self, CursorTo};
use crate::error::{Error, Result};
use crate::geometry::{self, Geometry, Position};
use crate::input::{Key, KeyDecoder};
use crate::output::RenderBuffer;
use crate::reader::ByteSource;
use crate::terminal;

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

/// Global flag set by the SIGWINCH handler. Checked on idle turns.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Install a signal handler for SIGWINCH (terminal resize).
///
/// The handler only stores to an atomic, which is async-signal-safe.
fn install_sigwinch_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application tells the event loop to do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep going.
    Continue,
    /// Reset the screen and leave the loop.
    Quit,
}

/// Application interface for the event loop.
///
/// Per iteration the loop calls [`paint`](App::paint) and
/// [`cursor`](App::cursor) to build the frame, then
/// [`on_key`](App::on_key) once. [`on_resize`](App::on_resize) runs
/// between iterations when the terminal changes size.
pub trait App {
    /// React to one key.
    fn on_key(&mut self, key: Key) -> Action;

    /// The terminal now has a different size.
    fn on_resize(&mut self, _geometry: Geometry) {}

    /// Append the rows of the frame.
    ///
    /// The cursor has already been hidden and homed; the loop positions
    /// and shows it afterwards.
    ///
    /// # Errors
    ///
    /// Propagate [`RenderBuffer`] errors; the frame is abandoned.
    fn paint(&self, frame: &mut RenderBuffer, geometry: Geometry) -> Result<()>;

    /// Where the terminal cursor goes once the frame is drawn.
    fn cursor(&self) -> Position;
}

/// Build one full frame: hide cursor, home, rows, place cursor, show cursor.
///
/// Pure with respect to `app` and `geometry`: the same inputs always yield
/// the same bytes.
///
/// # Errors
///
/// Returns [`Error::Allocation`] if the buffer cannot grow, or whatever
/// [`App::paint`] returns.
pub fn compose_frame(frame: &mut RenderBuffer, app: &impl App, geometry: Geometry) -> Result<()> {
    frame.append(ansi::CURSOR_HIDE)?;
    frame.append(ansi::CURSOR_HOME)?;
    app.paint(frame, geometry)?;
    let Position { x, y } = app.cursor();
    frame.append_fmt(format_args!("{}", CursorTo { x, y }))?;
    frame.append(ansi::CURSOR_SHOW)
}

/// Erase the screen and home the cursor.
///
/// Written on quit and on fatal exit so the shell prompt starts on a clean
/// screen.
///
/// # Errors
///
/// Returns [`Error::Write`] if the sink fails.
pub fn reset_screen(w: &mut impl Write) -> Result<()> {
    w.write_all(ansi::SCREEN_RESET)
        .and_then(|()| w.flush())
        .map_err(Error::Write)
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The render → key → react cycle.
///
/// Generic over its byte source and sink so it can run against a tty, a
/// pty, or plain memory.
///
/// # Example
///
/// ```no_run
/// use tilde_term::event_loop::{Action, App, EventLoop};
/// use tilde_term::geometry::{Geometry, Position};
/// use tilde_term::input::{Key, KeyDecoder};
/// use tilde_term::output::{RenderBuffer, TtyWriter};
/// use tilde_term::reader::TtyReader;
///
/// struct Blank;
///
/// impl App for Blank {
///     fn on_key(&mut self, key: Key) -> Action {
///         if key.is_ctrl(b'q') { Action::Quit } else { Action::Continue }
///     }
///     fn paint(&self, _: &mut RenderBuffer, _: Geometry) -> tilde_term::Result<()> {
///         Ok(())
///     }
///     fn cursor(&self) -> Position {
///         Position::default()
///     }
/// }
///
/// let geometry = Geometry::new(24, 80).unwrap();
/// let mut event_loop =
///     EventLoop::new(KeyDecoder::new(TtyReader::stdin()), TtyWriter::stdout(), geometry);
/// event_loop.run(&mut Blank)?;
/// # Ok::<(), tilde_term::Error>(())
/// ```
pub struct EventLoop<S, W> {
    decoder: KeyDecoder<S>,
    output: W,
    geometry: Geometry,
    /// Whether SIGWINCH is being followed.
    watching: bool,
    /// Descriptor whose window size is asked first on resize. `None`
    /// measures with the cursor probe only.
    size_fd: Option<RawFd>,
}

impl<S: ByteSource, W: Write> EventLoop<S, W> {
    #[must_use]
    pub const fn new(decoder: KeyDecoder<S>, output: W, geometry: Geometry) -> Self {
        Self {
            decoder,
            output,
            geometry,
            watching: false,
            size_fd: None,
        }
    }

    /// Follow terminal resizes.
    ///
    /// The new size comes from the ioctl on `size_fd`, falling back to the
    /// cursor probe; with `None` the probe is the only source, matching a
    /// session that skipped the ioctl at startup. Installs the
    /// process-wide SIGWINCH handler.
    #[must_use]
    pub fn watch_resize(mut self, size_fd: Option<RawFd>) -> Self {
        install_sigwinch_handler();
        self.watching = true;
        self.size_fd = size_fd;
        self
    }

    /// The geometry frames are currently drawn for.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The output sink.
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.output
    }

    /// Run until the application returns [`Action::Quit`].
    ///
    /// On quit the screen is erased and the cursor homed before returning
    /// `Ok(())`. Errors return immediately without touching the screen;
    /// the caller restores the terminal first, then resets the screen.
    ///
    /// # Errors
    ///
    /// Returns the first read, write, render, or allocation error.
    pub fn run(&mut self, app: &mut impl App) -> Result<()> {
        loop {
            self.refresh(app)?;

            let Some(key) = self.wait_for_key(app)? else {
                continue;
            };

            if app.on_key(key) == Action::Quit {
                debug!("quit requested");
                return reset_screen(&mut self.output);
            }
        }
    }

    /// Compose and flush one frame.
    ///
    /// # Errors
    ///
    /// See [`compose_frame`] and [`RenderBuffer::flush_to`].
    pub fn refresh(&mut self, app: &impl App) -> Result<()> {
        let mut frame = RenderBuffer::for_frame()?;
        compose_frame(&mut frame, app, self.geometry)?;
        frame.flush_to(&mut self.output)
    }

    /// Wait for a key. `None` means the terminal was resized and the
    /// frame must be redrawn first.
    fn wait_for_key(&mut self, app: &mut impl App) -> Result<Option<Key>> {
        loop {
            if let Some(key) = self.decoder.poll_key()? {
                return Ok(Some(key));
            }
            if self.watching && SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                self.resize(app);
                return Ok(None);
            }
        }
    }

    fn resize(&mut self, app: &mut impl App) {
        let requery = geometry::query(
            self.size_fd.and_then(terminal::window_size),
            self.decoder.source_mut(),
            &mut self.output,
        );

        match requery {
            Ok(geometry) if geometry != self.geometry => {
                info!(rows = geometry.rows(), cols = geometry.cols(), "terminal resized");
                self.geometry = geometry;
                app.on_resize(geometry);
            }
            Ok(_) => {}
            Err(e) => warn!(
                error = %e,
                rows = self.geometry.rows(),
                cols = self.geometry.cols(),
                "resize re-query failed, keeping previous size"
            ),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
