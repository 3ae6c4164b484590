// SPDX-License-Identifier: MIT
//
// tilde — a raw-mode terminal screen of `~` rows with a movable cursor.
//
// Wiring:
//
//   options  → read timeout, quit key, geometry source, log file
//   terminal → raw mode for the whole session, restored on every exit path
//   geometry → ioctl, or the cursor probe when that fails (or --probe)
//   editor   → cursor state and key reactions, driven by the event loop
//
// Exit codes: 0 after the quit key, 1 on a fatal terminal error, 2 on bad
// usage. A fatal error restores the terminal first, then clears the
// screen, then reports `tilde: <operation>: <cause>` on stderr.

mod editor;
mod options;

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::path::Path;
use std::process;

use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use tilde_term::event_loop::{EventLoop, reset_screen};
use tilde_term::geometry;
use tilde_term::input::KeyDecoder;
use tilde_term::output::TtyWriter;
use tilde_term::reader::{ByteSource, TtyReader};
use tilde_term::terminal::{self, RawTerminal};

use crate::editor::Editor;
use crate::options::{Invocation, Options};

/// Route tracing output to `path`. The terminal itself belongs to the
/// screen, so without a log file nothing is recorded.
fn init_logging(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)
}

/// Everything between entering raw mode and the quit key.
///
/// `size_fd` is asked for the window size unless `--probe` was given.
fn run(
    term: &mut RawTerminal,
    input: &mut impl ByteSource,
    output: &mut impl Write,
    size_fd: RawFd,
    options: &Options,
) -> tilde_term::Result<()> {
    term.enter()?;

    let size_fd = (!options.probe_only).then_some(size_fd);
    let geometry = geometry::query(size_fd.and_then(terminal::window_size), input, output)?;

    let mut editor = Editor::new(geometry, options.quit_key);
    let mut event_loop = EventLoop::new(KeyDecoder::new(input), output, geometry).watch_resize(size_fd);
    event_loop.run(&mut editor)?;

    term.restore()
}

/// Run one session and return the process exit code.
///
/// On quit the loop has already reset the screen, so only the terminal
/// attributes remain to be put back. On error the attributes go back
/// first, then the screen is reset, then the error is reported.
fn session(
    term: &mut RawTerminal,
    mut input: impl ByteSource,
    mut output: impl Write,
    size_fd: RawFd,
    options: &Options,
) -> i32 {
    match run(term, &mut input, &mut output, size_fd, options) {
        Ok(()) => {
            info!("tilde exiting");
            0
        }
        Err(e) => {
            let _ = term.restore();
            let _ = reset_screen(&mut output);
            error!(error = %e, "fatal");
            eprintln!("tilde: {e}");
            1
        }
    }
}

fn main() {
    let options = match options::parse(env::args().skip(1)) {
        Ok(Invocation::Run(options)) => options,
        Ok(Invocation::Help) => {
            println!("{}", options::help());
            return;
        }
        Ok(Invocation::Version) => {
            println!("tilde {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Err(e) => {
            eprintln!("tilde: {e}");
            eprintln!("Try 'tilde --help' for more information.");
            process::exit(2);
        }
    };

    if let Some(ref path) = options.log_file {
        if let Err(e) = init_logging(path) {
            eprintln!("tilde: log file {}: {e}", path.display());
            process::exit(1);
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "tilde starting");

    let mut term = RawTerminal::stdin().with_read_timeout(options.read_timeout);
    let code = session(
        &mut term,
        TtyReader::stdin(),
        TtyWriter::stdout(),
        libc::STDOUT_FILENO,
        &options,
    );
    process::exit(code);
}
