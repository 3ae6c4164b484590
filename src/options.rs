// SPDX-License-Identifier: MIT
//
// Command-line options.
//
// Parsed by hand. Help and version are returned as outcomes rather than
// printed here; `parse` does no I/O.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use tilde_term::terminal::DEFAULT_READ_TIMEOUT;

/// Everything the command line can configure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Write tracing output here. Logging is off without it.
    pub log_file: Option<PathBuf>,
    /// Skip the ioctl and measure the window with the cursor probe.
    pub probe_only: bool,
    /// How long one raw-mode read may wait.
    pub read_timeout: Duration,
    /// Letter whose control chord quits.
    pub quit_key: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_file: None,
            probe_only: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            quit_key: b'q',
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(Options),
    Help,
    Version,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unknown option '{0}'")]
    Unknown(String),

    #[error("option '{0}' needs a value")]
    MissingValue(&'static str),

    #[error("invalid timeout '{0}': expected milliseconds between 1 and 25500")]
    BadTimeout(String),

    #[error("invalid quit key '{0}': expected a single letter a-z")]
    BadQuitKey(String),
}

/// Upper bound of the termios VTIME field, in milliseconds.
const MAX_TIMEOUT_MS: u64 = 25_500;

/// Parse arguments (without the program name).
///
/// # Errors
///
/// Returns an [`OptionsError`] for unknown flags, missing values, or
/// values out of range.
pub fn parse<I>(args: I) -> Result<Invocation, OptionsError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-V" | "--version" => return Ok(Invocation::Version),
            "--probe" => options.probe_only = true,
            "--log" => {
                let path = args.next().ok_or(OptionsError::MissingValue("--log"))?;
                options.log_file = Some(PathBuf::from(path));
            }
            "--timeout-ms" => {
                let value = args.next().ok_or(OptionsError::MissingValue("--timeout-ms"))?;
                options.read_timeout = parse_timeout(&value)?;
            }
            "--quit-key" => {
                let value = args.next().ok_or(OptionsError::MissingValue("--quit-key"))?;
                options.quit_key = parse_quit_key(&value)?;
            }
            _ => return Err(OptionsError::Unknown(arg)),
        }
    }

    Ok(Invocation::Run(options))
}

fn parse_timeout(value: &str) -> Result<Duration, OptionsError> {
    match value.parse::<u64>() {
        Ok(ms @ 1..=MAX_TIMEOUT_MS) => Ok(Duration::from_millis(ms)),
        _ => Err(OptionsError::BadTimeout(value.to_string())),
    }
}

fn parse_quit_key(value: &str) -> Result<u8, OptionsError> {
    match value.as_bytes() {
        [b] if b.is_ascii_alphabetic() => Ok(b.to_ascii_lowercase()),
        _ => Err(OptionsError::BadQuitKey(value.to_string())),
    }
}

pub fn help() -> String {
    format!(
        "tilde {version}
A raw-mode terminal screen of '~' rows with a movable cursor.

USAGE:
    tilde [OPTIONS]

OPTIONS:
    --log <path>        Write a trace log to <path>
    --probe             Measure the window with the cursor probe only
    --timeout-ms <n>    Read timeout in milliseconds [default: 100]
    --quit-key <letter> Quit on Ctrl-<letter> [default: q]
    -h, --help          Print this help
    -V, --version       Print the version

KEYS:
    Arrows              Move one cell
    Home / End          First / last column
    PageUp / PageDown   First / last row
    Ctrl-<quit key>     Quit (default Ctrl-Q)",
        version = env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn run(list: &[&str]) -> Options {
        match parse(args(list)).unwrap() {
            Invocation::Run(options) => options,
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn no_arguments_gives_defaults() {
        assert_eq!(run(&[]), Options::default());
        assert_eq!(Options::default().read_timeout, Duration::from_millis(100));
        assert_eq!(Options::default().quit_key, b'q');
    }

    #[test]
    fn all_options() {
        let options = run(&["--log", "/tmp/tilde.log", "--probe", "--timeout-ms", "250", "--quit-key", "X"]);
        assert_eq!(
            options,
            Options {
                log_file: Some(PathBuf::from("/tmp/tilde.log")),
                probe_only: true,
                read_timeout: Duration::from_millis(250),
                quit_key: b'x',
            }
        );
    }

    #[test]
    fn help_and_version_win_immediately() {
        assert_eq!(parse(args(&["-h", "--bogus"])), Ok(Invocation::Help));
        assert_eq!(parse(args(&["--version"])), Ok(Invocation::Version));
        assert_eq!(parse(args(&["-V"])), Ok(Invocation::Version));
    }

    #[test]
    fn unknown_option() {
        assert_eq!(parse(args(&["file.txt"])), Err(OptionsError::Unknown("file.txt".into())));
    }

    #[test]
    fn missing_values() {
        assert_eq!(parse(args(&["--log"])), Err(OptionsError::MissingValue("--log")));
        assert_eq!(parse(args(&["--timeout-ms"])), Err(OptionsError::MissingValue("--timeout-ms")));
        assert_eq!(parse(args(&["--quit-key"])), Err(OptionsError::MissingValue("--quit-key")));
    }

    #[test]
    fn timeout_range() {
        for bad in ["0", "-5", "abc", "25501", ""] {
            assert_eq!(
                parse(args(&["--timeout-ms", bad])),
                Err(OptionsError::BadTimeout(bad.into())),
                "{bad:?}"
            );
        }
        assert_eq!(run(&["--timeout-ms", "1"]).read_timeout, Duration::from_millis(1));
        assert_eq!(run(&["--timeout-ms", "25500"]).read_timeout, Duration::from_millis(25_500));
    }

    #[test]
    fn quit_key_must_be_one_letter() {
        for bad in ["", "qq", "1", "~"] {
            assert_eq!(parse(args(&["--quit-key", bad])), Err(OptionsError::BadQuitKey(bad.into())));
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(OptionsError::Unknown("-z".into()).to_string(), "unknown option '-z'");
        assert_eq!(OptionsError::MissingValue("--log").to_string(), "option '--log' needs a value");
    }

    #[test]
    fn help_lists_every_option() {
        let text = help();
        for flag in ["--log", "--probe", "--timeout-ms", "--quit-key", "--help", "--version"] {
            assert!(text.contains(flag), "{flag}");
        }
    }

    #[test]
    fn help_names_the_configurable_quit_chord() {
        let text = help();
        assert!(text.contains("Ctrl-<quit key>"));
        assert!(text.contains("default Ctrl-Q"));
    }
}
