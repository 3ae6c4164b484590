// SPDX-License-Identifier: MIT
//
// Key decoding.
//
// Turns the raw byte stream into logical keys. Most keys are one byte.
// Arrow, paging, and Home/End keys arrive as escape sequences:
//
//   ESC [ A/B/C/D      arrows            (xterm)
//   ESC [ H / ESC [ F  Home / End        (xterm)
//   ESC [ n ~          Home/End/PgUp/PgDn (VT100: 1,7 / 4,8 / 5 / 6)
//
// # State machine
//
//   NORMAL        read; timeout → idle (retry); ESC → ESC_SEEN; else literal
//   ESC_SEEN      read; '[' → BRACKET_SEEN; timeout or other → Escape
//   BRACKET_SEEN  read; digit → expect '~'; letter → table; unknown → Escaped
//
// Every read is bounded by the source's timeout, so a half-typed sequence
// resolves to a degraded key after at most three waits. Bytes consumed by
// an abandoned sequence are dropped, not replayed. Nothing here is an
// error except a genuine read failure: a user pressing an exotic key
// should never crash the session.

use tracing::trace;

use crate::ansi::ESC;
use crate::error::{Error, Result};
use crate::reader::ByteSource;

// ─── Keys ────────────────────────────────────────────────────────────────────

/// A logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A literal byte that is not a control character (printable ASCII,
    /// DEL, or a high byte).
    Char(u8),
    /// A control byte `0x01..=0x1A`, carried as the lowercase letter it
    /// masks to: `Ctrl(b'q')` is byte `0x11`.
    Ctrl(u8),
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    /// A lone Escape, or a sequence that could not be completed.
    Escape,
    /// `ESC [` followed by a byte with no mapping.
    Escaped(u8),
}

/// The byte a terminal sends for Ctrl + `letter`: the low five bits.
///
/// `ctrl(b'q') == 0x11`. Case-insensitive, like the keyboard.
#[inline]
#[must_use]
pub const fn ctrl(letter: u8) -> u8 {
    letter & 0x1f
}

impl Key {
    /// Classify a single byte read in the idle state (never ESC).
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        match b {
            0x01..=0x1A => Self::Ctrl(b | 0x60),
            _ => Self::Char(b),
        }
    }

    /// Whether this is Ctrl + `letter`.
    #[must_use]
    pub const fn is_ctrl(self, letter: u8) -> bool {
        matches!(self, Self::Ctrl(l) if ctrl(l) == ctrl(letter))
    }
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Reads logical keys from a [`ByteSource`].
#[derive(Debug)]
pub struct KeyDecoder<S> {
    source: S,
}

impl<S: ByteSource> KeyDecoder<S> {
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// The underlying byte stream. The cursor probe reads its reply here.
    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Give back the byte stream.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Block until a key arrives, retrying idle timeouts indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the source fails.
    pub fn next_key(&mut self) -> Result<Key> {
        loop {
            if let Some(key) = self.poll_key()? {
                return Ok(key);
            }
        }
    }

    /// Wait one timeout interval for a key.
    ///
    /// Returns `Ok(None)` if the source was idle, so the caller can do
    /// periodic work (resize handling) between waits. Once the first byte
    /// has arrived a key is always returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the source fails.
    pub fn poll_key(&mut self) -> Result<Option<Key>> {
        match self.read()? {
            None => Ok(None),
            Some(ESC) => self.after_escape().map(Some),
            Some(b) => Ok(Some(Key::from_byte(b))),
        }
    }

    fn read(&mut self) -> Result<Option<u8>> {
        self.source.read_byte().map_err(Error::Read)
    }

    /// ESC_SEEN.
    fn after_escape(&mut self) -> Result<Key> {
        match self.read()? {
            Some(b'[') => self.after_bracket(),
            other => {
                if let Some(b) = other {
                    trace!(byte = b, "ESC not followed by '[', dropping");
                }
                Ok(Key::Escape)
            }
        }
    }

    /// BRACKET_SEEN.
    fn after_bracket(&mut self) -> Result<Key> {
        let Some(b) = self.read()? else {
            return Ok(Key::Escape);
        };

        if b.is_ascii_digit() {
            return match self.read()? {
                Some(b'~') => Ok(tilde_key(b).unwrap_or_else(|| {
                    trace!(digit = b, "unmapped ESC [ n ~");
                    Key::Escape
                })),
                other => {
                    trace!(digit = b, next = ?other, "ESC [ digit without '~'");
                    Ok(Key::Escape)
                }
            };
        }

        Ok(csi_letter_key(b).unwrap_or_else(|| {
            trace!(byte = b, "unmapped ESC [ sequence");
            Key::Escaped(b)
        }))
    }
}

/// VT100 `ESC [ n ~` editing keys.
const fn tilde_key(digit: u8) -> Option<Key> {
    match digit {
        b'1' | b'7' => Some(Key::Home),
        b'4' | b'8' => Some(Key::End),
        b'5' => Some(Key::PageUp),
        b'6' => Some(Key::PageDown),
        _ => None,
    }
}

/// xterm `ESC [ x` cursor keys.
const fn csi_letter_key(b: u8) -> Option<Key> {
    match b {
        b'A' => Some(Key::Up),
        b'B' => Some(Key::Down),
        b'C' => Some(Key::Right),
        b'D' => Some(Key::Left),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Scripted;
    use std::collections::VecDeque;
    use std::io;

    /// Decode every key in `bytes`.
    fn decode_all(bytes: &[u8]) -> Vec<Key> {
        let mut decoder = KeyDecoder::new(bytes);
        let mut keys = Vec::new();
        while let Some(key) = decoder.poll_key().unwrap() {
            keys.push(key);
        }
        keys
    }

    /// Decode exactly one key from `bytes`, which must all be consumed.
    fn decode_one(bytes: &[u8]) -> Key {
        let mut decoder = KeyDecoder::new(bytes);
        let key = decoder.poll_key().unwrap().expect("a key");
        assert!(decoder.into_inner().is_empty(), "{bytes:?} left bytes behind");
        key
    }

    // ── Single bytes ────────────────────────────────────────────────

    #[test]
    fn printable_bytes_are_literal() {
        assert_eq!(decode_one(b"a"), Key::Char(b'a'));
        assert_eq!(decode_one(b"~"), Key::Char(b'~'));
        assert_eq!(decode_one(b" "), Key::Char(b' '));
        assert_eq!(decode_one(b"["), Key::Char(b'['));
    }

    #[test]
    fn del_and_high_bytes_are_literal() {
        assert_eq!(decode_one(b"\x7f"), Key::Char(0x7f));
        assert_eq!(decode_one(b"\xc3"), Key::Char(0xc3));
        assert_eq!(decode_one(b"\x00"), Key::Char(0x00));
    }

    #[test]
    fn control_bytes_decode_as_ctrl_letters() {
        assert_eq!(decode_one(b"\x11"), Key::Ctrl(b'q'));
        assert_eq!(decode_one(b"\x01"), Key::Ctrl(b'a'));
        assert_eq!(decode_one(b"\x1a"), Key::Ctrl(b'z'));
        assert_eq!(decode_one(b"\r"), Key::Ctrl(b'm'));
    }

    #[test]
    fn ctrl_masks_low_five_bits() {
        assert_eq!(ctrl(b'q'), 0x11);
        assert_eq!(ctrl(b'Q'), 0x11);
        assert_eq!(ctrl(b'a'), 0x01);
    }

    #[test]
    fn is_ctrl_matches_either_case() {
        let key = Key::from_byte(0x11);
        assert!(key.is_ctrl(b'q'));
        assert!(key.is_ctrl(b'Q'));
        assert!(!key.is_ctrl(b'w'));
        assert!(!Key::Char(b'q').is_ctrl(b'q'));
    }

    // ── Escape sequences: the full table ────────────────────────────

    #[test]
    fn xterm_letter_sequences() {
        let table: &[(&[u8], Key)] = &[
            (b"\x1b[A", Key::Up),
            (b"\x1b[B", Key::Down),
            (b"\x1b[C", Key::Right),
            (b"\x1b[D", Key::Left),
            (b"\x1b[H", Key::Home),
            (b"\x1b[F", Key::End),
        ];
        for &(bytes, key) in table {
            assert_eq!(decode_one(bytes), key, "{bytes:?}");
        }
    }

    #[test]
    fn vt100_tilde_sequences() {
        let table: &[(&[u8], Key)] = &[
            (b"\x1b[1~", Key::Home),
            (b"\x1b[7~", Key::Home),
            (b"\x1b[4~", Key::End),
            (b"\x1b[8~", Key::End),
            (b"\x1b[5~", Key::PageUp),
            (b"\x1b[6~", Key::PageDown),
        ];
        for &(bytes, key) in table {
            assert_eq!(decode_one(bytes), key, "{bytes:?}");
        }
    }

    #[test]
    fn unmapped_tilde_digit_is_escape() {
        assert_eq!(decode_one(b"\x1b[9~"), Key::Escape);
        assert_eq!(decode_one(b"\x1b[3~"), Key::Escape);
        assert_eq!(decode_one(b"\x1b[0~"), Key::Escape);
    }

    #[test]
    fn digit_without_tilde_is_escape_and_trailer_is_dropped() {
        assert_eq!(decode_all(b"\x1b[5xa"), vec![Key::Escape, Key::Char(b'a')]);
    }

    #[test]
    fn unmapped_letter_is_escaped_literal() {
        assert_eq!(decode_one(b"\x1b[Z"), Key::Escaped(b'Z'));
        assert_eq!(decode_one(b"\x1b[q"), Key::Escaped(b'q'));
        assert_eq!(decode_one(b"\x1b[\x1b"), Key::Escaped(ESC));
    }

    #[test]
    fn every_escape_bracket_pair_decodes_without_error() {
        for b in 0..=u8::MAX {
            for trailer in [None, Some(b'~'), Some(b'x')] {
                let mut bytes = vec![ESC, b'[', b];
                bytes.extend(trailer);
                let key = KeyDecoder::new(bytes.as_slice()).poll_key().unwrap().unwrap();
                assert!(
                    matches!(
                        key,
                        Key::Escape
                            | Key::Escaped(_)
                            | Key::Up
                            | Key::Down
                            | Key::Left
                            | Key::Right
                            | Key::Home
                            | Key::End
                            | Key::PageUp
                            | Key::PageDown
                    ),
                    "{bytes:?} → {key:?}"
                );
            }
        }
    }

    // ── Escape ambiguity and timeouts ───────────────────────────────

    #[test]
    fn lone_escape_times_out_to_escape() {
        assert_eq!(decode_one(b"\x1b"), Key::Escape);
    }

    #[test]
    fn escape_then_other_byte_drops_it() {
        assert_eq!(decode_all(b"\x1bxa"), vec![Key::Escape, Key::Char(b'a')]);
    }

    #[test]
    fn escape_bracket_then_timeout_is_escape() {
        let mut decoder = KeyDecoder::new(Scripted::new([Some(ESC), Some(b'['), None, Some(b'A')]));
        assert_eq!(decoder.poll_key().unwrap(), Some(Key::Escape));
        // The late 'A' is not glued to the abandoned sequence.
        assert_eq!(decoder.poll_key().unwrap(), Some(Key::Char(b'A')));
    }

    #[test]
    fn escape_bracket_digit_then_timeout_is_escape() {
        let mut decoder = KeyDecoder::new(Scripted::new([Some(ESC), Some(b'['), Some(b'5'), None]));
        assert_eq!(decoder.poll_key().unwrap(), Some(Key::Escape));
    }

    #[test]
    fn idle_poll_returns_none() {
        let mut decoder = KeyDecoder::new(Scripted::new([None]));
        assert_eq!(decoder.poll_key().unwrap(), None);
    }

    #[test]
    fn next_key_retries_idle_timeouts() {
        let mut decoder = KeyDecoder::new(Scripted::new([None, None, None, Some(b'x')]));
        assert_eq!(decoder.next_key().unwrap(), Key::Char(b'x'));
    }

    #[test]
    fn consecutive_sequences() {
        assert_eq!(
            decode_all(b"\x1b[A\x1b[B\x1b[5~q\x1b[F"),
            vec![Key::Up, Key::Down, Key::PageUp, Key::Char(b'q'), Key::End]
        );
    }

    // ── Errors ──────────────────────────────────────────────────────

    #[test]
    fn read_error_is_fatal() {
        let mut decoder = KeyDecoder::new(Scripted::failing_after([]));
        assert!(matches!(decoder.poll_key(), Err(Error::Read(_))));
    }

    #[test]
    fn read_error_mid_sequence_is_fatal() {
        let mut decoder = KeyDecoder::new(Scripted(VecDeque::from([
            Ok(Some(ESC)),
            Err(io::Error::other("gone")),
        ])));
        assert!(matches!(decoder.next_key(), Err(Error::Read(_))));
    }
}
