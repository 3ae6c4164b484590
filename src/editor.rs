// SPDX-License-Identifier: MIT
//
// The editor: a screen of `~` rows and a cursor that moves over it.
//
// There is no text yet. The cursor is the whole state, and every key
// either moves it, quits, or does nothing.

use tilde_term::ansi;
use tilde_term::event_loop::{Action, App};
use tilde_term::geometry::{Geometry, Position};
use tilde_term::input::Key;
use tilde_term::output::RenderBuffer;

/// Marker drawn at the start of every row.
const ROW_MARKER: &[u8] = b"~";

pub struct Editor {
    cursor: Position,
    geometry: Geometry,
    /// Letter whose control chord quits.
    quit_key: u8,
}

impl Editor {
    /// A fresh editor with the cursor in the top-left cell.
    #[must_use]
    pub fn new(geometry: Geometry, quit_key: u8) -> Self {
        Self {
            cursor: Position::default(),
            geometry,
            quit_key,
        }
    }

    #[cfg(test)]
    const fn position(&self) -> Position {
        self.cursor
    }

    /// Move the cursor in response to a navigation key. Other keys are
    /// ignored.
    fn move_cursor(&mut self, key: Key) {
        let Position { x, y } = self.cursor;
        self.cursor = match key {
            Key::Left => Position::new(x.saturating_sub(1), y),
            Key::Right => Position::new(x.saturating_add(1), y),
            Key::Up => Position::new(x, y.saturating_sub(1)),
            Key::Down => Position::new(x, y.saturating_add(1)),
            Key::Home => Position::new(0, y),
            Key::End => Position::new(self.geometry.last_col(), y),
            Key::PageUp => Position::new(x, 0),
            Key::PageDown => Position::new(x, self.geometry.last_row()),
            _ => return,
        }
        .clamp_to(self.geometry);
    }
}

impl App for Editor {
    fn on_key(&mut self, key: Key) -> Action {
        if key.is_ctrl(self.quit_key) {
            return Action::Quit;
        }
        self.move_cursor(key);
        Action::Continue
    }

    fn on_resize(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        self.cursor = self.cursor.clamp_to(geometry);
    }

    fn paint(&self, frame: &mut RenderBuffer, geometry: Geometry) -> tilde_term::Result<()> {
        for row in 0..geometry.rows() {
            frame.append(ROW_MARKER)?;
            frame.append(ansi::ERASE_LINE_REST)?;
            if row < geometry.last_row() {
                frame.append(ansi::CRLF)?;
            }
        }
        Ok(())
    }

    fn cursor(&self) -> Position {
        self.cursor
    }
}
