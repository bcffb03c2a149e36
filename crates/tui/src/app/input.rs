use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_segmentation::UnicodeSegmentation;

/// Grapheme-aware text buffer with a cursor, shared by the message box and popups.
#[derive(Clone, Debug, Default)]
pub struct LineEditor {
    text: String,
    cursor: usize,
}

impl LineEditor {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.graphemes(true).count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn parts(&self) -> Vec<&str> {
        self.text.graphemes(true).collect()
    }

    pub fn insert_text(&mut self, s: &str) {
        let parts = self.parts();
        let idx = self.cursor.min(parts.len());
        let mut new_text = String::with_capacity(self.text.len() + s.len());
        for g in &parts[..idx] {
            new_text.push_str(g);
        }
        new_text.push_str(s);
        for g in &parts[idx..] {
            new_text.push_str(g);
        }
        self.text = new_text;
        let added = s.graphemes(true).count();
        self.cursor = (idx + added).min(self.text.graphemes(true).count());
    }

    pub fn insert_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.insert_text(ch.encode_utf8(&mut buf));
    }

    pub fn delete_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let mut parts = self.parts();
        let idx = self.cursor.min(parts.len());
        parts.remove(idx - 1);
        self.text = parts.concat();
        self.cursor = idx - 1;
    }

    pub fn delete_right(&mut self) {
        let mut parts = self.parts();
        let idx = self.cursor.min(parts.len());
        if idx < parts.len() {
            parts.remove(idx);
            self.text = parts.concat();
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        let len = self.text.graphemes(true).count();
        if self.cursor < len {
            self.cursor += 1;
        }
    }

    pub fn move_line_start(&mut self) {
        let parts = self.parts();
        let mut i = self.cursor.min(parts.len());
        while i > 0 && parts[i - 1] != "\n" {
            i -= 1;
        }
        self.cursor = i;
    }

    pub fn move_line_end(&mut self) {
        let parts = self.parts();
        let mut i = self.cursor.min(parts.len());
        while i < parts.len() && parts[i] != "\n" {
            i += 1;
        }
        self.cursor = i;
    }

    pub fn delete_prev_word(&mut self) {
        let parts = self.parts();
        let end = self.cursor.min(parts.len());
        let mut i = end;
        while i > 0 && parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        while i > 0 && !parts[i - 1].trim().is_empty() {
            i -= 1;
        }
        let mut newp = parts.clone();
        newp.drain(i..end);
        self.text = newp.concat();
        self.cursor = i;
    }

    pub fn kill_to_line_start(&mut self) {
        let parts = self.parts();
        let end = self.cursor.min(parts.len());
        let mut start = end;
        while start > 0 && parts[start - 1] != "\n" {
            start -= 1;
        }
        let mut newp = parts.clone();
        newp.drain(start..end);
        self.text = newp.concat();
        self.cursor = start;
    }

    pub fn kill_to_line_end(&mut self) {
        let parts = self.parts();
        let start = self.cursor.min(parts.len());
        let mut end = start;
        while end < parts.len() && parts[end] != "\n" {
            end += 1;
        }
        let mut newp = parts.clone();
        newp.drain(start..end);
        self.text = newp.concat();
    }

    /// Applies a common editing key. Returns true when the text or cursor changed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('w') if ctrl => self.delete_prev_word(),
            KeyCode::Char('u') if ctrl => self.kill_to_line_start(),
            KeyCode::Char('k') if ctrl => self.kill_to_line_end(),
            KeyCode::Char('a') if ctrl => self.move_line_start(),
            KeyCode::Char('e') if ctrl => self.move_line_end(),
            KeyCode::Char(_) if ctrl => return false,
            KeyCode::Char(ch) => self.insert_char(ch),
            KeyCode::Backspace => self.delete_left(),
            KeyCode::Delete => self.delete_right(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_line_start(),
            KeyCode::End => self.move_line_end(),
            _ => return false,
        }
        true
    }

    /// Text before the cursor, used for caret placement.
    pub fn before_cursor(&self) -> String {
        self.text.graphemes(true).take(self.cursor).collect()
    }
}
