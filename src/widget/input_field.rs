//! Editable text buffer for the note panel fields

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;
use ratatui::text::{Line, Span};

#[derive(Debug, Clone, Default)]
pub struct InputField {
    text: String,
    /// Cursor as a char index into `text`
    cursor: usize,
    multiline: bool,
}

impl InputField {
    pub fn single_line() -> Self {
        Self::default()
    }

    pub fn multi_line() -> Self {
        Self {
            multiline: true,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = if self.multiline {
            text.to_string()
        } else {
            text.replace('\n', " ")
        };
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        if c == '\n' && !self.multiline {
            return;
        }
        let idx = self.byte_index(self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index(self.cursor);
        self.text.remove(idx);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Applies an editing key. Returns false for keys the field ignores.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('a') => {
                    self.move_home();
                    true
                }
                KeyCode::Char('e') => {
                    self.move_end();
                    true
                }
                KeyCode::Char('u') => {
                    self.clear();
                    true
                }
                _ => false,
            };
        }

        match key.code {
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Enter if self.multiline => self.insert_char('\n'),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            _ => return false,
        }
        true
    }

    /// Display lines with the cursor cell drawn in `cursor_style` when
    /// `focused`.
    pub fn styled_lines(
        &self,
        text_style: Style,
        cursor_style: Style,
        focused: bool,
    ) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let mut spans = Vec::new();
        let mut current = String::new();

        for (idx, c) in self.text.chars().enumerate() {
            if focused && idx == self.cursor {
                if !current.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut current), text_style));
                }
                let shown = if c == '\n' { " ".to_string() } else { c.to_string() };
                spans.push(Span::styled(shown, cursor_style));
                if c == '\n' {
                    lines.push(Line::from(std::mem::take(&mut spans)));
                }
                continue;
            }
            if c == '\n' {
                spans.push(Span::styled(std::mem::take(&mut current), text_style));
                lines.push(Line::from(std::mem::take(&mut spans)));
            } else {
                current.push(c);
            }
        }

        if !current.is_empty() {
            spans.push(Span::styled(current, text_style));
        }
        if focused && self.cursor >= self.text.chars().count() {
            spans.push(Span::styled(" ", cursor_style));
        }
        lines.push(Line::from(spans));
        lines
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_editing() {
        let mut field = InputField::single_line();
        for c in "Rivr".chars() {
            field.handle_key(key(KeyCode::Char(c)));
        }
        field.handle_key(key(KeyCode::Left));
        field.handle_key(key(KeyCode::Char('e')));
        assert_eq!(field.text(), "River");

        field.handle_key(key(KeyCode::End));
        field.handle_key(key(KeyCode::Backspace));
        assert_eq!(field.text(), "Rive");

        field.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(field.text(), "");
    }

    #[test]
    fn single_line_ignores_newlines() {
        let mut field = InputField::single_line();
        assert!(!field.handle_key(key(KeyCode::Enter)));
        field.set_text("a\nb");
        assert_eq!(field.text(), "a b");
    }

    #[test]
    fn multi_line_accepts_enter() {
        let mut field = InputField::multi_line();
        field.handle_key(key(KeyCode::Char('a')));
        field.handle_key(key(KeyCode::Enter));
        field.handle_key(key(KeyCode::Char('b')));
        assert_eq!(field.text(), "a\nb");

        let lines = field.styled_lines(Style::default(), Style::default(), true);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn handles_multibyte_characters() {
        let mut field = InputField::single_line();
        field.set_text("naïve");
        field.handle_key(key(KeyCode::Left));
        field.handle_key(key(KeyCode::Backspace));
        field.handle_key(key(KeyCode::Backspace));
        assert_eq!(field.text(), "nae");
    }
}
