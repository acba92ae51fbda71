use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use unicode_width::UnicodeWidthChar;

use super::PageView;
use crate::document::DisplayLine;
use crate::inputs::ClickType;
use crate::selection::SelectionPoint;

const WHEEL_LINES: usize = 3;

/// Requests the page view hands up to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageViewAction {
    AskAi,
    AddNote,
    CopySelection,
    /// Enter on a cell, which may sit on a highlight
    OpenHighlight(SelectionPoint),
    PageChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseOutcome {
    Ignored,
    Handled,
    /// A drag or double click left a selection behind
    Selected,
    /// Press and release on the same cell
    Clicked(SelectionPoint),
}

impl PageView {
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<PageViewAction> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let half_page = (self.visible_height() / 2).max(1) as isize;

        match key.code {
            KeyCode::Char('d') if ctrl => self.move_cursor(half_page, 0),
            KeyCode::Char('u') if ctrl => self.move_cursor(-half_page, 0),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1, 0),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1, 0),
            KeyCode::Char('h') | KeyCode::Left => self.move_cursor(0, -1),
            KeyCode::Char('l') | KeyCode::Right => self.move_cursor(0, 1),
            KeyCode::Char('w') => self.word_forward(),
            KeyCode::Char('b') => self.word_backward(),
            KeyCode::Char('0') | KeyCode::Home => {
                let line = self.cursor.line;
                self.move_cursor_to(SelectionPoint::new(line, 0));
            }
            KeyCode::Char('$') | KeyCode::End => {
                let line = self.cursor.line;
                let end = self.line_len(line).saturating_sub(1);
                self.move_cursor_to(SelectionPoint::new(line, end));
            }
            KeyCode::Char(']') | KeyCode::PageDown => {
                return self.next_page().then_some(PageViewAction::PageChanged);
            }
            KeyCode::Char('[') | KeyCode::PageUp => {
                return self.previous_page().then_some(PageViewAction::PageChanged);
            }
            KeyCode::Char('g') => {
                return self.go_to_page(1).then_some(PageViewAction::PageChanged);
            }
            KeyCode::Char('G') => {
                let last = self.page_count();
                return self.go_to_page(last).then_some(PageViewAction::PageChanged);
            }
            KeyCode::Char('v') => self.toggle_visual_mode(),
            KeyCode::Esc => self.clear_selection(),
            KeyCode::Char('a') => return Some(PageViewAction::AskAi),
            KeyCode::Char('n') => return Some(PageViewAction::AddNote),
            KeyCode::Char('y') if self.has_selection() => {
                return Some(PageViewAction::CopySelection);
            }
            KeyCode::Enter => return Some(PageViewAction::OpenHighlight(self.cursor)),
            _ => {}
        }
        None
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> MouseOutcome {
        match mouse.kind {
            MouseEventKind::ScrollDown => {
                self.scroll_by(WHEEL_LINES as isize);
                MouseOutcome::Handled
            }
            MouseEventKind::ScrollUp => {
                self.scroll_by(-(WHEEL_LINES as isize));
                MouseOutcome::Handled
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(cell) = self.screen_to_cell(mouse.column, mouse.row) else {
                    return MouseOutcome::Ignored;
                };
                self.visual_anchor = None;
                self.cursor = cell;
                match self.mouse_tracker.detect_click_type(mouse.column, mouse.row) {
                    ClickType::Double => {
                        if let Some(layout) = self.layout.as_ref() {
                            self.selection.select_word_at(cell.line, cell.column, layout);
                        }
                    }
                    ClickType::Single => {
                        self.selection.start_selection(cell.line, cell.column);
                    }
                }
                MouseOutcome::Handled
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if !self.selection.is_selecting {
                    return MouseOutcome::Ignored;
                }
                if let Some(cell) = self.clamped_cell(mouse.column, mouse.row) {
                    // The cell under the pointer is part of the selection
                    self.selection.update_selection(cell.line, cell.column + 1);
                    self.cursor = cell;
                }
                MouseOutcome::Handled
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let was_selecting = self.selection.is_selecting;
                self.selection.end_selection();
                if self.selection.has_selection() {
                    MouseOutcome::Selected
                } else if was_selecting {
                    self.selection.clear_selection();
                    MouseOutcome::Clicked(self.cursor)
                } else {
                    MouseOutcome::Ignored
                }
            }
            _ => MouseOutcome::Ignored,
        }
    }

    pub fn move_cursor_to(&mut self, point: SelectionPoint) {
        self.cursor = point;
        self.clamp_cursor();
        self.keep_cursor_visible();
        if let Some(anchor) = self.visual_anchor {
            self.selection.set_inclusive(anchor, self.cursor);
        }
    }

    fn move_cursor(&mut self, lines: isize, columns: isize) {
        let line = self.cursor.line.saturating_add_signed(lines);
        let mut column = self.cursor.column;
        if columns != 0 {
            // Step by characters so wide ones are crossed in one move
            let cells = self.cells_of(line);
            let current = cell_index(&cells, column);
            let target = current
                .saturating_add_signed(columns)
                .min(cells.len().saturating_sub(1));
            column = cells.get(target).map_or(0, |(start, _)| *start);
        }
        self.move_cursor_to(SelectionPoint::new(line, column));
    }

    pub fn toggle_visual_mode(&mut self) {
        if self.visual_anchor.is_some() {
            self.clear_selection();
        } else {
            self.visual_anchor = Some(self.cursor);
            self.selection.set_inclusive(self.cursor, self.cursor);
        }
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max_scroll = self.line_count().saturating_sub(self.visible_height());
        self.scroll = self.scroll.saturating_add_signed(delta).min(max_scroll);
        // Drag the cursor along so it stays on screen
        let last_visible = self.scroll + self.visible_height() - 1;
        if self.cursor.line < self.scroll || self.cursor.line > last_visible {
            let line = self.cursor.line.clamp(self.scroll, last_visible);
            self.cursor.line = line;
            self.clamp_cursor();
        }
    }

    fn clamped_cell(&self, column: u16, row: u16) -> Option<SelectionPoint> {
        let area = self.content_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        let column = column.clamp(area.x, area.x + area.width - 1);
        let row = row.clamp(area.y, area.y + area.height - 1);
        self.screen_to_cell(column, row)
    }

    fn cells_of(&self, line: usize) -> Vec<(usize, char)> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.line(line))
            .map(DisplayLine::cells)
            .unwrap_or_default()
    }

    fn word_forward(&mut self) {
        let mut line = self.cursor.line;
        let mut cells = self.cells_of(line);
        let mut idx = cell_index(&cells, self.cursor.column);

        // Skip the rest of the current word, then whitespace
        while idx < cells.len() && !cells[idx].1.is_whitespace() {
            idx += 1;
        }
        loop {
            while idx < cells.len() && cells[idx].1.is_whitespace() {
                idx += 1;
            }
            if idx < cells.len() || line + 1 >= self.line_count() {
                break;
            }
            line += 1;
            cells = self.cells_of(line);
            idx = 0;
        }
        let column = column_of(&cells, idx);
        self.move_cursor_to(SelectionPoint::new(line, column));
    }

    fn word_backward(&mut self) {
        let mut line = self.cursor.line;
        let mut cells = self.cells_of(line);
        let mut idx = cell_index(&cells, self.cursor.column).min(cells.len());

        loop {
            while idx > 0 && cells[idx - 1].1.is_whitespace() {
                idx -= 1;
            }
            if idx > 0 || line == 0 {
                break;
            }
            line -= 1;
            cells = self.cells_of(line);
            idx = cells.len();
        }
        while idx > 0 && !cells[idx - 1].1.is_whitespace() {
            idx -= 1;
        }
        let column = column_of(&cells, idx);
        self.move_cursor_to(SelectionPoint::new(line, column));
    }
}

/// Index of the character covering `column`, or the character count past
/// the line end.
fn cell_index(cells: &[(usize, char)], column: usize) -> usize {
    cells
        .iter()
        .position(|(start, c)| column < start + c.width().unwrap_or(1))
        .unwrap_or(cells.len())
}

fn column_of(cells: &[(usize, char)], idx: usize) -> usize {
    match cells.get(idx) {
        Some((start, _)) => *start,
        None => cells
            .last()
            .map_or(0, |(start, c)| start + c.width().unwrap_or(1)),
    }
}
