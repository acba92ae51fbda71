use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::selection::ScreenPosition;
use crate::theme::Base16Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMenuAction {
    OpenAi,
    OpenNote,
    Copy,
    Dismiss,
}

const ENTRIES: [(char, &str, SelectionMenuAction); 3] = [
    ('a', "Ask AI", SelectionMenuAction::OpenAi),
    ('n', "Add note", SelectionMenuAction::OpenNote),
    ('y', "Copy", SelectionMenuAction::Copy),
];

const MENU_WIDTH: u16 = 16;
const MENU_HEIGHT: u16 = ENTRIES.len() as u16 + 2;

/// Small popup next to a fresh selection.
pub struct SelectionMenu {
    anchor: ScreenPosition,
    selected: usize,
    last_area: Option<Rect>,
}

impl SelectionMenu {
    pub fn new(anchor: ScreenPosition) -> Self {
        Self {
            anchor,
            selected: 0,
            last_area: None,
        }
    }

    pub fn anchor(&self) -> ScreenPosition {
        self.anchor
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SelectionMenuAction> {
        match key.code {
            KeyCode::Esc => Some(SelectionMenuAction::Dismiss),
            KeyCode::Char('j') | KeyCode::Down => {
                self.selected = (self.selected + 1).min(ENTRIES.len() - 1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Enter => Some(ENTRIES[self.selected].2),
            KeyCode::Char(c) => ENTRIES
                .iter()
                .find(|(shortcut, _, _)| *shortcut == c)
                .map(|(_, _, action)| *action),
            _ => None,
        }
    }

    /// Entry under a mouse click, `Dismiss` for clicks outside the menu.
    pub fn handle_click(&self, column: u16, row: u16) -> SelectionMenuAction {
        let Some(area) = self.last_area else {
            return SelectionMenuAction::Dismiss;
        };
        let inside = column >= area.x
            && column < area.x + area.width
            && row > area.y
            && row < area.y + area.height - 1;
        if !inside {
            return SelectionMenuAction::Dismiss;
        }
        let idx = usize::from(row - area.y - 1);
        ENTRIES
            .get(idx)
            .map_or(SelectionMenuAction::Dismiss, |entry| entry.2)
    }

    /// Places the menu just below the anchor, kept inside `bounds`.
    pub fn menu_area(&self, bounds: Rect) -> Rect {
        let width = MENU_WIDTH.min(bounds.width);
        let height = MENU_HEIGHT.min(bounds.height);
        let max_x = bounds.x + bounds.width - width;
        let max_y = bounds.y + bounds.height - height;

        let x = self.anchor.x.clamp(bounds.x, max_x);
        let below = self.anchor.y.saturating_add(1);
        let y = if below <= max_y {
            below.max(bounds.y)
        } else {
            self.anchor.y.saturating_sub(height).clamp(bounds.y, max_y)
        };
        Rect::new(x, y, width, height)
    }

    pub fn render(&mut self, f: &mut Frame, bounds: Rect, palette: &Base16Palette) {
        if bounds.width == 0 || bounds.height == 0 {
            return;
        }
        let area = self.menu_area(bounds);
        self.last_area = Some(area);
        f.render_widget(Clear, area);

        let lines: Vec<Line> = ENTRIES
            .iter()
            .enumerate()
            .map(|(idx, (shortcut, label, action))| {
                let color = match action {
                    SelectionMenuAction::OpenAi => palette.base_0e,
                    SelectionMenuAction::OpenNote => palette.base_0b,
                    _ => palette.base_05,
                };
                let style = if idx == self.selected {
                    Style::default()
                        .fg(palette.base_00)
                        .bg(color)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(color)
                };
                Line::from(vec![
                    Span::styled(format!(" {shortcut} "), style.add_modifier(Modifier::BOLD)),
                    Span::styled(format!("{label:<width$}", width = 10), style),
                ])
            })
            .collect();

        let menu = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.base_03))
                .style(Style::default().bg(palette.base_01)),
        );
        f.render_widget(menu, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn shortcuts_and_navigation() {
        let mut menu = SelectionMenu::new(ScreenPosition::new(10, 5));
        assert_eq!(
            menu.handle_key(key(KeyCode::Char('n'))),
            Some(SelectionMenuAction::OpenNote)
        );
        menu.handle_key(key(KeyCode::Down));
        assert_eq!(
            menu.handle_key(key(KeyCode::Enter)),
            Some(SelectionMenuAction::OpenNote)
        );
        assert_eq!(
            menu.handle_key(key(KeyCode::Esc)),
            Some(SelectionMenuAction::Dismiss)
        );
    }

    #[test]
    fn menu_stays_inside_bounds() {
        let bounds = Rect::new(0, 0, 40, 12);

        let menu = SelectionMenu::new(ScreenPosition::new(38, 11));
        let area = menu.menu_area(bounds);
        assert!(area.x + area.width <= 40);
        assert!(area.y + area.height <= 12);
        assert!(area.y + area.height <= 11);

        let menu = SelectionMenu::new(ScreenPosition::new(3, 2));
        assert_eq!(menu.menu_area(bounds), Rect::new(3, 3, MENU_WIDTH, MENU_HEIGHT));
    }

    #[test]
    fn clicks_map_to_entries() {
        let mut menu = SelectionMenu::new(ScreenPosition::new(3, 2));
        menu.last_area = Some(menu.menu_area(Rect::new(0, 0, 40, 12)));

        assert_eq!(menu.handle_click(5, 4), SelectionMenuAction::OpenAi);
        assert_eq!(menu.handle_click(5, 5), SelectionMenuAction::OpenNote);
        assert_eq!(menu.handle_click(30, 10), SelectionMenuAction::Dismiss);
    }
}
