use crate::settings::{
    self, AiBackend, MAX_CLASS_LEVEL, MIN_CLASS_LEVEL, get_ai_backend, get_class_level,
    get_preferred_subject, is_sync_annotations,
};
use crate::theme::{Base16Palette, ThemeId, apply_theme_from_settings, current_theme_id};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

pub const SUBJECTS: &[&str] = &[
    "Social Science",
    "Science",
    "Mathematics",
    "History",
    "Geography",
    "English",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    Close,
    /// A value changed and was saved. `backend_changed` asks the shell to
    /// rebuild its AI service.
    SettingsChanged { backend_changed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsRow {
    ClassLevel,
    Subject,
    AiBackend,
    SyncAnnotations,
    Theme,
}

impl SettingsRow {
    const ALL: [SettingsRow; 5] = [
        SettingsRow::ClassLevel,
        SettingsRow::Subject,
        SettingsRow::AiBackend,
        SettingsRow::SyncAnnotations,
        SettingsRow::Theme,
    ];

    fn label(self) -> &'static str {
        match self {
            SettingsRow::ClassLevel => "Class level",
            SettingsRow::Subject => "Subject",
            SettingsRow::AiBackend => "AI backend",
            SettingsRow::SyncAnnotations => "Sync annotations",
            SettingsRow::Theme => "Theme",
        }
    }
}

pub struct SettingsPopup {
    selected: usize,
    last_popup_area: Option<Rect>,
}

impl Default for SettingsPopup {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsPopup {
    pub fn new() -> Self {
        Self {
            selected: 0,
            last_popup_area: None,
        }
    }

    pub fn selected_row(&self) -> SettingsRow {
        SettingsRow::ALL[self.selected]
    }

    pub fn is_outside_popup_area(&self, x: u16, y: u16) -> bool {
        if let Some(popup_area) = self.last_popup_area {
            x < popup_area.x
                || x >= popup_area.x + popup_area.width
                || y < popup_area.y
                || y >= popup_area.y + popup_area.height
        } else {
            true
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SettingsAction> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.selected = (self.selected + 1) % SettingsRow::ALL.len();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self
                    .selected
                    .checked_sub(1)
                    .unwrap_or(SettingsRow::ALL.len() - 1);
                None
            }
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter | KeyCode::Char(' ') => {
                self.adjust(true)
            }
            KeyCode::Char('h') | KeyCode::Left => self.adjust(false),
            KeyCode::Esc | KeyCode::Char(',') => Some(SettingsAction::Close),
            _ => None,
        }
    }

    fn adjust(&mut self, forward: bool) -> Option<SettingsAction> {
        let changed = |backend_changed| Some(SettingsAction::SettingsChanged { backend_changed });
        match self.selected_row() {
            SettingsRow::ClassLevel => {
                let level = get_class_level();
                let next = if forward {
                    level.saturating_add(1).min(MAX_CLASS_LEVEL)
                } else {
                    level.saturating_sub(1).max(MIN_CLASS_LEVEL)
                };
                if next == level {
                    return None;
                }
                settings::set_class_level(next);
                changed(false)
            }
            SettingsRow::Subject => {
                let current = get_preferred_subject();
                let idx = SUBJECTS.iter().position(|s| *s == current);
                let next = match (idx, forward) {
                    (None, _) => 0,
                    (Some(i), true) => (i + 1) % SUBJECTS.len(),
                    (Some(i), false) => i.checked_sub(1).unwrap_or(SUBJECTS.len() - 1),
                };
                settings::set_preferred_subject(SUBJECTS[next]);
                changed(false)
            }
            SettingsRow::AiBackend => {
                settings::set_ai_backend(get_ai_backend().toggled());
                changed(true)
            }
            SettingsRow::SyncAnnotations => {
                settings::set_sync_annotations(!is_sync_annotations());
                changed(false)
            }
            SettingsRow::Theme => {
                let themes = ThemeId::all();
                let idx = themes
                    .iter()
                    .position(|t| *t == current_theme_id())
                    .unwrap_or(0);
                let next = if forward {
                    (idx + 1) % themes.len()
                } else {
                    idx.checked_sub(1).unwrap_or(themes.len() - 1)
                };
                settings::set_theme_name(themes[next].name());
                apply_theme_from_settings();
                changed(false)
            }
        }
    }

    fn value_text(row: SettingsRow) -> String {
        match row {
            SettingsRow::ClassLevel => format!("Class {}", get_class_level()),
            SettingsRow::Subject => get_preferred_subject(),
            SettingsRow::AiBackend => match get_ai_backend() {
                AiBackend::Simulated => "Simulated".to_string(),
                AiBackend::Remote => format!("Remote ({})", settings::get_api_url()),
            },
            SettingsRow::SyncAnnotations => {
                if is_sync_annotations() { "● On" } else { "○ Off" }.to_string()
            }
            SettingsRow::Theme => current_theme_id().name().to_string(),
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let popup_area = super::centered_rect(60, 50, area);
        self.last_popup_area = Some(popup_area);

        f.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(" Settings ")
            .title_bottom(Line::from(" j/k navigate  h/l change  Esc close ").right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.base_0d))
            .style(Style::default().bg(palette.base_00));

        let inner = block.inner(popup_area);
        f.render_widget(block, popup_area);

        let padded = Rect {
            x: inner.x + 2,
            y: inner.y + 1,
            width: inner.width.saturating_sub(4),
            height: inner.height.saturating_sub(2),
        };

        let label_width = SettingsRow::ALL
            .iter()
            .map(|row| row.label().len())
            .max()
            .unwrap_or(0)
            + 2;

        let mut lines = Vec::new();
        for (idx, row) in SettingsRow::ALL.iter().enumerate() {
            let is_selected = idx == self.selected;
            let prefix = if is_selected { "» " } else { "  " };
            let value_style = if is_selected {
                Style::default()
                    .fg(palette.base_06)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.base_05)
            };
            lines.push(Line::from(vec![
                Span::styled(
                    prefix,
                    Style::default()
                        .fg(palette.base_0a)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("{:<label_width$}", row.label()),
                    Style::default().fg(palette.base_04),
                ),
                Span::styled(Self::value_text(*row), value_style),
            ]));
            lines.push(Line::default());
        }

        if get_ai_backend() == AiBackend::Remote {
            lines.push(Line::from(vec![
                Span::styled("ⓘ ", Style::default().fg(palette.base_03)),
                Span::styled(
                    "Remote explanations need the lesson backend running",
                    Style::default().fg(palette.base_03),
                ),
            ]));
        }

        f.render_widget(Paragraph::new(lines), padded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use serial_test::serial;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn fresh_settings() {
        settings::disable_persistence();
        settings::set_class_level(6);
        settings::set_preferred_subject("Social Science");
        settings::set_ai_backend(AiBackend::Simulated);
        settings::set_sync_annotations(false);
    }

    #[test]
    #[serial]
    fn class_level_stays_in_range() {
        fresh_settings();
        let mut popup = SettingsPopup::new();
        assert_eq!(popup.selected_row(), SettingsRow::ClassLevel);

        for _ in 0..10 {
            popup.handle_key(key(KeyCode::Char('l')));
        }
        assert_eq!(get_class_level(), MAX_CLASS_LEVEL);
        assert_eq!(popup.handle_key(key(KeyCode::Char('l'))), None);

        for _ in 0..10 {
            popup.handle_key(key(KeyCode::Char('h')));
        }
        assert_eq!(get_class_level(), MIN_CLASS_LEVEL);
    }

    #[test]
    #[serial]
    fn subject_cycles_through_list() {
        fresh_settings();
        let mut popup = SettingsPopup::new();
        popup.handle_key(key(KeyCode::Char('j')));
        assert_eq!(popup.selected_row(), SettingsRow::Subject);

        popup.handle_key(key(KeyCode::Enter));
        assert_eq!(get_preferred_subject(), "Science");
        popup.handle_key(key(KeyCode::Char('h')));
        popup.handle_key(key(KeyCode::Char('h')));
        assert_eq!(get_preferred_subject(), "English");
    }

    #[test]
    #[serial]
    fn backend_toggle_requests_rebuild() {
        fresh_settings();
        let mut popup = SettingsPopup::new();
        popup.handle_key(key(KeyCode::Char('j')));
        popup.handle_key(key(KeyCode::Char('j')));

        assert_eq!(
            popup.handle_key(key(KeyCode::Enter)),
            Some(SettingsAction::SettingsChanged {
                backend_changed: true
            })
        );
        assert_eq!(get_ai_backend(), AiBackend::Remote);
        settings::set_ai_backend(AiBackend::Simulated);
    }

    #[test]
    #[serial]
    fn navigation_wraps_and_escape_closes() {
        fresh_settings();
        let mut popup = SettingsPopup::new();
        popup.handle_key(key(KeyCode::Char('k')));
        assert_eq!(popup.selected_row(), SettingsRow::Theme);
        assert_eq!(
            popup.handle_key(key(KeyCode::Esc)),
            Some(SettingsAction::Close)
        );
    }
}
