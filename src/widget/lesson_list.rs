use crate::lessons::{LessonCatalog, LessonRecord};
use crate::theme::Base16Palette;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub struct LessonList {
    pub selected: usize,
    pub list_state: ListState,
    lessons: Vec<LessonRecord>,
}

impl LessonList {
    pub fn new(catalog: &LessonCatalog) -> Self {
        let lessons = catalog.lessons().to_vec();
        let mut list_state = ListState::default();
        if !lessons.is_empty() {
            list_state.select(Some(0));
        }

        Self {
            selected: 0,
            list_state,
            lessons,
        }
    }

    pub fn move_selection_down(&mut self) {
        if self.selected < self.lessons.len().saturating_sub(1) {
            self.selected += 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn move_selection_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn set_selection_to_index(&mut self, index: usize) {
        if index < self.lessons.len() {
            self.selected = index;
            self.list_state.select(Some(index));
        }
    }

    pub fn selected_lesson(&self) -> Option<&LessonRecord> {
        self.lessons.get(self.selected)
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// Selects the row under a click. Returns true if a lesson was hit.
    pub fn handle_mouse_click(&mut self, y: u16, area: Rect) -> bool {
        // One border row at top and bottom
        if y > area.y && y < area.y + area.height.saturating_sub(1) {
            let new_index = self.list_state.offset() + usize::from(y - area.y - 1);
            if new_index < self.lessons.len() {
                self.set_selection_to_index(new_index);
                return true;
            }
        }
        false
    }

    /// `note_counts` holds the annotation count of each lesson, in catalog
    /// order.
    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        is_focused: bool,
        palette: &Base16Palette,
        current_lesson: Option<u32>,
        note_counts: &[usize],
    ) {
        let (text_color, border_color, _bg_color) = palette.get_panel_colors(is_focused);
        let (selection_bg, selection_fg) = palette.get_selection_colors(is_focused);
        // Borders and the lesson number column
        let title_room = usize::from(area.width).saturating_sub(2 + 3);

        let items: Vec<ListItem> = self
            .lessons
            .iter()
            .enumerate()
            .map(|(idx, lesson)| {
                let style = if Some(lesson.id) == current_lesson {
                    Style::default()
                        .fg(palette.base_08)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(text_color)
                };
                let count_label = note_counts
                    .get(idx)
                    .filter(|c| **c > 0)
                    .map(|count| format!(" [{count}]"));
                let count_width = count_label.as_deref().map_or(0, UnicodeWidthStr::width);
                let mut spans = vec![
                    Span::styled(
                        format!("{:>2} ", lesson.number),
                        Style::default().fg(palette.base_03),
                    ),
                    Span::styled(
                        truncate_to_width(&lesson.title, title_room.saturating_sub(count_width)),
                        style,
                    ),
                ];
                if let Some(label) = count_label {
                    spans.push(Span::styled(label, Style::default().fg(palette.base_0b)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Lessons ")
                    .border_style(Style::default().fg(border_color))
                    .style(Style::default().bg(palette.base_00)),
            )
            .highlight_style(Style::default().bg(selection_bg).fg(selection_fg))
            .style(Style::default().bg(palette.base_00));

        f.render_stateful_widget(list, area, &mut self.list_state);
    }
}

/// Cuts `text` to at most `max_width` terminal cells, marking the cut with
/// an ellipsis.
fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut result = String::new();
    let mut width = 0;
    for c in text.chars() {
        let char_width = c.width().unwrap_or(0);
        if width + char_width > max_width - 1 {
            break;
        }
        result.push(c);
        width += char_width;
    }
    result.push('…');
    result
}
