pub mod ai_panel;
pub mod annotation_viewer;
pub mod help_popup;
pub mod input_field;
pub mod lesson_list;
pub mod notes_panel;
pub mod page_view;
pub mod selection_menu;
pub mod settings_popup;

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Rect of the given percentage size centered in `r`.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
