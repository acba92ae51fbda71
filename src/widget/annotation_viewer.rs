use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::annotations::{Annotation, AnnotationBody, AnnotationId, AnnotationStore};
use crate::theme::Base16Palette;
use crate::widget::centered_rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationViewerAction {
    Close,
    Delete(AnnotationId),
    Copy(AnnotationId),
}

/// Lists the annotations of one page and shows the selected one in full.
pub struct AnnotationViewer {
    lesson_id: u32,
    page_number: usize,
    ids: Vec<AnnotationId>,
    list_state: ListState,
}

impl AnnotationViewer {
    pub fn new(
        store: &AnnotationStore,
        lesson_id: u32,
        page_number: usize,
        focus: Option<AnnotationId>,
    ) -> Self {
        let mut viewer = Self {
            lesson_id,
            page_number,
            ids: Vec::new(),
            list_state: ListState::default(),
        };
        viewer.refresh(store);
        if let Some(idx) = focus.and_then(|id| viewer.ids.iter().position(|x| *x == id)) {
            viewer.list_state.select(Some(idx));
        }
        viewer
    }

    /// Re-reads the page after the store changed, keeping the selection in
    /// range.
    pub fn refresh(&mut self, store: &AnnotationStore) {
        self.ids = store
            .annotations_by_page(self.lesson_id, self.page_number)
            .iter()
            .map(|a| a.id)
            .collect();
        let selected = match self.list_state.selected() {
            _ if self.ids.is_empty() => None,
            Some(idx) => Some(idx.min(self.ids.len() - 1)),
            None => Some(0),
        };
        self.list_state.select(selected);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn selected_id(&self) -> Option<AnnotationId> {
        self.list_state.selected().and_then(|idx| self.ids.get(idx).copied())
    }

    fn move_selection(&mut self, forward: bool) {
        if self.ids.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0);
        let next = if forward {
            (current + 1).min(self.ids.len() - 1)
        } else {
            current.saturating_sub(1)
        };
        self.list_state.select(Some(next));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AnnotationViewerAction> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('H') => {
                Some(AnnotationViewerAction::Close)
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(true);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(false);
                None
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                self.selected_id().map(AnnotationViewerAction::Delete)
            }
            KeyCode::Char('y') => self.selected_id().map(AnnotationViewerAction::Copy),
            _ => None,
        }
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        store: &AnnotationStore,
        palette: &Base16Palette,
    ) {
        let popup_area = centered_rect(80, 70, area);
        f.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!(" Annotations · page {} ", self.page_number))
            .title_bottom(Line::from(" j/k select  y copy  d delete  Esc close ").right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.base_0c))
            .style(Style::default().bg(palette.base_00));
        let inner = block.inner(popup_area);
        f.render_widget(block, popup_area);

        if self.ids.is_empty() {
            let empty = Paragraph::new(Line::from(Span::styled(
                "No annotations on this page yet. Select text and press n or a.",
                Style::default().fg(palette.base_03),
            )));
            f.render_widget(empty, inner);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(inner);

        let items: Vec<ListItem> = self
            .ids
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|annotation| {
                let color = palette.annotation_color(annotation.kind());
                ListItem::new(Line::from(vec![
                    Span::styled("▍", Style::default().fg(color)),
                    Span::styled(
                        annotation.title(),
                        Style::default().fg(palette.base_05),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::RIGHT))
            .highlight_style(
                Style::default()
                    .bg(palette.base_02)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, chunks[0], &mut self.list_state);

        if let Some(annotation) = self.selected_id().and_then(|id| store.get(id)) {
            let details = Paragraph::new(detail_lines(annotation, palette))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::NONE));
            let detail_area = Rect {
                x: chunks[1].x + 1,
                width: chunks[1].width.saturating_sub(1),
                ..chunks[1]
            };
            f.render_widget(details, detail_area);
        }
    }
}

fn detail_lines(annotation: &Annotation, palette: &Base16Palette) -> Vec<Line<'static>> {
    let label = Style::default().fg(palette.base_04);
    let text = Style::default().fg(palette.base_06);
    let accent = Style::default()
        .fg(palette.annotation_color(annotation.kind()))
        .add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(annotation.kind().label().to_string(), accent),
            Span::styled(
                format!(
                    "  {}",
                    annotation
                        .created_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                ),
                label,
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Highlighted", label)),
        Line::from(Span::styled(
            format!("\"{}\"", annotation.source_text),
            text.add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
    ];

    match &annotation.body {
        AnnotationBody::Note { heading, content } => {
            lines.push(Line::from(Span::styled(heading.clone(), accent)));
            lines.extend(
                content
                    .lines()
                    .map(|line| Line::from(Span::styled(line.to_string(), text))),
            );
        }
        AnnotationBody::Ai { action, response } => {
            lines.push(Line::from(Span::styled(action.label().to_string(), accent)));
            lines.extend(
                response
                    .lines()
                    .map(|line| Line::from(Span::styled(line.to_string(), text))),
            );
        }
    }
    lines
}

/// Plain-text form of an annotation, used for the clipboard.
pub fn annotation_to_text(annotation: &Annotation) -> String {
    match &annotation.body {
        AnnotationBody::Note { heading, content } if content.is_empty() => {
            format!("{heading}\n\n> {}", annotation.source_text)
        }
        AnnotationBody::Note { heading, content } => {
            format!("{heading}\n\n> {}\n\n{content}", annotation.source_text)
        }
        AnnotationBody::Ai { response, .. } => {
            format!("> {}\n\n{response}", annotation.source_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::NewNote;
    use crate::selection::{ScreenPosition, SelectionInfo};
    use crossterm::event::KeyModifiers;

    fn add(store: &mut AnnotationStore, heading: &str) -> AnnotationId {
        store
            .add_note(NewNote {
                lesson_id: 1,
                page_number: 1,
                selection: SelectionInfo {
                    text: "text".to_string(),
                    position: ScreenPosition::default(),
                    source_page: 1,
                    range: None,
                },
                heading: heading.to_string(),
                content: String::new(),
            })
            .unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn focus_selects_clicked_annotation() {
        let mut store = AnnotationStore::in_memory();
        add(&mut store, "first");
        let second = add(&mut store, "second");

        let viewer = AnnotationViewer::new(&store, 1, 1, Some(second));
        assert_eq!(viewer.selected_id(), Some(second));
    }

    #[test]
    fn delete_then_refresh_keeps_selection_in_range() {
        let mut store = AnnotationStore::in_memory();
        add(&mut store, "first");
        let second = add(&mut store, "second");

        let mut viewer = AnnotationViewer::new(&store, 1, 1, Some(second));
        let action = viewer.handle_key(key(KeyCode::Char('d')));
        assert_eq!(action, Some(AnnotationViewerAction::Delete(second)));

        store.delete(second).unwrap();
        viewer.refresh(&store);
        assert_eq!(viewer.len(), 1);
        let remaining = viewer.selected_id().and_then(|id| store.get(id)).unwrap();
        assert_eq!(remaining.title(), "first");
    }

    #[test]
    fn empty_page_has_nothing_to_delete() {
        let store = AnnotationStore::in_memory();
        let mut viewer = AnnotationViewer::new(&store, 1, 4, None);
        assert!(viewer.is_empty());
        assert_eq!(viewer.handle_key(key(KeyCode::Char('d'))), None);
    }

    #[test]
    fn clipboard_text_quotes_source() {
        let mut store = AnnotationStore::in_memory();
        let id = add(&mut store, "Heading");
        let text = annotation_to_text(store.get(id).unwrap());
        assert_eq!(text, "Heading\n\n> text");
    }
}
