use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::info;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::annotations::{AnnotationError, AnnotationId, AnnotationStore, NewNote};
use crate::selection::SelectionInfo;
use crate::theme::Base16Palette;
use crate::widget::centered_rect;
use crate::widget::input_field::InputField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesPanelAction {
    Save,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Heading,
    Content,
}

/// Collects a heading and optional content for the selected passage.
pub struct NotesPanel {
    selection: Option<SelectionInfo>,
    lesson_id: u32,
    page_number: usize,
    heading: InputField,
    content: InputField,
    focus: NoteField,
}

impl NotesPanel {
    pub fn new(selection: Option<SelectionInfo>, lesson_id: u32, page_number: usize) -> Self {
        Self {
            selection,
            lesson_id,
            page_number,
            heading: InputField::single_line(),
            content: InputField::multi_line(),
            focus: NoteField::Heading,
        }
    }

    pub fn selection(&self) -> Option<&SelectionInfo> {
        self.selection.as_ref()
    }

    pub fn focus(&self) -> NoteField {
        self.focus
    }

    pub fn heading(&self) -> &str {
        self.heading.text()
    }

    pub fn content(&self) -> &str {
        self.content.text()
    }

    pub fn set_heading(&mut self, heading: &str) {
        self.heading.set_text(heading);
    }

    pub fn set_content(&mut self, content: &str) {
        self.content.set_text(content);
    }

    /// Saving needs selected text and a heading that is not blank.
    pub fn can_save(&self) -> bool {
        let has_text = self
            .selection
            .as_ref()
            .is_some_and(|s| !s.text.trim().is_empty());
        has_text && !self.heading.text().trim().is_empty()
    }

    pub fn save(
        &mut self,
        store: &mut AnnotationStore,
    ) -> Result<Option<AnnotationId>, AnnotationError> {
        if !self.can_save() {
            return Ok(None);
        }
        let Some(selection) = self.selection.take() else {
            return Ok(None);
        };

        let result = store.add_note(NewNote {
            lesson_id: self.lesson_id,
            page_number: self.page_number,
            selection: selection.clone(),
            heading: self.heading.text().to_string(),
            content: self.content.text().to_string(),
        });
        match result {
            Ok(id) => {
                info!(
                    "Saved note {id} on lesson {} page {}",
                    self.lesson_id, self.page_number
                );
                self.heading.clear();
                self.content.clear();
                Ok(Some(id))
            }
            Err(e) => {
                // Keep the draft so the user can retry
                self.selection = Some(selection);
                Err(e)
            }
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            NoteField::Heading => NoteField::Content,
            NoteField::Content => NoteField::Heading,
        };
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<NotesPanelAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            return self.can_save().then_some(NotesPanelAction::Save);
        }

        match key.code {
            KeyCode::Esc => return Some(NotesPanelAction::Cancel),
            KeyCode::Tab | KeyCode::BackTab => self.toggle_focus(),
            KeyCode::Enter if self.focus == NoteField::Heading => {
                self.focus = NoteField::Content;
            }
            _ => {
                let field = match self.focus {
                    NoteField::Heading => &mut self.heading,
                    NoteField::Content => &mut self.content,
                };
                field.handle_key(key);
            }
        }
        None
    }

    pub fn render(&self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let popup_area = centered_rect(60, 70, area);
        f.render_widget(Clear, popup_area);

        let save_style = if self.can_save() {
            Style::default().fg(palette.base_0b)
        } else {
            Style::default().fg(palette.base_03)
        };
        let hints = Line::from(vec![
            Span::raw(" Tab switch field  "),
            Span::styled("Ctrl+s save", save_style),
            Span::raw("  Esc cancel "),
        ])
        .right_aligned();

        let block = Block::default()
            .title(" Add Note ")
            .title_bottom(hints)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.base_0b))
            .style(Style::default().bg(palette.base_00));
        let inner = block.inner(popup_area);
        f.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Min(3),
            ])
            .split(inner);

        let quote = self.selection.as_ref().map_or("", |s| s.text.as_str());
        let selected = Paragraph::new(vec![
            Line::from(Span::styled(
                "Selected text",
                Style::default().fg(palette.base_04),
            )),
            Line::from(Span::styled(
                format!("\"{quote}\""),
                Style::default()
                    .fg(palette.base_05)
                    .add_modifier(Modifier::ITALIC),
            )),
        ])
        .wrap(Wrap { trim: true });
        f.render_widget(selected, chunks[0]);

        self.render_field(f, chunks[1], palette, " Heading ", &self.heading, NoteField::Heading);
        self.render_field(
            f,
            chunks[2],
            palette,
            " Content (optional) ",
            &self.content,
            NoteField::Content,
        );
    }

    fn render_field(
        &self,
        f: &mut Frame,
        area: Rect,
        palette: &Base16Palette,
        title: &str,
        field: &InputField,
        which: NoteField,
    ) {
        let focused = self.focus == which;
        let border = if focused {
            palette.base_0d
        } else {
            palette.base_03
        };
        let lines = field.styled_lines(
            Style::default().fg(palette.base_06),
            Style::default().fg(palette.base_00).bg(palette.base_06),
            focused,
        );
        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(title.to_string())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border)),
            );
        f.render_widget(paragraph, area);
    }
}
