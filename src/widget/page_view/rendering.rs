use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use unicode_width::UnicodeWidthChar;

use super::PageView;
use crate::annotations::Annotation;
use crate::overlay::{HighlightOverlay, Placement};
use crate::theme::Base16Palette;

impl PageView {
    /// Draws the page with its highlights and returns the overlay used, so
    /// clicks can be matched against it.
    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        is_focused: bool,
        palette: &Base16Palette,
        annotations: &[Annotation],
    ) -> HighlightOverlay {
        let (text_color, border_color, _bg_color) = palette.get_panel_colors(is_focused);

        let mode = if self.is_visual_mode() { " VISUAL " } else { "" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.title))
            .title_bottom(
                Line::from(format!(
                    "{mode} Page {}/{} ",
                    self.current_page,
                    self.page_count()
                ))
                .right_aligned(),
            )
            .border_style(Style::default().fg(border_color))
            .style(Style::default().bg(palette.base_00));

        let inner = block.inner(area);
        f.render_widget(block, area);

        // One column of padding on each side
        let text_area = Rect {
            x: inner.x + 1,
            width: inner.width.saturating_sub(2),
            ..inner
        };
        self.set_content_area(text_area);

        if let Some(error) = &self.load_error {
            let message = Paragraph::new(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(palette.base_08),
            )));
            f.render_widget(message, text_area);
            return HighlightOverlay::default();
        }

        let Some(layout) = self.layout.as_ref() else {
            return HighlightOverlay::default();
        };
        let overlay = HighlightOverlay::build(layout, annotations);

        let base = Style::default().fg(text_color);
        let selected = Style::default().bg(palette.base_02).fg(palette.base_07);
        let cursor_style = Style::default().add_modifier(Modifier::REVERSED);

        let lines: Vec<Line> = layout
            .lines()
            .iter()
            .enumerate()
            .skip(self.scroll)
            .take(usize::from(text_area.height))
            .map(|(line_idx, display)| {
                let cursor_here = is_focused && self.cursor.line == line_idx;
                let mut text = display.text.clone();
                let width = display.width();
                if cursor_here && width <= self.cursor.column {
                    text.extend(std::iter::repeat_n(' ', self.cursor.column + 1 - width));
                }

                let mut spans: Vec<Span> = Vec::new();
                let mut run = String::new();
                let mut run_style = base;
                let mut col = 0;
                for c in text.chars() {
                    let char_width = c.width().unwrap_or(0);
                    if char_width == 0 {
                        // Marks stay in the run of the character they follow
                        run.push(c);
                        continue;
                    }
                    let mut style = match overlay.kind_at(line_idx, col) {
                        Some(kind) => Style::default()
                            .fg(palette.base_00)
                            .bg(palette.annotation_color(kind)),
                        None => base,
                    };
                    if self.selection.is_selected(line_idx, col) {
                        style = selected;
                    }
                    if cursor_here && col == self.cursor.column {
                        style = style.patch(cursor_style);
                    }
                    if style != run_style && !run.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut run), run_style));
                    }
                    run_style = style;
                    run.push(c);
                    col += char_width;
                }
                if !run.is_empty() {
                    spans.push(Span::styled(run, run_style));
                }
                Line::from(spans)
            })
            .collect();

        f.render_widget(Paragraph::new(lines), text_area);
        self.render_markers(f, &overlay, palette);
        overlay
    }

    /// Annotations whose passage is no longer on the page keep a dot at the
    /// screen cell they were created at.
    fn render_markers(&self, f: &mut Frame, overlay: &HighlightOverlay, palette: &Base16Palette) {
        let area = self.content_area;
        for highlight in overlay.highlights() {
            let Placement::Marker(position) = highlight.placement else {
                continue;
            };
            let inside = position.x >= area.x
                && position.x < area.x + area.width
                && position.y >= area.y
                && position.y < area.y + area.height;
            if !inside {
                continue;
            }
            let marker = Paragraph::new(Span::styled(
                "●",
                Style::default()
                    .fg(palette.annotation_color(highlight.kind))
                    .add_modifier(Modifier::BOLD),
            ));
            f.render_widget(marker, Rect::new(position.x, position.y, 1, 1));
        }
    }
}
