//! Drawing and key handling for the AI explanation panel

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::ai::{AiAction, AiPanel, AiPhase};
use crate::theme::Base16Palette;
use crate::widget::centered_rect;

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPanelAction {
    Choose(AiAction),
    Regenerate,
    ChangeAction,
    Save,
    Copy,
    Close,
}

pub fn handle_key(panel: &mut AiPanel, key: KeyEvent) -> Option<AiPanelAction> {
    if key.code == KeyCode::Esc {
        return Some(AiPanelAction::Close);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match panel.phase() {
        AiPhase::Idle => match key.code {
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                Some(AiPanelAction::Choose(AiAction::ALL[idx]))
            }
            KeyCode::Char('j') | KeyCode::Down => {
                panel.highlight_next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                panel.highlight_previous();
                None
            }
            KeyCode::Enter => Some(AiPanelAction::Choose(panel.highlighted_action())),
            _ => None,
        },
        AiPhase::ActionChosen { .. } => match key.code {
            KeyCode::Char('r') | KeyCode::Enter => Some(AiPanelAction::Regenerate),
            KeyCode::Char('c') => Some(AiPanelAction::ChangeAction),
            _ => None,
        },
        AiPhase::Processing { .. } => match key.code {
            KeyCode::Char('c') => Some(AiPanelAction::ChangeAction),
            _ => None,
        },
        AiPhase::ResponseReady { .. } => match key.code {
            KeyCode::Char('s') => panel.can_save().then_some(AiPanelAction::Save),
            KeyCode::Char('r') if !ctrl => Some(AiPanelAction::Regenerate),
            KeyCode::Char('c') => Some(AiPanelAction::ChangeAction),
            KeyCode::Char('y') => Some(AiPanelAction::Copy),
            _ => None,
        },
    }
}

pub fn render(f: &mut Frame, area: Rect, panel: &AiPanel, palette: &Base16Palette, tick: usize) {
    let popup_area = centered_rect(64, 75, area);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" AI Assistant ")
        .title_bottom(Line::from(footer_hints(panel)).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.base_0e))
        .style(Style::default().bg(palette.base_00));
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(inner);

    let context = panel.context();
    let selected = Paragraph::new(vec![
        Line::from(Span::styled(
            format!(
                "Class {} · {} · Chapter {}",
                context.class_level, context.subject, context.chapter
            ),
            Style::default().fg(palette.base_04),
        )),
        Line::from(Span::styled(
            format!("\"{}\"", panel.selected_text()),
            Style::default()
                .fg(palette.base_05)
                .add_modifier(Modifier::ITALIC),
        )),
    ])
    .wrap(Wrap { trim: true });
    f.render_widget(selected, chunks[0]);

    let body: Vec<Line> = match panel.phase() {
        AiPhase::Idle => action_lines(panel, palette),
        AiPhase::ActionChosen { action } => {
            let mut lines = vec![Line::from(Span::styled(
                format!("{} failed", action.label()),
                Style::default()
                    .fg(palette.base_08)
                    .add_modifier(Modifier::BOLD),
            ))];
            if let Some(error) = panel.last_error() {
                lines.push(Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(palette.base_05),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Press r to try again or c to pick another action",
                Style::default().fg(palette.base_04),
            )));
            lines
        }
        AiPhase::Processing { action, .. } => vec![Line::from(vec![
            Span::styled(
                SPINNER[tick % SPINNER.len()],
                Style::default().fg(palette.base_0e),
            ),
            Span::styled(
                format!(" Working on {}...", action.label().to_lowercase()),
                Style::default().fg(palette.base_05),
            ),
        ])],
        AiPhase::ResponseReady { action, response } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    action.label().to_string(),
                    Style::default()
                        .fg(palette.base_0e)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            lines.extend(response.lines().map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(palette.base_06),
                ))
            }));
            lines
        }
    };

    f.render_widget(Paragraph::new(body).wrap(Wrap { trim: false }), chunks[1]);
}

fn action_lines(panel: &AiPanel, palette: &Base16Palette) -> Vec<Line<'static>> {
    let highlighted = panel.highlighted_action();
    AiAction::ALL
        .iter()
        .enumerate()
        .map(|(idx, action)| {
            let (fg, bg) = if *action == highlighted {
                (palette.base_00, palette.base_0e)
            } else {
                (palette.base_05, palette.base_00)
            };
            Line::from(vec![
                Span::styled(
                    format!(" {} {:<9}", idx + 1, action.label()),
                    Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", action.description()),
                    Style::default().fg(palette.base_04),
                ),
            ])
        })
        .collect()
}

fn footer_hints(panel: &AiPanel) -> &'static str {
    match panel.phase() {
        AiPhase::Idle => " 1-4/Enter choose  j/k move  Esc close ",
        AiPhase::ActionChosen { .. } => " r retry  c change action  Esc close ",
        AiPhase::Processing { .. } => " c change action  Esc cancel ",
        AiPhase::ResponseReady { .. } => {
            " s save  r regenerate  c change action  y copy  Esc close "
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiCompletion, AiContext, AiRequester, GenerationRequest, RequestId};
    use crate::selection::{ScreenPosition, SelectionInfo};

    struct CountingRequester(u64);

    impl AiRequester for CountingRequester {
        fn submit(&mut self, _request: GenerationRequest) -> RequestId {
            self.0 += 1;
            RequestId::new(self.0)
        }

        fn cancel(&mut self, _id: RequestId) {}
    }

    fn panel() -> AiPanel {
        AiPanel::new(
            Some(SelectionInfo {
                text: "T".to_string(),
                position: ScreenPosition::default(),
                source_page: 1,
                range: None,
            }),
            1,
            1,
            AiContext {
                chapter: 1,
                class_level: 6,
                subject: "Science".to_string(),
            },
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn number_keys_pick_actions() {
        let mut panel = panel();
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Char('3'))),
            Some(AiPanelAction::Choose(AiAction::Examples))
        );
        handle_key(&mut panel, key(KeyCode::Char('j')));
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Enter)),
            Some(AiPanelAction::Choose(AiAction::Refine))
        );
    }

    #[test]
    fn save_only_offered_with_response() {
        let mut requester = CountingRequester(0);
        let mut panel = panel();
        panel.choose_action(AiAction::Simplify, &mut requester);
        assert_eq!(handle_key(&mut panel, key(KeyCode::Char('s'))), None);

        let id = panel.pending_request().unwrap();
        panel.complete(&AiCompletion {
            id,
            result: Ok("Simplified version".to_string()),
        });
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Char('s'))),
            Some(AiPanelAction::Save)
        );
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Char('r'))),
            Some(AiPanelAction::Regenerate)
        );
    }

    #[test]
    fn escape_always_closes() {
        let mut requester = CountingRequester(0);
        let mut panel = panel();
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Esc)),
            Some(AiPanelAction::Close)
        );
        panel.choose_action(AiAction::Explain, &mut requester);
        assert_eq!(
            handle_key(&mut panel, key(KeyCode::Esc)),
            Some(AiPanelAction::Close)
        );
    }
}
