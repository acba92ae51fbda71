pub mod test_helpers {
    use crate::event_source::{Event, KeyCode, KeyModifiers, SimulatedEventSource};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a character key press
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        /// Add a Ctrl+character key press
        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press_enter(mut self) -> Self {
            self.events.push(SimulatedEventSource::code(KeyCode::Enter));
            self
        }

        pub fn press_esc(mut self) -> Self {
            self.events.push(SimulatedEventSource::code(KeyCode::Esc));
            self
        }

        pub fn press_tab(mut self) -> Self {
            self.events.push(SimulatedEventSource::key_event(
                KeyCode::Tab,
                KeyModifiers::empty(),
            ));
            self
        }

        /// One key press per character, for text fields
        pub fn type_text(mut self, text: &str) -> Self {
            self.events.extend(SimulatedEventSource::typed(text));
            self
        }

        /// Navigate down n times (press 'j' n times)
        pub fn navigate_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        /// Move right n times (press 'l' n times)
        pub fn move_right(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('l'));
            }
            self
        }

        /// Left-button drag between two screen cells
        pub fn drag(mut self, from: (u16, u16), to: (u16, u16)) -> Self {
            self.events.extend(SimulatedEventSource::mouse_drag(from, to));
            self
        }

        pub fn click(mut self, column: u16, row: u16) -> Self {
            self.events
                .extend(SimulatedEventSource::mouse_click(column, row));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        pub fn len(&self) -> usize {
            self.events.len()
        }

        pub fn is_empty(&self) -> bool {
            self.events.is_empty()
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).expect("test backend never fails")
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            // Trim trailing whitespace from each line
            lines.push(line.trim_end().to_string());
        }

        // Remove trailing empty lines
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .navigate_down(2)
            .press_enter()
            .type_text("ab")
            .drag((1, 1), (4, 1))
            .press_tab()
            .quit();

        assert_eq!(scenario.len(), 10);
        assert_eq!(scenario.build().remaining(), 10);
    }

    #[test]
    fn captured_state_trims_blank_space() {
        let mut terminal = create_test_terminal(10, 3);
        terminal
            .draw(|f| {
                f.render_widget(ratatui::widgets::Paragraph::new("hi"), f.area());
            })
            .unwrap();
        assert_eq!(capture_terminal_state(&terminal), "hi");
    }
}
