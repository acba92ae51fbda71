use std::time::{Duration, Instant};

const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    Single,
    Double,
}

/// Tells single clicks from double clicks on the same cell.
#[derive(Debug, Default)]
pub struct MouseTracker {
    last_click: Option<(Instant, u16, u16)>,
}

impl MouseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect_click_type(&mut self, column: u16, row: u16) -> ClickType {
        self.detect_click_type_at(column, row, Instant::now())
    }

    fn detect_click_type_at(&mut self, column: u16, row: u16, now: Instant) -> ClickType {
        match self.last_click {
            Some((at, last_column, last_row))
                if last_column == column
                    && last_row == row
                    && now.duration_since(at) <= DOUBLE_CLICK_WINDOW =>
            {
                // A third click starts over
                self.last_click = None;
                ClickType::Double
            }
            _ => {
                self.last_click = Some((now, column, row));
                ClickType::Single
            }
        }
    }
}
