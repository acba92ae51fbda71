use std::time::{Duration, Instant};

use ratatui::style::Color;

use crate::theme::Base16Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn color(&self, palette: &Base16Palette) -> Color {
        match self {
            NotificationLevel::Info => palette.base_0b,
            NotificationLevel::Warning => palette.base_0a,
            NotificationLevel::Error => palette.base_08,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Short-lived status messages shown in the bottom bar, newest first.
#[derive(Debug)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(4))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        let notification = Notification::new(message, level, self.default_duration);
        self.notifications.insert(0, notification);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn newest_notification_is_current() {
        let mut manager = NotificationManager::new();

        manager.info("Note saved");
        manager.error("Sync failed");

        assert_eq!(manager.count(), 2);
        let current = manager.current().unwrap();
        assert_eq!(current.message, "Sync failed");
        assert_eq!(current.level, NotificationLevel::Error);

        assert!(manager.dismiss_current());
        assert_eq!(manager.current().unwrap().message, "Note saved");
    }

    #[test]
    fn expired_notifications_are_dropped() {
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(30));

        manager.warn("Short-lived");
        thread::sleep(Duration::from_millis(40));

        assert!(manager.update());
        assert_eq!(manager.count(), 0);
        assert!(!manager.dismiss_current());
    }
}
