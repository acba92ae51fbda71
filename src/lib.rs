// Export modules for use in tests
pub mod ai;
pub mod annotations;
pub mod api;
pub mod document;
pub mod event_source;
pub mod inputs;
pub mod lessons;
pub mod main_app;
pub mod notification;
pub mod overlay;
pub mod panic_handler;
pub mod selection;
pub mod settings;
pub mod system_command;
pub mod theme;
pub mod widget;

pub mod test_utils;

// Re-export main app components
pub use main_app::{App, AppOptions, FocusedPanel, run_app_with_event_source};
