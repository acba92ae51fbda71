use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ratatui::Terminal;
use ratatui::backend::TestBackend;
use serial_test::serial;
use tempfile::TempDir;

use studylens::ai::SimulatedGenerator;
use studylens::annotations::AnnotationStore;
use studylens::lessons::{LessonCatalog, LessonRecord};
use studylens::settings;
use studylens::system_command::MockSystemCommandExecutor;
use studylens::test_utils::test_helpers::TestScenarioBuilder;
use studylens::{App, AppOptions, run_app_with_event_source};

fn app_with_mock(dir: &TempDir, executor: MockSystemCommandExecutor) -> (App, String) {
    settings::disable_persistence();
    settings::set_sidebar_shown(true);

    let document = dir.path().join("lesson1.txt");
    fs::write(&document, "Latitude\x0cLongitude\x0cTime zones").unwrap();
    let catalog = LessonCatalog::new(vec![LessonRecord {
        id: 1,
        number: 1,
        title: "Locating Places on the Earth".to_string(),
        description: String::new(),
        document: document.clone(),
    }])
    .unwrap();

    let options = AppOptions::new(
        catalog,
        AnnotationStore::in_memory(),
        Arc::new(SimulatedGenerator::new(Duration::from_millis(10))),
    )
    .with_system_executor(Box::new(executor));
    (App::new(options), document.display().to_string())
}

fn executed(app: &App) -> Vec<String> {
    app.system_command_executor
        .as_any()
        .downcast_ref::<MockSystemCommandExecutor>()
        .unwrap()
        .get_executed_commands()
}

#[test]
#[serial]
fn test_ctrl_o_opens_system_viewer_at_current_page() {
    let dir = TempDir::new().unwrap();
    let (mut app, document) = app_with_mock(&dir, MockSystemCommandExecutor::new());

    let mut event_source = TestScenarioBuilder::new()
        .press_enter()
        .press_char(']')
        .press_char(']')
        .press_ctrl_char('o')
        .quit()
        .build();

    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    run_app_with_event_source(&mut terminal, &mut app, &mut event_source).unwrap();

    assert_eq!(executed(&app), vec![format!("{document}@page3")]);
}

#[test]
#[serial]
fn test_ctrl_o_without_open_lesson_does_nothing() {
    let dir = TempDir::new().unwrap();
    let (mut app, _) = app_with_mock(&dir, MockSystemCommandExecutor::new());

    let mut event_source = TestScenarioBuilder::new()
        .press_ctrl_char('o')
        .quit()
        .build();
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    run_app_with_event_source(&mut terminal, &mut app, &mut event_source).unwrap();

    assert!(executed(&app).is_empty());
}

#[test]
#[serial]
fn test_ctrl_o_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let (mut app, _) = app_with_mock(&dir, MockSystemCommandExecutor::failing("no viewer"));

    let mut event_source = TestScenarioBuilder::new()
        .press_enter()
        .press_ctrl_char('o')
        .quit()
        .build();
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    run_app_with_event_source(&mut terminal, &mut app, &mut event_source).unwrap();

    let notification = app.notifications().current().unwrap();
    assert!(notification.message.contains("no viewer"));
}
