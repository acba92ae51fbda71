use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::Terminal;
use ratatui::backend::TestBackend;
use serial_test::serial;
use tempfile::TempDir;

use studylens::ai::SimulatedGenerator;
use studylens::annotations::{AnnotationBody, AnnotationStore};
use studylens::lessons::{LessonCatalog, LessonRecord};
use studylens::main_app::{MainPanel, PopupWindow};
use studylens::settings;
use studylens::system_command::MockSystemCommandExecutor;
use studylens::test_utils::test_helpers::{
    TestScenarioBuilder, capture_terminal_state, create_test_terminal,
};
use studylens::{App, AppOptions, FocusedPanel, run_app_with_event_source};

const LESSON_TEXT: &str = "The Earth rotates on its axis.\nThis causes day and night.\x0cSeasons change as the Earth revolves.";

fn write_lesson(dir: &Path) -> LessonCatalog {
    let document = dir.join("lesson3.txt");
    fs::write(&document, LESSON_TEXT).unwrap();
    LessonCatalog::new(vec![LessonRecord {
        id: 3,
        number: 3,
        title: "Motions of the Earth".to_string(),
        description: "Rotation and revolution".to_string(),
        document,
    }])
    .unwrap()
}

fn create_app(dir: &Path, store: AnnotationStore) -> App {
    settings::disable_persistence();
    settings::set_sidebar_shown(true);
    let options = AppOptions::new(
        write_lesson(dir),
        store,
        Arc::new(SimulatedGenerator::new(Duration::from_millis(10))),
    )
    .with_system_executor(Box::new(MockSystemCommandExecutor::new()));
    App::new(options)
}

fn run(terminal: &mut Terminal<TestBackend>, app: &mut App, scenario: TestScenarioBuilder) {
    let mut events = scenario.build();
    run_app_with_event_source(terminal, app, &mut events).unwrap();
    assert_eq!(events.remaining(), 0);
}

/// Opens the only lesson and selects "Earth" on the first line.
fn open_and_select_earth() -> TestScenarioBuilder {
    TestScenarioBuilder::new()
        .press_enter()
        .move_right(4)
        .press_char('v')
        .move_right(4)
}

#[test]
#[serial]
fn note_survives_restart() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("annotations.yaml");

    {
        let mut app = create_app(dir.path(), AnnotationStore::open(&store_path).unwrap());
        let mut terminal = create_test_terminal(100, 30);
        run(
            &mut terminal,
            &mut app,
            open_and_select_earth()
                .press_char('n')
                .type_text("Rotation")
                .press_ctrl_char('s')
                .quit(),
        );
        assert_eq!(app.store().len(), 1);
    }

    let reopened = AnnotationStore::open(&store_path).unwrap();
    let saved = reopened.annotations_by_page(3, 1);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].source_text, "Earth");
    match &saved[0].body {
        AnnotationBody::Note { heading, .. } => assert_eq!(heading, "Rotation"),
        other => panic!("expected a note, got {other:?}"),
    }
}

#[test]
#[serial]
fn saved_note_is_highlighted_on_its_page_only() {
    let dir = TempDir::new().unwrap();
    let mut app = create_app(dir.path(), AnnotationStore::in_memory());
    let mut terminal = create_test_terminal(100, 30);

    run(
        &mut terminal,
        &mut app,
        open_and_select_earth()
            .press_char('n')
            .type_text("Spin")
            .press_ctrl_char('s')
            .quit(),
    );
    assert_eq!(app.overlay().len(), 1);

    run(
        &mut terminal,
        &mut app,
        TestScenarioBuilder::new().press_char(']').quit(),
    );
    assert_eq!(app.page_view().unwrap().current_page(), 2);
    assert!(app.overlay().is_empty());
    assert_eq!(app.store().annotations_by_page(3, 1).len(), 1);
}

#[test]
#[serial]
fn ai_explanation_is_saved_after_response() {
    let dir = TempDir::new().unwrap();
    let mut app = create_app(dir.path(), AnnotationStore::in_memory());
    let mut terminal = create_test_terminal(100, 30);

    // Ctrl+c leaves the loop with the panel still open
    run(
        &mut terminal,
        &mut app,
        open_and_select_earth()
            .press_char('a')
            .press_char('3')
            .press_ctrl_char('c'),
    );
    assert_eq!(app.focused_panel, FocusedPanel::Popup(PopupWindow::Ai));

    let started = Instant::now();
    while app.ai_panel().and_then(|panel| panel.response()).is_none() {
        assert!(started.elapsed() < Duration::from_secs(5), "no AI response");
        app.tick();
        std::thread::sleep(Duration::from_millis(5));
    }

    run(
        &mut terminal,
        &mut app,
        TestScenarioBuilder::new().press_char('s').quit(),
    );

    let saved = app.store().annotations_by_page(3, 1);
    assert_eq!(saved.len(), 1);
    match &saved[0].body {
        AnnotationBody::Ai { response, .. } => {
            assert!(response.starts_with("Examples:"));
            assert!(response.contains("Earth"));
        }
        other => panic!("expected an AI annotation, got {other:?}"),
    }
    assert!(app.is_main_panel(MainPanel::Content));
}

#[test]
#[serial]
fn cancelled_ai_request_leaves_no_annotation() {
    let dir = TempDir::new().unwrap();
    let mut app = create_app(dir.path(), AnnotationStore::in_memory());
    let mut terminal = create_test_terminal(100, 30);

    run(
        &mut terminal,
        &mut app,
        open_and_select_earth()
            .press_char('a')
            .press_char('4')
            .press_esc()
            .quit(),
    );
    assert!(app.ai_panel().is_none());

    std::thread::sleep(Duration::from_millis(60));
    app.tick();
    assert!(app.store().is_empty());
}

#[test]
#[serial]
fn lesson_page_is_rendered() {
    let dir = TempDir::new().unwrap();
    let mut app = create_app(dir.path(), AnnotationStore::in_memory());
    let mut terminal = create_test_terminal(100, 30);

    run(
        &mut terminal,
        &mut app,
        TestScenarioBuilder::new().press_enter().quit(),
    );
    let screen = capture_terminal_state(&terminal);

    assert!(screen.contains("Motions of the Earth"), "{screen}");
    assert!(screen.contains("The Earth rotates on its axis."), "{screen}");
    assert!(!screen.contains("Seasons change"), "{screen}");
}

#[test]
#[serial]
fn missing_document_keeps_lesson_list_focused() {
    let dir = TempDir::new().unwrap();
    let mut app = create_app(dir.path(), AnnotationStore::in_memory());
    fs::remove_file(dir.path().join("lesson3.txt")).unwrap();
    let mut terminal = create_test_terminal(100, 30);

    run(
        &mut terminal,
        &mut app,
        TestScenarioBuilder::new().press_enter().quit(),
    );

    assert!(app.page_view().is_none());
    assert!(app.is_main_panel(MainPanel::LessonList));
    assert!(app.notifications().current().is_some());
}
