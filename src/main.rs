use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use studylens::ai::build_generator;
use studylens::annotations::AnnotationStore;
use studylens::api::ApiClient;
use studylens::event_source::KeyboardEventSource;
use studylens::lessons::LessonCatalog;
use studylens::panic_handler;
use studylens::settings;
use studylens::theme;
use studylens::{App, AppOptions, run_app_with_event_source};

/// Terminal lesson reader with notes and AI explanations
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the lesson documents and an optional catalog.yaml
    #[arg(short = 'd', long, default_value = "lessons")]
    lessons_dir: PathBuf,

    /// Where annotations are stored (defaults to the user data directory)
    #[arg(long)]
    annotations_dir: Option<PathBuf>,

    /// Lesson to open on start
    #[arg(short, long)]
    lesson: Option<u32>,

    /// Lesson backend URL, overrides the configured one for this run
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, default_value = "studylens.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Use default settings and never write the config file
    #[arg(long)]
    no_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        args.log_level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("Failed to create log file {}", args.log_file.display()))?,
    )?;

    panic_handler::initialize_panic_handler();

    info!("Starting studylens");

    if args.no_config {
        settings::disable_persistence();
    } else {
        settings::load_settings();
    }
    theme::apply_theme_from_settings();

    let catalog = LessonCatalog::discover(&args.lessons_dir)?;

    let annotations_dir = args
        .annotations_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|dir| dir.join("studylens")))
        .unwrap_or_else(|| PathBuf::from(".studylens_annotations"));
    let store_path = AnnotationStore::default_path(&annotations_dir, &args.lessons_dir);
    let store = AnnotationStore::open(&store_path)
        .with_context(|| format!("Failed to open annotations at {}", store_path.display()))?;

    let api_url = args.api_url.clone().unwrap_or_else(settings::get_api_url);
    let api_client = match ApiClient::new(&api_url) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Lesson backend client unavailable: {e}");
            None
        }
    };
    let generator = build_generator(
        settings::get_ai_backend(),
        Duration::from_millis(settings::get_ai_delay_ms()),
        api_client.clone(),
    );

    let mut options = AppOptions::new(catalog, store, generator);
    if let Some(client) = api_client {
        options = options.with_api_client(client);
    }
    let mut app = App::new(options);
    if let Some(lesson_id) = args.lesson {
        app.open_lesson(lesson_id);
    }

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down studylens");
    Ok(())
}
