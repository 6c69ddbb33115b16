//! fetecache - a terminal client for NSPT Tassin event registration.
//!
//! This application lists the club's events, registers participants (with a
//! best-effort confirmation notification), creates events, and keeps a
//! versioned offline mirror of the registration site's assets.

mod api;
mod app;
mod cache;
mod config;
mod models;
mod notify;
mod ui;
mod utils;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use cache::AssetCache;
use config::Config;
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Timeout for mirror fetches in seconds
const MIRROR_TIMEOUT_SECS: u64 = 30;

/// Initialize the tracing subscriber.
///
/// Logs go to a daily-rolling file under the cache dir so they never bleed
/// into the alternate screen. Use RUST_LOG to control the level.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Ok(cache_dir) = Config::cache_dir() {
        let log_dir = cache_dir.join("logs");
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let appender = tracing_appender::rolling::daily(log_dir, "fetecache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            return Some(guard);
        }
    }

    // No usable cache dir: fall back to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--mirror" {
        return mirror_assets().await;
    }

    let _log_guard = init_tracing();
    info!("fetecache starting");

    let config = Config::load()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and start the initial load
    let mut app = App::new(config)?;
    app.reload_events();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("fetecache shutting down");
    Ok(())
}

/// Refresh the offline mirror of the registration site.
///
/// Installs the fixed asset manifest into the current cache version,
/// deletes stale versions, then runs the root document through the
/// navigation policy so its cached copy is the freshest.
async fn mirror_assets() -> Result<()> {
    let config = Config::load()?;
    let cache = AssetCache::new(Config::cache_dir()?.join("site"))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(MIRROR_TIMEOUT_SECS))
        .build()?;

    if let Some(age) = cache.installed_age() {
        eprintln!("Previous mirror: {}", age);
    }
    eprintln!("Mirroring {}...", config.site_url);

    let count = cache.install(&client, &config.site_url).await?;
    let removed = cache.activate()?;
    let root = cache.fetch_navigation(&client, &config.site_url, "/").await?;

    eprintln!(
        "Mirrored {} assets ({} bytes root document), {} stale cache(s) removed",
        count,
        root.len(),
        removed.len()
    );
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
