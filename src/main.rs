//! Gatekeeper - a terminal front-end for signing in to a backend.
//!
//! Without arguments this runs the TUI. `--status`, `--login` and `--logout`
//! operate on the stored session from the command line.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gatekeeper::api::ApiClient;
use gatekeeper::app::{App, AppState, LoginForm};
use gatekeeper::auth::{AuthClient, FileSessionStore, MemorySessionStore, SessionStore};
use gatekeeper::config::Config;
use gatekeeper::ui::input::handle_input;
use gatekeeper::ui::render::render;
use gatekeeper::utils::format_age;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "gatekeeper.log";

const USAGE: &str = "\
Usage: gatekeeper [OPTION]

  (none)        run the terminal UI
  --ephemeral   run the terminal UI with a session kept only in memory
  --status      show the stored session
  --login       sign in from the command line
  --logout      drop the stored session
  --help        show this message

The backend base URI comes from the config file or GATEKEEPER_BACKEND_URI.";

enum Command {
    Tui { ephemeral: bool },
    Status,
    Login,
    Logout,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args.get(1).map(String::as_str) {
            None => Ok(Command::Tui { ephemeral: false }),
            Some("--ephemeral") => Ok(Command::Tui { ephemeral: true }),
            Some("--status") => Ok(Command::Status),
            Some("--login") => Ok(Command::Login),
            Some("--logout") => Ok(Command::Logout),
            Some("--help") | Some("-h") => Ok(Command::Help),
            Some(other) => Err(anyhow::anyhow!("Unknown option: {}\n\n{}", other, USAGE)),
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so log lines go to a daily file in
/// `log_dir`. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir)
        .context("Failed to create log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

fn open_store(config: &Config, ephemeral: bool) -> Result<Arc<dyn SessionStore>> {
    if ephemeral {
        return Ok(Arc::new(MemorySessionStore::new()));
    }
    let store = FileSessionStore::open(config.session_dir()?)
        .context("Failed to open session store")?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let command = Command::parse(&args)?;
    if matches!(command, Command::Help) {
        println!("{}", USAGE);
        return Ok(());
    }

    let _log_guard = init_tracing(&Config::cache_dir()?)?;
    info!("Gatekeeper starting");

    let config = Config::load()?;

    match command {
        Command::Status => print_status(&config),
        Command::Logout => logout(&config),
        Command::Login => login_from_prompt(config).await,
        Command::Tui { ephemeral } => run_tui(config, ephemeral).await,
        Command::Help => Ok(()),
    }
}

// ============================================================================
// Command line
// ============================================================================

fn print_status(config: &Config) -> Result<()> {
    let store = open_store(config, false)?;
    println!("Backend: {}", config.backend_uri);
    match store.session() {
        Some(session) => println!(
            "Signed in as {} ({})",
            session.user_identifier,
            format_age(session.created_at, chrono::Utc::now())
        ),
        None => println!("Not signed in"),
    }
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let store = open_store(config, false)?;
    let api = ApiClient::new(&config.backend_uri, config.request_timeout())?;
    AuthClient::new(api, store).logout()?;
    println!("Signed out");
    Ok(())
}

async fn login_from_prompt(mut config: Config) -> Result<()> {
    let store = open_store(&config, false)?;
    let api = ApiClient::new(&config.backend_uri, config.request_timeout())?;
    let auth = AuthClient::new(api, store);

    let mut form = LoginForm::new(config.last_identifier.clone().unwrap_or_default());
    form.identifier = prompt_identifier(&form.identifier)?;
    form.secret = rpassword::prompt_password("Password: ")?;

    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", error);
            }
            anyhow::bail!("Login form is invalid");
        }
    };

    println!("Authenticating...");
    match auth.login(credentials).await {
        Ok(session) => {
            config.last_identifier = Some(session.user_identifier.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Signed in as {}", session.user_identifier);
            Ok(())
        }
        Err(e) => anyhow::bail!("Login failed: {}", e.user_message()),
    }
}

fn prompt_identifier(default: &str) -> Result<String> {
    if default.is_empty() {
        print!("Email: ");
    } else {
        print!("Email [{}]: ", default);
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input.to_string()
    })
}

// ============================================================================
// Terminal UI
// ============================================================================

async fn run_tui(config: Config, ephemeral: bool) -> Result<()> {
    let store = open_store(&config, ephemeral)?;
    let mut app = App::new(config, store)?;
    if ephemeral {
        app = app.without_config_persistence();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Gatekeeper shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout so the login result is picked up
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }

        // Yield so the login task can make progress between frames
        tokio::task::yield_now().await;
    }
}
