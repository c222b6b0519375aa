use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app;
mod chat;
mod config;
mod login;
mod session;
mod ui;

use api::HttpChatApi;
use app::App;
use config::Config;
use session::{FileSessionStore, SessionGuard};

fn cli() -> Command {
    Command::new("meetchat")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Meetchat Team")
        .about("Terminal client for a chat and meeting-scheduling service")
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .value_name("URL")
                .help("Backend API base URL (default http://localhost:8003/api)"),
        )
        .arg(
            Arg::new("chat-id")
                .long("chat-id")
                .value_name("ID")
                .value_parser(clap::value_parser!(i64))
                .help("Conversation to open"),
        )
        .arg(
            Arg::new("refresh-secs")
                .long("refresh-secs")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .help("Message refresh interval"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Config file (default <config dir>/meetchat/config.toml)"),
        )
        .arg(
            Arg::new("session-file")
                .long("session-file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Where the login session is kept"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Log destination; filter with MEETCHAT_LOG"),
        )
        .arg(
            Arg::new("logout")
                .long("logout")
                .action(clap::ArgAction::SetTrue)
                .help("Forget the stored session and exit"),
        )
        .arg(
            Arg::new("whoami")
                .long("whoami")
                .action(clap::ArgAction::SetTrue)
                .help("Print the stored user and exit"),
        )
}

fn resolve_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    config.apply_env()?;

    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api_base_url = url.clone();
    }
    if let Some(chat_id) = matches.get_one::<i64>("chat-id") {
        config.chat_id = *chat_id;
    }
    if let Some(secs) = matches.get_one::<u64>("refresh-secs") {
        config.refresh_interval_secs = *secs;
    }
    if let Some(path) = matches.get_one::<PathBuf>("session-file") {
        config.session_file = Some(path.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("log-file") {
        config.log_file = Some(path.clone());
    }
    Ok(config)
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<()> {
    let path = config.log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env("MEETCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = resolve_config(&matches)?;
    init_logging(&config)?;

    let store = session::shared(FileSessionStore::new(config.session_path()));

    if matches.get_flag("logout") {
        SessionGuard::clear(&store)?;
        println!("Logged out.");
        return Ok(());
    }
    if matches.get_flag("whoami") {
        match SessionGuard::check(&store) {
            Some(session) => match &session.user.email {
                Some(email) => println!("{} <{}> (id {})", session.user.name, email, session.user.id),
                None => println!("{} (id {})", session.user.name, session.user.id),
            },
            None => println!("not logged in"),
        }
        return Ok(());
    }

    info!(api = %config.api_base_url, chat_id = config.chat_id, "starting");
    let api = Arc::new(HttpChatApi::new(&config.api_base_url, config.request_timeout())?);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config, api, store);
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = ?err, "terminal loop failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(250);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout_duration = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout_duration)? {
            let event = event::read()?;
            app.handle_input(event).await?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            info!("quit");
            return Ok(());
        }
    }
}
