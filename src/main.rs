mod api;
mod app;
mod config;
mod error;
mod theme;
mod ui;
mod view;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{ApiClient, GroupService, Id};
use app::{App, AppOptions, Popup};
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "tagdeck")]
#[command(version)]
#[command(about = "Browse chat groups, save tag groups of members and trigger them")]
struct Args {
    /// Base URL of the tag-group service (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Where the TUI writes its log
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the group list as JSON and exit
    #[arg(long)]
    groups: bool,

    /// Print the legacy flat member list and exit
    #[arg(long)]
    legacy_members: bool,

    /// Chat id for --trigger
    #[arg(long, allow_hyphen_values = true)]
    chat: Option<String>,

    /// Trigger the named tag group in --chat and exit
    #[arg(long, requires = "chat")]
    trigger: Option<String>,
}

impl Args {
    fn is_one_shot(&self) -> bool {
        self.groups || self.legacy_members || self.trigger.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.is_one_shot() {
        init_logging(LogTarget::Stderr);
    } else {
        init_logging(LogTarget::File(args.log_file.clone().or_else(default_log_path)));
    }

    let mut config = AppConfig::load()?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    let client = ApiClient::new(&config.server_url, config.request_timeout())?;

    // Handle CLI-only commands
    if args.groups {
        return print_groups(&client).await;
    }

    if args.legacy_members {
        return print_legacy_members(&client).await;
    }

    if let (Some(chat), Some(tag)) = (&args.chat, &args.trigger) {
        return trigger_tag(&client, parse_chat_id(chat), tag, config.notifications).await;
    }

    // Run TUI
    ui::init_theme(theme::Theme::from_config(&config.theme));
    let options = AppOptions {
        status_timeout: config.status_timeout(),
        notifications: config.notifications,
    };
    run_tui(App::new(Arc::new(client), options)).await
}

enum LogTarget {
    Stderr,
    File(Option<PathBuf>),
}

fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("tagdeck").join("tagdeck.log"))
}

fn init_logging(target: LogTarget) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagdeck=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match target {
        LogTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
        LogTarget::File(path) => {
            // The TUI owns stdout/stderr; without a file, logs go nowhere
            match path.and_then(|p| open_log_file(&p)) {
                Some(file) => registry
                    .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .init(),
                None => registry
                    .with(tracing_subscriber::fmt::layer().with_writer(io::sink))
                    .init(),
            }
        }
    }
}

fn open_log_file(path: &std::path::Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path).ok()
}

fn parse_chat_id(raw: &str) -> Id {
    match raw.trim().parse::<i64>() {
        Ok(v) => Id::Int(v),
        Err(_) => Id::Text(raw.trim().to_string()),
    }
}

async fn print_groups(client: &ApiClient) -> Result<()> {
    let groups = client.list_groups().await?;
    let output: Vec<serde_json::Value> = groups
        .iter()
        .map(|g| {
            serde_json::json!({
                "chat_id": g.chat_id,
                "title": g.display_title(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn print_legacy_members(client: &ApiClient) -> Result<()> {
    for name in client.legacy_member_names().await? {
        println!("{}", name);
    }
    Ok(())
}

async fn trigger_tag(client: &ApiClient, chat_id: Id, tag: &str, notifications: bool) -> Result<()> {
    client.trigger(&chat_id, tag).await?;
    println!("Triggered {} in {}", tag, chat_id);
    if notifications {
        if let Err(e) = notify("tagdeck", &format!("Triggered {}", tag)) {
            tracing::warn!("Notification failed: {}", e);
        }
    }
    Ok(())
}

async fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.load_groups();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, &view::render(app)))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None && !app.is_editing() => {
                            return Ok(())
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                        _ => app.handle_key(key),
                    }
                }
            }
        }

        // Apply whatever the background requests have produced
        app.drain_events();
        app.tick();
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("dialog-information")
        .show()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("-100123"), Id::Int(-100123));
        assert_eq!(parse_chat_id(" team-a "), Id::from("team-a"));
    }

    #[test]
    fn test_trigger_requires_chat() {
        assert!(Args::try_parse_from(["tagdeck", "--trigger", "oncall"]).is_err());

        let args = Args::try_parse_from(["tagdeck", "--chat", "-5", "--trigger", "oncall"]).unwrap();
        assert_eq!(args.chat.as_deref(), Some("-5"));
        assert!(args.is_one_shot());
    }
}
