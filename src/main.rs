use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockfra_core::{socket, Config, WizardClient};
use tokio::sync::mpsc;

mod app;
mod cli;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "dockfra")]
#[command(version, about = "Terminal client for the Dockfra setup wizard")]
struct Cli {
    /// Wizard server URL
    #[arg(long, env = "DOCKFRA_URL")]
    url: Option<String>,

    /// Tracing filter, e.g. `debug` or `dockfra_core=trace`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tickets
    Tickets,
    /// Show a ticket's commits and diff
    Diff {
        /// Ticket id, e.g. T-0001
        id: String,
    },
    /// Print the last log lines
    Logs {
        /// Number of lines
        #[arg(default_value = "50")]
        lines: usize,
    },
    /// Send a wizard action, e.g. `show_tickets`
    Action {
        /// Action value (`tag::arg::arg`)
        value: String,
    },
    /// Show LLM engine status
    Engines,
    /// Show developer container health
    DevHealth,
    /// List managed processes
    Processes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {:#}", e);
        Config::new()
    });
    // clap already folds DOCKFRA_URL into --url
    let url = config.server_url(cli.url.as_deref(), None);
    let client = WizardClient::new(&url).with_context(|| format!("invalid server URL {}", url))?;

    match cli.command {
        Some(command) => {
            logging::init_stderr(cli.log_level.as_deref(), config.log_level.as_deref());
            cli::run(&client, command).await
        }
        None => run_tui(config, client, &url, cli.log_level.as_deref()).await,
    }
}

async fn run_tui(config: Config, client: WizardClient, url: &str, log_level: Option<&str>) -> Result<()> {
    let _guard = logging::init_file(log_level, config.log_level.as_deref());
    tracing::info!(%url, "starting TUI");

    let events = EventHandler::new();
    let (socket_tx, socket_rx) = mpsc::unbounded_channel();
    let socket = socket::spawn(url, socket_tx);
    events.forward_socket(socket_rx);

    let mut app = App::new(config, client, socket, events.sender());
    app.start();

    // Install panic hook to restore terminal on panic
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run_loop(&mut terminal, &mut app, events).await;

    tui::restore()?;
    if app.widths.is_some() && app.widths != app.config.panel_widths {
        app.save_widths();
    }
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, mut events: EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        // Wake up for form flushes and notice expiry even without input
        match events.next_until(app.session.next_deadline()).await {
            Some(event) => handler::handle_event(app, event)?,
            None => app.session.tick(Instant::now()),
        }
    }
    Ok(())
}
