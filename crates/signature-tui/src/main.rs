use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::Result;
use signature_core::{Config, SignatureClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const LOG_ENV: &str = "SIGNATURE_LOG";

/// Log to a file: the terminal belongs to the UI while it runs.
fn init_logging() -> Result<()> {
    let log_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
        .join("ia-signature");
    fs::create_dir_all(&log_dir)?;
    let log_file = File::create(log_dir.join("signature.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config() -> Config {
    let exists = Config::get_config_path()
        .map(|path| path.exists())
        .unwrap_or(false);

    match Config::load() {
        Ok(config) => {
            if !exists {
                // Leave a template behind so endpoints are easy to find and edit.
                if let Err(err) = config.save() {
                    tracing::warn!(error = %err, "could not write default config");
                }
            }
            config
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not load config, using defaults");
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = init_logging() {
        eprintln!("logging disabled: {err}");
    }
    info!("IA SIGNATURE v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let endpoints = config.endpoints();
    info!(chat = %endpoints.chat, base = %endpoints.whatif_chat, "endpoints resolved");
    let client = SignatureClient::new(endpoints);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, events.sender());

    let result = run(&mut terminal, &mut events, &mut app).await;

    app.shutdown();
    tui::restore()?;
    info!("exiting");
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;
    }
    Ok(())
}
