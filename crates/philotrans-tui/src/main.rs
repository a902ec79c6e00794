mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use app::App;
use philotrans_core::{Config, MemoryStorage, SqliteStorage, Storage};
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not load config ({}), using defaults", e);
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });

    // Hold the guard for the whole session so the log file gets flushed
    let _log_guard = match config.log_dir().and_then(|dir| logging::init(&dir)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    let storage = open_storage(&config);
    let mut app = App::new(&config, storage);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        error!("TUI exited with error: {:#}", e);
    }
    info!("PhiloTrans shutting down");
    result
}

fn open_storage(config: &Config) -> Arc<dyn Storage> {
    let opened = config
        .storage_path()
        .and_then(|path| SqliteStorage::open(&path).map_err(anyhow::Error::from));

    match opened {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            warn!("Falling back to in-memory storage, history will not persist: {:#}", e);
            Arc::new(MemoryStorage::new())
        }
    }
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;
        app.poll_tasks().await;

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
