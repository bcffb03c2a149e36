mod app;
mod events;
mod logging;
mod persist;
mod strings;
mod terminal;
mod theme;
mod ui;
mod worker;

use anyhow::{Context, Result};
use gemchat_core::{Controller, MemoryKeyStore, Session, Transcript};
use providers::{BackendConfig, HttpBackend};
use terminal::TerminalGuard;
use tracing::{info, warn};

fn main() -> Result<()> {
    let _log_guard = logging::init();

    let cfg = BackendConfig::from_env_and_file().context("load backend config")?;
    info!(target: "tui", "backend: {}", cfg.base_url);
    let default_model = cfg.default_model.clone();
    let backend = HttpBackend::new(cfg)?;
    let server_label = backend.base_url().to_string();

    let store: app::Store = match persist::FileKeyStore::default_location() {
        Some(s) => Box::new(s),
        None => {
            warn!(target: "tui", "no config directory; the API key will not be saved");
            Box::new(MemoryKeyStore::new())
        }
    };
    let mut session = Session::hydrate(store);
    if let Some(m) = default_model {
        session = session.with_model(&m);
    }
    let controller = Controller::new(session, Transcript::with_welcome());

    let mut app = app::App::new(controller, worker::Worker::http(backend), server_label);
    app.start();
    let mut term = TerminalGuard::new()?;
    events::run(&mut term.terminal, &mut app)
}
