//! Host binary for `AutoSchematic`.
//!
//! Wires the paste scheduler to a tick loop, an in-memory world, and the
//! process console.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load `config.yml` and `messages.yml` from the data directory,
//!    writing defaults where missing
//! 3. Build the host scheduler (tick queue plus blocking pool)
//! 4. Build the paste scheduler over the schematics folder
//! 5. Schedule the startup paste
//! 6. Start the console reader
//! 7. Run the tick loop until Ctrl-C or console EOF

mod console;
mod error;
mod host;
mod startup;

use std::path::PathBuf;
use std::sync::Arc;

use autoschematic_core::config::ConfigStore;
use autoschematic_core::locate::SchematicLocator;
use autoschematic_core::messages::MessageStore;
use autoschematic_core::paste::PasteScheduler;
use autoschematic_core::schedule::TickScheduler;
use autoschematic_core::tick_queue::TickQueue;
use autoschematic_world::source::FileClipboardSource;
use autoschematic_world::world::BlockWorld;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::console::Commands;
use crate::error::EngineError;
use crate::host::HostScheduler;

/// Environment variable naming the data directory.
const DATA_DIR_ENV: &str = "AUTOSCHEMATIC_DATA_DIR";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the console
/// fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("autoschematic-engine starting");

    // 2. Load configuration and messages.
    let root = std::env::var_os(DATA_DIR_ENV).map_or_else(|| PathBuf::from("data"), PathBuf::from);
    let config = Arc::new(ConfigStore::load_or_create(&root)?);
    let messages = Arc::new(MessageStore::load_or_create(&root)?);
    let snapshot = config.snapshot();
    info!(
        root = %root.display(),
        schematic_file = %snapshot.schematic_file,
        load_on_startup = snapshot.load_on_startup,
        async_operations = snapshot.performance.async_operations,
        max_blocks_per_tick = snapshot.performance.max_blocks_per_tick,
        timeout_seconds = snapshot.performance.timeout_seconds,
        "Configuration loaded"
    );

    // 3. Host scheduler.
    let host = HostScheduler::new(
        Arc::new(TickQueue::new()),
        tokio::runtime::Handle::current(),
    );
    let queue = Arc::clone(host.queue());
    let host: Arc<dyn TickScheduler> = Arc::new(host);

    // 4. Paste scheduler.
    let world = BlockWorld::new("world");
    let locator = SchematicLocator::new(&root, &snapshot.schematics_folder);
    locator.ensure_folder()?;
    let pastes = PasteScheduler::new(
        Arc::clone(&host),
        Arc::new(FileClipboardSource::new()),
        Arc::new(world.clone()),
        locator,
    );
    info!(
        available = pastes.locator().available().len(),
        "Paste scheduler ready"
    );

    // 5. Startup paste.
    let _startup = startup::schedule(host.as_ref(), pastes.clone(), Arc::clone(&config));

    // 6. Console.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let commands = Commands::new(pastes, Arc::clone(&config), Arc::clone(&messages));
    let console_shutdown = shutdown_tx.clone();
    let console = tokio::spawn(async move {
        let result = console::run_console(&commands).await;
        let _ = console_shutdown.send(true);
        result
    });

    // 7. Tick loop.
    let ticker = tokio::spawn(host::run_tick_loop(Arc::clone(&queue), shutdown_rx));
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupt received");
        }
        () = wait_for(shutdown_tx.subscribe()) => {}
    }
    let _ = shutdown_tx.send(true);

    let last_tick = ticker.await.unwrap_or_default();
    console.abort();
    match console.await {
        Ok(Err(err)) => error!(error = %err, "Console failed"),
        Ok(Ok(())) | Err(_) => {}
    }

    info!(
        last_tick,
        blocks = world.len(),
        "autoschematic-engine shutdown complete"
    );
    Ok(())
}

/// Resolve once the shutdown flag is set or its sender is gone.
async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
