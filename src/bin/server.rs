use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use statuswatch::alerting::checkin_sweep::CheckinSweeper;
use statuswatch::checkins::CheckinMonitor;
use statuswatch::db::{MemoryStore, Store};
use statuswatch::notifications::senders::Notifier;
use statuswatch::notifications::senders::telegram::TelegramNotifier;
use statuswatch::notifications::senders::webhook::WebhookNotifier;
use statuswatch::notifications::{EventDispatcher, NotifierRegistry};
use statuswatch::server::config::ServerConfig;
use statuswatch::server::logging::init_logging;
use statuswatch::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?;
    let _log_guard = init_logging(&config.log_dir);
    info!(version = VERSION, base_url = %config.base_url, "Starting statuswatch.");

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    // --- Notifiers ---
    let registry = Arc::new(NotifierRegistry::new(store.clone(), config.queue_settings()));
    let backends: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(WebhookNotifier::new()),
        Arc::new(TelegramNotifier::new()),
    ];
    for notifier in backends {
        let method = notifier.method().to_string();
        if let Err(e) = registry.register(notifier) {
            error!(method = %method, error = %e, "Failed to register notifier.");
            return Err(e.into());
        }
    }
    let dispatcher = EventDispatcher::new(registry.clone());

    // --- Checkin sweep ---
    let monitor = Arc::new(CheckinMonitor::new(store.clone(), config.base_url.clone()));
    let sweeper = Arc::new(CheckinSweeper::new(store.clone(), monitor, dispatcher));
    let (stop_tx, stop_rx) = watch::channel(false);
    let sweep_handle = tokio::spawn(sweeper.run_periodic(config.checkin_sweep_period(), stop_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    let _ = stop_tx.send(true);
    if let Err(e) = sweep_handle.await {
        error!(error = %e, "Checkin sweep task ended abnormally.");
    }
    registry.close_all();
    info!("statuswatch stopped.");

    Ok(())
}
