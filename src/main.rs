use std::sync::Arc;
use std::sync::atomic::Ordering;

use secrecy::SecretString;
use tracing::warn;

use order_sift::config::EngineConfig;
use order_sift::engine::Engine;
use order_sift::entries::{EntryStore, MemoryEntryStore, RestEntryStore};
use order_sift::scheduler::spawn_scan_loop;
use order_sift::settings::store::JsonSettingsStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env();
    let mode = std::env::args().nth(1).unwrap_or_else(|| "scan".to_string());

    eprintln!("📬 order-sift v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Settings: {}", config.settings_path);
    eprintln!(
        "   Scan bounds: {} pages × {} messages",
        config.scan_bounds.max_pages, config.scan_bounds.batch_size
    );

    let settings = Arc::new(JsonSettingsStore::new(&config.settings_path));

    let entries: Arc<dyn EntryStore> = match std::env::var("ORDER_SIFT_ENTRIES_URL") {
        Ok(url) => {
            eprintln!("   Entries: {url}");
            let api_key = std::env::var("ORDER_SIFT_ENTRIES_KEY")
                .ok()
                .map(SecretString::from);
            Arc::new(RestEntryStore::new(url, api_key))
        }
        Err(_) => {
            warn!("ORDER_SIFT_ENTRIES_URL not set — entry updates stay in memory (dry run)");
            Arc::new(MemoryEntryStore::new())
        }
    };

    let engine = Arc::new(Engine::new(settings, entries, config));

    match mode.as_str() {
        "scan" => {
            let report = engine.update_all_accounts().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "daemon" => {
            let (handle, shutdown) = spawn_scan_loop(engine);
            tokio::signal::ctrl_c().await?;
            eprintln!("\nShutting down…");
            shutdown.store(true, Ordering::Relaxed);
            handle.abort();
        }
        other => {
            eprintln!("Unknown mode: {other}");
            eprintln!("Usage: order-sift [scan|daemon]");
            std::process::exit(2);
        }
    }

    Ok(())
}
