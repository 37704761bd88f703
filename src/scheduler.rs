//! Scheduled scans — a background task that runs the all-accounts
//! update on a timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::engine::Engine;

/// Spawn the scan loop. The first scan runs immediately; later scans
/// follow the engine's configured interval.
///
/// Returns a `JoinHandle` and shutdown flag. Setting the flag stops the
/// loop at its next tick; a scan already in flight completes first.
pub fn spawn_scan_loop(engine: Arc<Engine>) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let interval = engine.config().scan_interval;

    let handle = tokio::spawn(async move {
        info!("Scan loop started — scanning every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);

        // Run immediately on first tick
        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Scan loop shutting down");
                return;
            }

            match engine.update_all_accounts().await {
                Ok(report) => {
                    info!(
                        accounts = report.accounts.len(),
                        items = report.totals.items,
                        updated = report.totals.updated,
                        errors = report.totals.errors,
                        "Scheduled scan finished"
                    );
                }
                Err(e) => error!("Scheduled scan failed: {e}"),
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::EngineConfig;
    use crate::entries::MemoryEntryStore;
    use crate::error::ConfigError;
    use crate::settings::model::{Settings, Token};
    use crate::settings::store::SettingsStore;

    use super::*;

    struct EmptySettings;

    #[async_trait]
    impl SettingsStore for EmptySettings {
        async fn load(&self) -> Result<Settings, ConfigError> {
            Ok(Settings::default())
        }

        async fn set_token(&self, _: &str, _: Token) -> Result<(), ConfigError> {
            Ok(())
        }

        async fn set_connected_email(&self, _: &str, _: &str) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_flag_stops_the_loop() {
        let engine = Engine::new(
            Arc::new(EmptySettings),
            Arc::new(MemoryEntryStore::new()),
            EngineConfig {
                scan_interval: Duration::from_millis(10),
                ..EngineConfig::default()
            },
        );

        let (handle, shutdown) = spawn_scan_loop(Arc::new(engine));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
