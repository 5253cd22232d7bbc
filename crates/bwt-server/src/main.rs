//! BWT Perla bridge daemon
//!
//! Loads the persisted config entries, migrates and sets them up through
//! the integration, and keeps polling until ctrl-c. Entries whose device is
//! not ready yet are retried with exponential backoff.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bwt_config_entries::{
    calculate_retry_delay, ConfigEntries, ConfigEntriesError, SetupError,
};
use bwt_perla::{BwtIntegration, IntegrationConfig, Language};
use bwt_registries::{EntityRegistry, Storage};
use bwt_state_store::StateStore;

/// The bridge instance wiring the shared subsystems
struct Bridge {
    entries: Arc<ConfigEntries>,
    integration: Arc<BwtIntegration>,
    states: Arc<StateStore>,
}

impl Bridge {
    async fn new(config: &IntegrationConfig) -> Result<Self> {
        let storage = Arc::new(Storage::new(&config.config_dir));

        let registry = Arc::new(EntityRegistry::new(Arc::clone(&storage)));
        registry.load().await?;

        let entries = Arc::new(ConfigEntries::new(storage));
        entries.load().await?;

        let states = Arc::new(StateStore::new());
        let integration = Arc::new(BwtIntegration::new(
            registry,
            Arc::clone(&states),
            Language::from_tag(&config.language),
            config.scan_interval(),
        ));

        Ok(Self {
            entries,
            integration,
            states,
        })
    }

    /// Set one entry up, retrying with backoff while the device reports
    /// "not ready".
    async fn setup_with_retry(entries: Arc<ConfigEntries>, integration: Arc<BwtIntegration>, entry_id: String) {
        loop {
            match entries.setup_entry(&entry_id, integration.as_ref()).await {
                Ok(()) => return,
                Err(ConfigEntriesError::Setup(SetupError::NotReady(reason))) => {
                    let tries = entries.get(&entry_id).map(|e| e.tries).unwrap_or(1);
                    let delay = calculate_retry_delay(tries.saturating_sub(1));
                    warn!(
                        entry_id = %entry_id,
                        reason = %reason,
                        tries,
                        "entry not ready, retrying in {delay:.0}s"
                    );
                    tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
                }
                Err(err) => {
                    warn!(entry_id = %entry_id, error = %err, "entry setup failed");
                    return;
                }
            }
        }
    }

    async fn start(&self) {
        for entry_id in self.entries.entry_ids() {
            tokio::spawn(Self::setup_with_retry(
                Arc::clone(&self.entries),
                Arc::clone(&self.integration),
                entry_id,
            ));
        }
    }

    async fn shutdown(&self) {
        for entry_id in self.entries.entry_ids() {
            if let Err(err) = self
                .entries
                .unload_entry(&entry_id, self.integration.as_ref())
                .await
            {
                warn!(entry_id = %entry_id, error = %err, "unload failed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "bwt.yaml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        IntegrationConfig::load(&config_path)?
    } else {
        info!("no config file at {config_path}, using defaults");
        IntegrationConfig::default()
    };

    info!("Starting BWT Perla bridge");
    let bridge = Bridge::new(&config).await?;

    if bridge.entries.is_empty() {
        warn!("no config entries found; add one to {:?}", config.config_dir.join(".storage"));
    }

    bridge.start().await;
    info!("BWT Perla bridge is running");

    tokio::signal::ctrl_c().await?;
    info!(
        published_states = bridge.states.len(),
        "Shutting down..."
    );
    bridge.shutdown().await;

    Ok(())
}
