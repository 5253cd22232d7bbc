//! Entry lifecycle glue
//!
//! Implements the [`EntryHandler`] seam: client selection and validation at
//! setup, teardown at unload, and the stepwise identifier migrations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use bwt_api::{ApiError, BwtApi, BwtClient, BwtSilkApi};
use bwt_config_entries::{ConfigEntry, EntryHandler, SetupError};
use bwt_coordinator::{CoordinatorHandle, DataCoordinator};
use bwt_registries::EntityRegistry;
use bwt_state_store::StateStore;

use crate::platform::{setup_platform, PlatformHandle};
use crate::sensor::catalog;
use crate::translations::Language;
use crate::CONFIG_VERSION;

/// Builds a device client from an entry's configuration
pub type ClientFactory =
    Box<dyn Fn(&ConfigEntry) -> Result<Arc<dyn BwtClient>, ApiError> + Send + Sync>;

/// Runtime owned by one loaded config entry
struct EntryRuntime {
    client: Arc<dyn BwtClient>,
    poll: CoordinatorHandle,
    platform: PlatformHandle,
}

/// The integration: owns per-entry runtimes and the shared registry and
/// state store.
pub struct BwtIntegration {
    registry: Arc<EntityRegistry>,
    states: Arc<StateStore>,
    language: Language,
    scan_interval: Duration,
    client_factory: ClientFactory,
    runtimes: DashMap<String, EntryRuntime>,
}

/// The access code in the entry data selects the full API client; without
/// it the device only speaks the register protocol.
fn default_client_factory(entry: &ConfigEntry) -> Result<Arc<dyn BwtClient>, ApiError> {
    let host = entry.host().unwrap_or_default();
    match entry.access_code() {
        Some(code) => Ok(Arc::new(BwtApi::new(host, code)?)),
        None => Ok(Arc::new(BwtSilkApi::new(host)?)),
    }
}

impl BwtIntegration {
    /// Create the integration with real device clients
    pub fn new(
        registry: Arc<EntityRegistry>,
        states: Arc<StateStore>,
        language: Language,
        scan_interval: Duration,
    ) -> Self {
        Self::with_client_factory(
            registry,
            states,
            language,
            scan_interval,
            Box::new(default_client_factory),
        )
    }

    /// Create the integration with a custom client factory
    pub fn with_client_factory(
        registry: Arc<EntityRegistry>,
        states: Arc<StateStore>,
        language: Language,
        scan_interval: Duration,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            registry,
            states,
            language,
            scan_interval,
            client_factory,
            runtimes: DashMap::new(),
        }
    }

    /// The shared state store
    pub fn states(&self) -> &Arc<StateStore> {
        &self.states
    }

    /// Number of currently loaded entries
    pub fn loaded_entries(&self) -> usize {
        self.runtimes.len()
    }
}

#[async_trait]
impl EntryHandler for BwtIntegration {
    fn version(&self) -> u32 {
        CONFIG_VERSION
    }

    async fn setup(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        if entry.host().is_none() {
            return Err(SetupError::Failed("missing host in config entry".into()));
        }

        let client = (self.client_factory)(entry).map_err(|e| SetupError::Failed(e.to_string()))?;

        if let Err(err) = client.validate().await {
            error!(entry_id = %entry.entry_id, error = %err, "error validating device");
            client.close().await;
            return Err(SetupError::NotReady(err.to_string()));
        }

        let coordinator = Arc::new(DataCoordinator::new(
            Arc::clone(&client),
            self.scan_interval,
        ));
        if let Err(err) = coordinator.first_refresh().await {
            error!(entry_id = %entry.entry_id, error = %err, "initial refresh failed");
            client.close().await;
            return Err(SetupError::NotReady(err.to_string()));
        }
        let poll = Arc::clone(&coordinator).spawn();

        let register_count = coordinator.data().registers.len();
        let sensors = catalog(&entry.entry_id, client.kind(), register_count);
        let platform = setup_platform(
            &entry.entry_id,
            sensors,
            &coordinator,
            &self.registry,
            &self.states,
            self.language,
        );

        if let Err(err) = self.registry.save().await {
            warn!(error = %err, "could not persist entity registry");
        }

        self.runtimes.insert(
            entry.entry_id.clone(),
            EntryRuntime {
                client,
                poll,
                platform,
            },
        );
        Ok(())
    }

    async fn unload(&self, entry: &ConfigEntry) -> Result<(), String> {
        if let Some((_, runtime)) = self.runtimes.remove(&entry.entry_id) {
            runtime.platform.teardown().await;
            runtime.poll.shutdown().await;
            runtime.client.close().await;
            info!(entry_id = %entry.entry_id, "entry unloaded");
        }
        Ok(())
    }

    async fn migrate(&self, entry: &mut ConfigEntry) -> Result<(), String> {
        debug!("Migrating from version {}", entry.version);

        // Add the entry id to unique ids in order to allow multiple devices
        if entry.version == 1 {
            for entity in self.registry.entries_for_config_entry(&entry.entry_id) {
                let Some(old_unique_id) = entity.unique_id.clone() else {
                    continue;
                };
                let new_unique_id = format!("{}_{}", entry.entry_id, old_unique_id);
                self.registry
                    .update(&entity.entity_id, move |e| {
                        e.previous_unique_id = e.unique_id.take();
                        e.unique_id = Some(new_unique_id);
                    })
                    .map_err(|e| e.to_string())?;
            }
            entry.version = 2;
        }

        // Remove dollar signs from entity ids created by this config entry
        if entry.version == 2 {
            for entity in self.registry.entries_for_config_entry(&entry.entry_id) {
                if !entity.entity_id.contains('$') {
                    continue;
                }

                let new_entity_id = entity.entity_id.replace('$', "");
                match self
                    .registry
                    .update_entity_id(&entity.entity_id, &new_entity_id)
                {
                    Ok(_) => {
                        info!("Renamed entity {} -> {}", entity.entity_id, new_entity_id)
                    }
                    Err(exc) => warn!(
                        "Could not rename entity {} -> {}: {}",
                        entity.entity_id, new_entity_id, exc
                    ),
                }
            }
            entry.version = 3;
        }

        self.registry.save().await.map_err(|e| e.to_string())?;
        info!("Migration to version {} successful", entry.version);
        Ok(())
    }
}
