//! Config Entries Manager
//!
//! Manages the lifecycle of configuration entries and drives the
//! integration's [`EntryHandler`] through migrate, setup, and unload.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bwt_registries::{Storable, Storage, StorageError, StorageFile, StorageResult};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::state_machine::InvalidTransition;

/// Storage key for config entries
pub const STORAGE_KEY: &str = "bwt_perla.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Setup failure modes reported by an [`EntryHandler`]
#[derive(Debug, Error)]
pub enum SetupError {
    /// Transient condition (device unreachable, validation call failed).
    /// The entry moves to SetupRetry and setup is re-attempted with backoff.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Permanent failure; the entry moves to SetupError.
    #[error("setup failed: {0}")]
    Failed(String),
}

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Unload failed: {0}")]
    Unload(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// The seam an integration implements.
///
/// `migrate` receives a mutable entry and bumps `entry.version` per
/// completed step; the manager persists the result. `setup` performs the
/// validation call and brings up the runtime; `unload` tears it down.
#[async_trait]
pub trait EntryHandler: Send + Sync {
    /// Current schema version the handler writes
    fn version(&self) -> u32 {
        1
    }

    /// Migrate persisted identifiers up to [`EntryHandler::version`]
    async fn migrate(&self, _entry: &mut ConfigEntry) -> Result<(), String> {
        Ok(())
    }

    /// Set up the entry (validation call, runtime bring-up)
    async fn setup(&self, entry: &ConfigEntry) -> Result<(), SetupError>;

    /// Tear the entry down
    async fn unload(&self, entry: &ConfigEntry) -> Result<(), String>;
}

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    /// All config entries
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config Entries Manager
pub struct ConfigEntries {
    /// Storage backend
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Setup lock to prevent concurrent setup/unload
    setup_lock: Mutex<()>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load::<ConfigEntriesData>(STORAGE_KEY).await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        let storage_file =
            StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION, STORAGE_MINOR_VERSION);

        self.storage.save(&storage_file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    /// Index an entry
    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    /// Remove an entry from indexes
    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);

        let mut updated = entry;
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            updated.data = data;
        }
        if let Some(unique_id) = update.unique_id {
            updated.unique_id = unique_id;
        }
        if let Some(version) = update.version {
            updated.version = version;
        }
        if let Some(minor_version) = update.minor_version {
            updated.minor_version = minor_version;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Set entry state with FSM validation
    pub fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Set up an entry, running any pending migration first.
    ///
    /// A [`SetupError::NotReady`] from the handler moves the entry to
    /// SetupRetry and bubbles up so the caller can schedule a retry with
    /// [`crate::calculate_retry_delay`].
    pub async fn setup_entry(
        &self,
        entry_id: &str,
        handler: &dyn EntryHandler,
    ) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        // One-time identifier migration, gated on the persisted version
        if entry.version < handler.version() {
            let mut migrating = entry.clone();
            if let Err(reason) = handler.migrate(&mut migrating).await {
                warn!("Migration failed for entry {}: {}", entry_id, reason);
                self.set_state(
                    entry_id,
                    ConfigEntryState::MigrationError,
                    Some(reason.clone()),
                )?;
                return Err(ConfigEntriesError::Migration(reason));
            }
            self.update(
                entry_id,
                ConfigEntryUpdate {
                    version: Some(migrating.version),
                    minor_version: Some(migrating.minor_version),
                    ..Default::default()
                },
            )
            .await?;
            info!(
                "Migrated entry {} to version {}",
                entry_id, migrating.version
            );
        }

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match handler.setup(&entry).await {
            Ok(()) => {
                self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(SetupError::NotReady(reason)) => {
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(0);
                warn!(
                    "Entry {} not ready (attempt {}): {}",
                    entry_id, tries, reason
                );
                self.set_state(entry_id, ConfigEntryState::SetupRetry, Some(reason.clone()))?;
                Err(SetupError::NotReady(reason).into())
            }
            Err(SetupError::Failed(reason)) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.set_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(SetupError::Failed(reason).into())
            }
        }
    }

    /// Unload an entry
    pub async fn unload_entry(
        &self,
        entry_id: &str,
        handler: &dyn EntryHandler,
    ) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        match handler.unload(&entry).await {
            Ok(()) => {
                self.set_state(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(reason) => {
                self.set_state(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(reason.clone()),
                )?;
                Err(ConfigEntriesError::Unload(reason))
            }
        }
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    /// Handler that counts calls and can be told how to fail
    #[derive(Default)]
    struct TestHandler {
        setups: AtomicU32,
        unloads: AtomicU32,
        not_ready: bool,
        fail: bool,
    }

    #[async_trait]
    impl EntryHandler for TestHandler {
        fn version(&self) -> u32 {
            3
        }

        async fn migrate(&self, entry: &mut ConfigEntry) -> Result<(), String> {
            while entry.version < 3 {
                entry.version += 1;
            }
            Ok(())
        }

        async fn setup(&self, _entry: &ConfigEntry) -> Result<(), SetupError> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if self.not_ready {
                return Err(SetupError::NotReady("device unreachable".into()));
            }
            if self.fail {
                return Err(SetupError::Failed("bad config".into()));
            }
            Ok(())
        }

        async fn unload(&self, _entry: &ConfigEntry) -> Result<(), String> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = ConfigEntry::new("bwt_perla", "BWT Perla")
            .with_host("192.168.1.10")
            .with_unique_id("device-001");

        let added = manager.add(entry).await.unwrap();
        assert_eq!(added.domain, "bwt_perla");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry1 = ConfigEntry::new("bwt_perla", "Softener 1").with_unique_id("same-id");
        let entry2 = ConfigEntry::new("bwt_perla", "Softener 2").with_unique_id("same-id");

        manager.add(entry1).await.unwrap();
        let result = manager.add(entry2).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler::default();

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Test").with_version(3, 1))
            .await
            .unwrap();

        manager.setup_entry(&entry.entry_id, &handler).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
        assert_eq!(handler.setups.load(Ordering::SeqCst), 1);

        manager.unload_entry(&entry.entry_id, &handler).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_runs_migration_first() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler::default();

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Old schema"))
            .await
            .unwrap();
        assert_eq!(entry.version, 1);

        manager.setup_entry(&entry.entry_id, &handler).await.unwrap();

        let migrated = manager.get(&entry.entry_id).unwrap();
        assert_eq!(migrated.version, 3);
        assert!(migrated.is_loaded());
    }

    #[tokio::test]
    async fn test_setup_migration_is_idempotent() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler::default();

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Current schema").with_version(3, 1))
            .await
            .unwrap();

        manager.setup_entry(&entry.entry_id, &handler).await.unwrap();
        // Version already current, nothing changed
        assert_eq!(manager.get(&entry.entry_id).unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_setup_not_ready_moves_to_retry() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler {
            not_ready: true,
            ..Default::default()
        };

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Unreachable").with_version(3, 1))
            .await
            .unwrap();

        let result = manager.setup_entry(&entry.entry_id, &handler).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::Setup(SetupError::NotReady(_)))
        ));

        let after = manager.get(&entry.entry_id).unwrap();
        assert_eq!(after.state, ConfigEntryState::SetupRetry);
        assert_eq!(after.tries, 1);
    }

    #[tokio::test]
    async fn test_setup_failure_moves_to_error() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler {
            fail: true,
            ..Default::default()
        };

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Broken").with_version(3, 1))
            .await
            .unwrap();

        let result = manager.setup_entry(&entry.entry_id, &handler).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::Setup(SetupError::Failed(_)))
        ));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
    }

    #[tokio::test]
    async fn test_unload_not_loaded_is_noop() {
        let (_dir, manager) = create_test_manager();
        let handler = TestHandler::default();

        let entry = manager
            .add(ConfigEntry::new("bwt_perla", "Never loaded"))
            .await
            .unwrap();

        manager.unload_entry(&entry.entry_id, &handler).await.unwrap();
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(
                    ConfigEntry::new("bwt_perla", "Test")
                        .with_host("10.0.0.5")
                        .with_unique_id("test-123"),
                )
                .await
                .unwrap();
        }

        {
            let manager = ConfigEntries::new(storage);
            manager.load().await.unwrap();

            assert_eq!(manager.len(), 1);
            let entry = manager.get_by_unique_id("bwt_perla", "test-123").unwrap();
            assert_eq!(entry.title, "Test");
            assert_eq!(entry.host(), Some("10.0.0.5"));
        }
    }
}
