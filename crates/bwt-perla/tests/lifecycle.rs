//! End-to-end lifecycle: manager-driven migration, setup, and unload
//! against a scripted device client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bwt_api::{ApiError, BwtClient, ClientKind, CurrentData};
use bwt_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, SetupError};
use bwt_perla::{BwtIntegration, Language, CONFIG_VERSION, DOMAIN};
use bwt_registries::{EntityRegistry, Storage};
use bwt_state_store::StateStore;
use tempfile::TempDir;

struct MockClient {
    fail: AtomicBool,
    data: CurrentData,
}

#[async_trait]
impl BwtClient for MockClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Perla
    }

    async fn poll(&self) -> Result<CurrentData, ApiError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Status(503));
        }
        Ok(self.data.clone())
    }

    async fn close(&self) {}
}

struct Harness {
    _dir: TempDir,
    manager: ConfigEntries,
    registry: Arc<EntityRegistry>,
    states: Arc<StateStore>,
    integration: BwtIntegration,
    client: Arc<MockClient>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(Storage::new(dir.path()));
    let manager = ConfigEntries::new(Arc::clone(&storage));
    let registry = Arc::new(EntityRegistry::new(storage));
    let states = Arc::new(StateStore::new());

    let client = Arc::new(MockClient {
        fail: AtomicBool::new(false),
        data: CurrentData {
            current_flow: 1500,
            total_output: 123456,
            hardness_in: 20,
            hardness_out: 5,
            ..Default::default()
        },
    });

    let factory_client = Arc::clone(&client);
    let integration = BwtIntegration::with_client_factory(
        Arc::clone(&registry),
        Arc::clone(&states),
        Language::En,
        Duration::from_secs(30),
        Box::new(move |_| Ok(Arc::clone(&factory_client) as Arc<dyn BwtClient>)),
    );

    Harness {
        _dir: dir,
        manager,
        registry,
        states,
        integration,
        client,
    }
}

#[tokio::test]
async fn full_lifecycle_with_migration() {
    let h = harness();

    // A version-1 entry with a pre-existing legacy entity
    let entry = h
        .manager
        .add(
            ConfigEntry::new(DOMAIN, "Cellar softener")
                .with_host("192.168.1.10")
                .with_code(1234),
        )
        .await
        .unwrap();
    h.registry.get_or_create(
        DOMAIN,
        "sensor.bwt_perla_total_output",
        Some("total_output"),
        Some(&entry.entry_id),
    );

    h.manager
        .setup_entry(&entry.entry_id, &h.integration)
        .await
        .unwrap();

    // Migration bumped the schema and prefixed the legacy unique id
    let migrated = h.manager.get(&entry.entry_id).unwrap();
    assert_eq!(migrated.version, CONFIG_VERSION);
    assert!(migrated.is_loaded());
    let legacy = h.registry.get("sensor.bwt_perla_total_output").unwrap();
    assert_eq!(
        legacy.unique_id.as_deref(),
        Some(format!("{}_total_output", entry.entry_id).as_str())
    );

    // The full catalog is published
    assert_eq!(
        h.states.get_value("sensor.bwt_perla_current_flow"),
        Some("1.5".to_string())
    );
    assert_eq!(
        h.states.get_value("sensor.bwt_perla_blended_day"),
        Some("0".to_string())
    );

    h.manager
        .unload_entry(&entry.entry_id, &h.integration)
        .await
        .unwrap();
    assert!(h.states.is_empty());
}

#[tokio::test]
async fn unreachable_device_is_retried_later() {
    let h = harness();
    h.client.fail.store(true, Ordering::SeqCst);

    let entry = h
        .manager
        .add(
            ConfigEntry::new(DOMAIN, "Unreachable")
                .with_host("192.168.1.10")
                .with_code(1234)
                .with_version(CONFIG_VERSION, 1),
        )
        .await
        .unwrap();

    let result = h.manager.setup_entry(&entry.entry_id, &h.integration).await;
    assert!(matches!(
        result,
        Err(ConfigEntriesError::Setup(SetupError::NotReady(_)))
    ));
    assert!(h.states.is_empty());

    // Device comes back; the retry succeeds
    h.client.fail.store(false, Ordering::SeqCst);
    h.manager
        .setup_entry(&entry.entry_id, &h.integration)
        .await
        .unwrap();
    assert!(h.manager.get(&entry.entry_id).unwrap().is_loaded());
    assert!(!h.states.is_empty());

    h.manager
        .unload_entry(&entry.entry_id, &h.integration)
        .await
        .unwrap();
}
