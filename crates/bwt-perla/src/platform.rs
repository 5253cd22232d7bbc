//! Sensor platform fan-out
//!
//! One task per config entry subscribes to the coordinator and re-reads
//! every extractor against the shared snapshot on each notification. All
//! sensors of an entry observe the same `Arc<CurrentData>` per cycle.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use bwt_coordinator::DataCoordinator;
use bwt_registries::EntityRegistry;
use bwt_state_store::StateStore;

use crate::sensor::BwtSensor;
use crate::translations::Language;
use crate::DOMAIN;

/// Running sensor platform for one config entry
pub struct PlatformHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    entity_ids: Vec<String>,
    states: Arc<StateStore>,
}

impl PlatformHandle {
    /// Stop the update task and drop the entry's published states
    pub async fn teardown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.task.await;
        for entity_id in &self.entity_ids {
            self.states.remove(entity_id);
        }
        debug!("platform torn down");
    }
}

/// Register the entry's sensors, seed their states from the current
/// snapshot, and start the update fan-out task.
pub fn setup_platform(
    entry_id: &str,
    sensors: Vec<BwtSensor>,
    coordinator: &Arc<DataCoordinator>,
    registry: &Arc<EntityRegistry>,
    states: &Arc<StateStore>,
    language: Language,
) -> PlatformHandle {
    let entity_ids: Vec<String> = sensors.iter().map(|s| s.entity_id.clone()).collect();

    // Register and seed from the snapshot the coordinator already holds
    let snapshot = coordinator.data();
    for sensor in &sensors {
        let entry = registry.get_or_create(
            DOMAIN,
            &sensor.entity_id,
            Some(&sensor.unique_id),
            Some(entry_id),
        );
        if entry.translation_key.is_none() {
            let key = sensor.description.key.clone();
            let _ = registry.update(&entry.entity_id, move |e| {
                e.translation_key = Some(key);
            });
        }

        let (value, attributes) = sensor.state(&snapshot, language);
        states.set(&sensor.entity_id, value, attributes);
    }
    info!(entry_id, count = sensors.len(), "sensor platform set up");

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut rx = coordinator.subscribe();
    let task_states = Arc::clone(states);
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Coordinator dropped; nothing more will arrive
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    for sensor in &sensors {
                        let (value, attributes) = sensor.state(&snapshot, language);
                        task_states.set(&sensor.entity_id, value, attributes);
                    }
                }
            }
        }
    });

    PlatformHandle {
        stop: Some(stop_tx),
        task,
        entity_ids,
        states: Arc::clone(states),
    }
}
