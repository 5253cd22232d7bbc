//! Config Entries
//!
//! A config entry represents one configured appliance (host plus optional
//! access code) and carries the persisted schema version that drives the
//! one-time identifier migrations. The manager owns storage, enforces the
//! lifecycle state machine, and drives the integration's [`EntryHandler`]
//! through migrate, setup, and unload.

pub mod entry;
pub mod manager;
pub mod state_machine;

pub use entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate, CONF_CODE, CONF_HOST};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, EntryHandler,
    SetupError, STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
