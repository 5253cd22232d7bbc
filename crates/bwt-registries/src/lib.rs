//! Persistence and the entity registry
//!
//! [`Storage`] implements the versioned-JSON `.storage/` directory pattern;
//! [`EntityRegistry`] tracks every published entity with unique-id and
//! config-entry indexes and supports the bulk identifier rewrites the
//! schema migrations perform.

pub mod entity_registry;
pub mod storage;

pub use entity_registry::{EntityEntry, EntityRegistry, EntityRegistryError};
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
