//! The BWT Perla integration
//!
//! Exposes a water-treatment appliance's telemetry as observable sensor
//! states. A thin adapter: the coordinator polls the device API, the sensor
//! catalog maps snapshot fields onto published states, and the lifecycle
//! glue wires setup, unload, and config migration into the config-entry
//! manager.

pub mod config;
pub mod integration;
pub mod platform;
pub mod sensor;
pub mod translations;

pub use config::IntegrationConfig;
pub use integration::BwtIntegration;
pub use sensor::{BwtSensor, SensorDescription, SensorDeviceClass, SensorStateClass, SensorVariant};
pub use translations::{translate_code, Language};

/// Integration domain
pub const DOMAIN: &str = "bwt_perla";

/// Current config entry schema version
pub const CONFIG_VERSION: u32 = 3;
