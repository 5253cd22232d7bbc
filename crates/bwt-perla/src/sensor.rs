//! The sensor catalog: typed field extractors over the device snapshot
//!
//! One entity abstraction configured by a display-metadata record plus a
//! small closed set of variant tags for the behaviors that aren't pure
//! field extraction. Extractors perform no I/O and cannot fail; any API
//! error surfaces earlier, when the coordinator polls.

use std::collections::HashMap;

use chrono::DateTime;
use serde::Serialize;
use serde_json::json;

use bwt_api::{treated_to_blended, BwtStatus, ClientKind, CurrentData};
use bwt_core::{fmt_number, truncate_value, MAX_STATE_LENGTH, STATE_OFF, STATE_ON, STATE_UNKNOWN};

use crate::translations::{translate_code, Language};
use crate::DOMAIN;

const ICON_FAUCET: &str = "mdi:faucet";
const ICON_WATER: &str = "mdi:water";
const ICON_WARNING: &str = "mdi:alert-circle";
const ICON_ERROR: &str = "mdi:alert-decagram";
const ICON_WATER_CHECK: &str = "mdi:water-check";
const ICON_WATER_PERCENT: &str = "mdi:water-percent";
const ICON_HOLIDAY: &str = "mdi:location-exit";
const ICON_COUNTER: &str = "mdi:counter";
const ICON_CALENDAR: &str = "mdi:calendar-clock";
const ICON_UNKNOWN: &str = "mdi:help-circle";

const UNIT_LITERS: &str = "L";
const UNIT_CUBIC_METERS_PER_HOUR: &str = "m³/h";
const UNIT_HARDNESS: &str = "°dH";
const UNIT_PERCENT: &str = "%";
const UNIT_DAYS: &str = "d";

/// Attribute carrying the raw fatal code names (for automation consumption)
pub const ATTR_ERROR_CODES: &str = "error_codes";
/// Attribute carrying the raw non-fatal code names
pub const ATTR_WARNING_CODES: &str = "warning_codes";

/// Device class vocabulary used by this catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    Water,
    VolumeFlowRate,
    Enum,
    Timestamp,
}

/// Classification of how a reading accumulates over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    /// A measurement in present time
    Measurement,
    /// A monotonically increasing total
    TotalIncreasing,
}

/// Display metadata for one sensor
#[derive(Debug, Clone)]
pub struct SensorDescription {
    pub key: String,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<SensorDeviceClass>,
    pub state_class: Option<SensorStateClass>,
    pub precision: Option<u8>,
}

impl SensorDescription {
    fn new(key: impl Into<String>, icon: &'static str) -> Self {
        Self {
            key: key.into(),
            icon,
            unit: None,
            device_class: None,
            state_class: None,
            precision: None,
        }
    }

    fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    fn device_class(mut self, device_class: SensorDeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    fn state_class(mut self, state_class: SensorStateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }
}

/// Field accessor against the shared snapshot
pub type Extractor = fn(&CurrentData) -> f64;

/// The closed set of extractor behaviors
pub enum SensorVariant {
    /// Pure numeric field extraction
    Value(Extractor),
    /// Machine status, published as its name
    StateEnum,
    /// Holiday mode flag: raw value equal to 1
    HolidayFlag,
    /// Scheduled holiday start: raw value above 1 is a unix timestamp
    HolidayStart,
    /// Error/warning code list partitioned by the fatal flag
    Alarms { fatal: bool },
    /// Raw register value by index (partially decoded firmware)
    Register(usize),
}

/// One published sensor: a (field-accessor, display-metadata) binding.
///
/// Created once at platform setup; immutable for the entity's lifetime;
/// re-read against the latest snapshot on every coordinator notification.
pub struct BwtSensor {
    /// Stable entity identifier `sensor.<domain>_<key>`
    pub entity_id: String,
    /// Unique id `<entry_id>_<key>`
    pub unique_id: String,
    pub description: SensorDescription,
    pub variant: SensorVariant,
}

impl BwtSensor {
    pub fn new(entry_id: &str, description: SensorDescription, variant: SensorVariant) -> Self {
        Self {
            entity_id: format!("sensor.{}_{}", DOMAIN, description.key),
            unique_id: format!("{}_{}", entry_id, description.key),
            description,
            variant,
        }
    }

    /// Derive the published value and attributes from a snapshot
    pub fn state(
        &self,
        data: &CurrentData,
        language: Language,
    ) -> (String, HashMap<String, serde_json::Value>) {
        let mut attributes = self.base_attributes();

        let value = match &self.variant {
            SensorVariant::Value(extract) => {
                fmt_number(extract(data), self.description.precision)
            }
            SensorVariant::StateEnum => {
                let options: Vec<&str> = BwtStatus::VARIANTS.iter().map(|s| s.as_str()).collect();
                attributes.insert("options".to_string(), json!(options));
                data.state.as_str().to_string()
            }
            SensorVariant::HolidayFlag => {
                if data.holiday_mode == 1 {
                    STATE_ON.to_string()
                } else {
                    STATE_OFF.to_string()
                }
            }
            SensorVariant::HolidayStart => match data.holiday_mode {
                ts if ts > 1 => DateTime::from_timestamp(ts, 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| STATE_UNKNOWN.to_string()),
                _ => STATE_UNKNOWN.to_string(),
            },
            SensorVariant::Alarms { fatal } => {
                let codes = data.alarms_by_fatality(*fatal);
                let raw: Vec<&str> = codes.iter().map(|c| c.name.as_str()).collect();
                let attr_key = if *fatal {
                    ATTR_ERROR_CODES
                } else {
                    ATTR_WARNING_CODES
                };
                attributes.insert(attr_key.to_string(), json!(raw));

                if codes.is_empty() {
                    String::new()
                } else {
                    let translated: Vec<&str> = codes
                        .iter()
                        .map(|c| translate_code(&c.name, language))
                        .collect();
                    let joined = translated.join(", ");
                    truncate_value(Some(&joined), MAX_STATE_LENGTH)
                }
            }
            SensorVariant::Register(index) => match data.register(*index) {
                Some(value) => value.to_string(),
                None => STATE_UNKNOWN.to_string(),
            },
        };

        (value, attributes)
    }

    fn base_attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut attributes = HashMap::new();
        attributes.insert("icon".to_string(), json!(self.description.icon));
        if let Some(unit) = self.description.unit {
            attributes.insert("unit_of_measurement".to_string(), json!(unit));
        }
        if let Some(device_class) = self.description.device_class {
            attributes.insert("device_class".to_string(), json!(device_class));
        }
        if let Some(state_class) = self.description.state_class {
            attributes.insert("state_class".to_string(), json!(state_class));
        }
        attributes
    }
}

/// Build the sensor set for one config entry.
///
/// Perla devices get the full telemetry catalog; silk devices expose only
/// one debug sensor per raw register.
pub fn catalog(entry_id: &str, kind: ClientKind, register_count: usize) -> Vec<BwtSensor> {
    match kind {
        ClientKind::Perla => perla_catalog(entry_id),
        ClientKind::Silk => (0..register_count)
            .map(|index| {
                BwtSensor::new(
                    entry_id,
                    SensorDescription::new(format!("silk_register_{index}"), ICON_UNKNOWN),
                    SensorVariant::Register(index),
                )
            })
            .collect(),
    }
}

fn total_sensor(entry_id: &str, key: &str, extract: Extractor) -> BwtSensor {
    BwtSensor::new(
        entry_id,
        SensorDescription::new(key, ICON_WATER)
            .unit(UNIT_LITERS)
            .device_class(SensorDeviceClass::Water)
            .state_class(SensorStateClass::TotalIncreasing)
            .precision(0),
        SensorVariant::Value(extract),
    )
}

fn perla_catalog(entry_id: &str) -> Vec<BwtSensor> {
    vec![
        // Treated water totals
        total_sensor(entry_id, "total_output", |d| d.total_output as f64),
        total_sensor(entry_id, "day_output", |d| d.day_output as f64),
        total_sensor(entry_id, "month_output", |d| d.month_output as f64),
        total_sensor(entry_id, "year_output", |d| d.year_output as f64),
        // Blended water, derived from the treated amounts
        total_sensor(entry_id, "blended_day", |d| {
            treated_to_blended(d.day_output, d.hardness_in, d.hardness_out) as f64
        }),
        total_sensor(entry_id, "blended_month", |d| {
            treated_to_blended(d.month_output, d.hardness_in, d.hardness_out) as f64
        }),
        total_sensor(entry_id, "blended_year", |d| {
            treated_to_blended(d.year_output, d.hardness_in, d.hardness_out) as f64
        }),
        // The device reports l/h, published unit is m³/h
        BwtSensor::new(
            entry_id,
            SensorDescription::new("current_flow", ICON_FAUCET)
                .unit(UNIT_CUBIC_METERS_PER_HOUR)
                .device_class(SensorDeviceClass::VolumeFlowRate)
                .state_class(SensorStateClass::Measurement)
                .precision(3),
            SensorVariant::Value(|d| f64::from(d.current_flow) / 1000.0),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("hardness_in", ICON_WATER_PERCENT)
                .unit(UNIT_HARDNESS)
                .state_class(SensorStateClass::Measurement),
            SensorVariant::Value(|d| f64::from(d.hardness_in)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("hardness_out", ICON_WATER_PERCENT)
                .unit(UNIT_HARDNESS)
                .state_class(SensorStateClass::Measurement),
            SensorVariant::Value(|d| f64::from(d.hardness_out)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("capacity_1", ICON_WATER)
                .unit(UNIT_LITERS)
                .device_class(SensorDeviceClass::Water)
                .state_class(SensorStateClass::Measurement)
                .precision(0),
            SensorVariant::Value(|d| f64::from(d.capacity_1)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("capacity_2", ICON_WATER)
                .unit(UNIT_LITERS)
                .device_class(SensorDeviceClass::Water)
                .state_class(SensorStateClass::Measurement)
                .precision(0),
            SensorVariant::Value(|d| f64::from(d.capacity_2)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("regeneration_count_1", ICON_COUNTER)
                .state_class(SensorStateClass::TotalIncreasing),
            SensorVariant::Value(|d| f64::from(d.regeneration_count_1)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("regeneration_count_2", ICON_COUNTER)
                .state_class(SensorStateClass::TotalIncreasing),
            SensorVariant::Value(|d| f64::from(d.regeneration_count_2)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("regenerativ_level", ICON_WATER_PERCENT)
                .unit(UNIT_PERCENT)
                .state_class(SensorStateClass::Measurement),
            SensorVariant::Value(|d| f64::from(d.regenerativ_level)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("regenerativ_days", ICON_CALENDAR)
                .unit(UNIT_DAYS)
                .state_class(SensorStateClass::Measurement),
            SensorVariant::Value(|d| f64::from(d.regenerativ_days)),
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("state", ICON_WATER_CHECK)
                .device_class(SensorDeviceClass::Enum),
            SensorVariant::StateEnum,
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("holiday_mode", ICON_HOLIDAY),
            SensorVariant::HolidayFlag,
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("holiday_mode_start", ICON_HOLIDAY)
                .device_class(SensorDeviceClass::Timestamp),
            SensorVariant::HolidayStart,
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("errors", ICON_ERROR),
            SensorVariant::Alarms { fatal: true },
        ),
        BwtSensor::new(
            entry_id,
            SensorDescription::new("warnings", ICON_WARNING),
            SensorVariant::Alarms { fatal: false },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwt_api::AlarmCode;

    fn find<'a>(sensors: &'a [BwtSensor], key: &str) -> &'a BwtSensor {
        sensors
            .iter()
            .find(|s| s.description.key == key)
            .unwrap_or_else(|| panic!("missing sensor {key}"))
    }

    #[test]
    fn test_catalog_identifiers() {
        let sensors = catalog("entry1", ClientKind::Perla, 0);
        let total = find(&sensors, "total_output");
        assert_eq!(total.entity_id, "sensor.bwt_perla_total_output");
        assert_eq!(total.unique_id, "entry1_total_output");
    }

    #[test]
    fn test_silk_catalog_is_register_only() {
        let sensors = catalog("entry1", ClientKind::Silk, 3);
        assert_eq!(sensors.len(), 3);
        assert_eq!(sensors[2].entity_id, "sensor.bwt_perla_silk_register_2");
        assert!(matches!(sensors[2].variant, SensorVariant::Register(2)));
    }

    #[test]
    fn test_current_flow_division() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let flow = find(&sensors, "current_flow");

        let data = CurrentData {
            current_flow: 1500,
            ..Default::default()
        };
        let (value, attributes) = flow.state(&data, Language::En);
        assert_eq!(value, "1.5");
        assert_eq!(attributes["unit_of_measurement"], json!("m³/h"));
        assert_eq!(attributes["device_class"], json!("volume_flow_rate"));
        assert_eq!(attributes["state_class"], json!("measurement"));
    }

    #[test]
    fn test_total_output() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let total = find(&sensors, "total_output");

        let data = CurrentData {
            total_output: 123456,
            ..Default::default()
        };
        let (value, attributes) = total.state(&data, Language::En);
        assert_eq!(value, "123456");
        assert_eq!(attributes["state_class"], json!("total_increasing"));
        assert_eq!(attributes["device_class"], json!("water"));
    }

    #[test]
    fn test_blended_day_derivation() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let blended = find(&sensors, "blended_day");

        let data = CurrentData {
            day_output: 1500,
            hardness_in: 20,
            hardness_out: 5,
            ..Default::default()
        };
        let (value, _) = blended.state(&data, Language::En);
        assert_eq!(value, "2000");
    }

    #[test]
    fn test_state_enum() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let state = find(&sensors, "state");

        let data = CurrentData {
            state: BwtStatus::Regeneration,
            ..Default::default()
        };
        let (value, attributes) = state.state(&data, Language::En);
        assert_eq!(value, "REGENERATION");
        assert_eq!(
            attributes["options"],
            json!(["OK", "REGENERATION", "WARNING", "ERROR"])
        );
    }

    #[test]
    fn test_holiday_flag() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let flag = find(&sensors, "holiday_mode");

        let off = CurrentData::default();
        assert_eq!(flag.state(&off, Language::En).0, "off");

        let on = CurrentData {
            holiday_mode: 1,
            ..Default::default()
        };
        assert_eq!(flag.state(&on, Language::En).0, "on");

        // A scheduled future start does not mean active
        let scheduled = CurrentData {
            holiday_mode: 1700000000,
            ..Default::default()
        };
        assert_eq!(flag.state(&scheduled, Language::En).0, "off");
    }

    #[test]
    fn test_holiday_start() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let start = find(&sensors, "holiday_mode_start");

        for raw in [0, 1] {
            let data = CurrentData {
                holiday_mode: raw,
                ..Default::default()
            };
            assert_eq!(start.state(&data, Language::En).0, STATE_UNKNOWN);
        }

        let data = CurrentData {
            holiday_mode: 1700000000,
            ..Default::default()
        };
        let expected = DateTime::from_timestamp(1700000000, 0).unwrap().to_rfc3339();
        assert_eq!(start.state(&data, Language::En).0, expected);
    }

    #[test]
    fn test_error_sensor_partition() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let errors = find(&sensors, "errors");
        let warnings = find(&sensors, "warnings");

        let data = CurrentData {
            alarms: vec![
                AlarmCode::new("STOP_VOLUME", true),
                AlarmCode::new("REGENERATIV_20", false),
            ],
            ..Default::default()
        };

        let (value, attributes) = errors.state(&data, Language::En);
        assert_eq!(value, "Stop volume");
        assert_eq!(attributes[ATTR_ERROR_CODES], json!(["STOP_VOLUME"]));

        let (value, attributes) = warnings.state(&data, Language::En);
        assert_eq!(value, "Regeneration salt level < 20%");
        assert_eq!(attributes[ATTR_WARNING_CODES], json!(["REGENERATIV_20"]));
    }

    #[test]
    fn test_error_sensor_german() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let errors = find(&sensors, "errors");

        let data = CurrentData {
            alarms: vec![AlarmCode::new("STOP_VOLUME", true)],
            ..Default::default()
        };
        let (value, _) = errors.state(&data, Language::De);
        assert_eq!(value, "Volumen-Stopp");
    }

    #[test]
    fn test_error_sensor_empty() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let errors = find(&sensors, "errors");

        let (value, attributes) = errors.state(&CurrentData::default(), Language::En);
        assert_eq!(value, "");
        assert_eq!(attributes[ATTR_ERROR_CODES], json!([]));
    }

    #[test]
    fn test_error_sensor_unknown_code_falls_back() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let errors = find(&sensors, "errors");

        let data = CurrentData {
            alarms: vec![AlarmCode::new("ERROR_200", true)],
            ..Default::default()
        };
        let (value, _) = errors.state(&data, Language::En);
        assert_eq!(value, "ERROR_200");
    }

    #[test]
    fn test_error_sensor_truncated_at_255() {
        let sensors = catalog("e1", ClientKind::Perla, 0);
        let errors = find(&sensors, "errors");

        let alarms: Vec<AlarmCode> = (0..30)
            .map(|i| AlarmCode::new(format!("VERY_LONG_UNTRANSLATED_CODE_{i:02}"), true))
            .collect();
        let data = CurrentData {
            alarms,
            ..Default::default()
        };

        let (value, attributes) = errors.state(&data, Language::En);
        assert_eq!(value.chars().count(), MAX_STATE_LENGTH);
        assert!(value.ends_with("..."));
        // The side attribute keeps the full raw list
        let raw: Vec<String> =
            serde_json::from_value(attributes[ATTR_ERROR_CODES].clone()).unwrap();
        assert_eq!(raw.len(), 30);
    }

    #[test]
    fn test_register_sensor() {
        let sensors = catalog("e1", ClientKind::Silk, 2);
        let data = CurrentData::from_registers(vec![7, 42]);

        assert_eq!(sensors[1].state(&data, Language::En).0, "42");

        // Register missing from a short register block
        let short = CurrentData::from_registers(vec![7]);
        assert_eq!(sensors[1].state(&short, Language::En).0, STATE_UNKNOWN);
    }
}
