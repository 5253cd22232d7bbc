//! Device alarm code decoding

use serde::{Deserialize, Serialize};

/// An active error/warning code reported by the appliance.
///
/// The fatal flag decides which derived sensor the code surfaces in:
/// fatal codes feed the errors sensor, non-fatal ones the warnings sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmCode {
    pub name: String,
    pub fatal: bool,
}

/// Alarm id table as documented for the Perla firmware. The boolean marks
/// fatal codes (the machine has stopped treating water).
const ALARM_TABLE: &[(u8, &str, bool)] = &[
    (1, "OFFLINE_MOTOR_1", true),
    (2, "OFFLINE_MOTOR_2", true),
    (3, "OFFLINE_MOTOR_BLEND", true),
    (4, "REGENERATIV_20", false),
    (5, "OVERCURRENT_MOTOR_1", true),
    (6, "OVERCURRENT_MOTOR_2", true),
    (7, "OVERCURRENT_MOTOR_3", true),
    (8, "OVERCURRENT_VALVE", true),
    (9, "STOP_VOLUME", true),
    (10, "STOP_SENSOR", true),
    (11, "CONSTANT_FLOW", false),
    (12, "LOW_PRESSURE", false),
    (13, "PISTON_POSITION", true),
    (14, "ELECTRONIC", true),
    (15, "INSUFFICIENT_REGENERATIV", false),
    (16, "STOP_WIRELESS_SENSOR", true),
    (17, "REGENERATIV_0", false),
    (18, "MAINTENANCE_CUSTOMER", false),
    (19, "INSPECTION_CUSTOMER", false),
    (20, "MAINTENANCE_SERVICE", false),
    (21, "MINERALS_LOW", false),
    (22, "MINERALS_0", false),
    (23, "OVERCURRENT_VALVE_1", true),
    (24, "OVERCURRENT_VALVE_2", true),
    (25, "OVERCURRENT_DOSING", true),
    (26, "OVERCURRENT_VALVE_BALL", true),
    (27, "METER_NOT_COUNTING", true),
    (28, "REGENERATION_DRAIN", false),
    (29, "INIT_PCB_0", true),
    (30, "INIT_PCB_1", true),
    (31, "POSITION_MOTOR_1", true),
    (32, "POSITION_MOTOR_2", true),
    (33, "CONDUCTIVITY_HIGH", false),
    (34, "CONDUCTIVITY_LIMIT_1", false),
    (35, "CONDUCTIVITY_LIMIT_2", true),
    (36, "CONDUCTIVITY_LIMIT_WATER", false),
    (37, "NO_FUNCTION", true),
    (38, "TEMPERATURE_DISCONNECTED", false),
    (39, "TEMPERATURE_HIGH", false),
    (40, "OFFLINE_VALVE_BALL", true),
    (41, "EXTERNAL_FILTER_CHANGE", false),
    (42, "BRINE_UNSATURATED", false),
    (43, "DOSING_FAULT", true),
];

impl AlarmCode {
    pub fn new(name: impl Into<String>, fatal: bool) -> Self {
        Self {
            name: name.into(),
            fatal,
        }
    }

    /// Decode a wire alarm id.
    ///
    /// Ids missing from the table decode to a synthetic `ERROR_<id>` code so
    /// an unknown firmware alarm still surfaces instead of failing the poll.
    pub fn from_id(id: u8) -> Self {
        match ALARM_TABLE.iter().find(|(i, _, _)| *i == id) {
            Some((_, name, fatal)) => Self::new(*name, *fatal),
            None => Self::new(format!("ERROR_{id}"), false),
        }
    }
}
