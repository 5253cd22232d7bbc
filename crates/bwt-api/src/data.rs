//! Snapshot data model for one successful device poll

use serde::{Deserialize, Serialize};

use crate::codes::AlarmCode;

/// Machine status reported by the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BwtStatus {
    #[default]
    Ok,
    Regeneration,
    Warning,
    Error,
}

impl BwtStatus {
    /// All variants, in wire order (used as enum-sensor options)
    pub const VARIANTS: [BwtStatus; 4] = [
        BwtStatus::Ok,
        BwtStatus::Regeneration,
        BwtStatus::Warning,
        BwtStatus::Error,
    ];

    /// Decode the status byte from the wire document
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => BwtStatus::Regeneration,
            2 => BwtStatus::Warning,
            3 => BwtStatus::Error,
            _ => BwtStatus::Ok,
        }
    }

    /// Uppercase name, published by the state sensor
    pub fn as_str(&self) -> &'static str {
        match self {
            BwtStatus::Ok => "OK",
            BwtStatus::Regeneration => "REGENERATION",
            BwtStatus::Warning => "WARNING",
            BwtStatus::Error => "ERROR",
        }
    }
}

/// The single most-recent successful poll result.
///
/// Replaced wholesale by the coordinator on each successful poll and handed
/// to consumers behind an `Arc`; nothing mutates it after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    /// Current flow through the output [l/h]
    pub current_flow: u32,
    /// Treated water since installation [l]
    pub total_output: u64,
    /// Treated water today [l]
    pub day_output: u64,
    /// Treated water this month [l]
    pub month_output: u64,
    /// Treated water this year [l]
    pub year_output: u64,
    /// Inlet water hardness [°dH]
    pub hardness_in: u16,
    /// Outlet (blended) water hardness [°dH]
    pub hardness_out: u16,
    /// Remaining capacity of column 1 [l]
    pub capacity_1: u32,
    /// Remaining capacity of column 2 [l]
    pub capacity_2: u32,
    /// Regeneration count of column 1
    pub regeneration_count_1: u32,
    /// Regeneration count of column 2
    pub regeneration_count_2: u32,
    /// Regenerant (salt) fill level [%]
    pub regenerativ_level: u8,
    /// Days the remaining regenerant is expected to last
    pub regenerativ_days: u16,
    /// Machine status
    pub state: BwtStatus,
    /// Holiday mode: 0 = off, 1 = active, >1 = unix timestamp of a
    /// scheduled future start
    pub holiday_mode: i64,
    /// Active error/warning codes
    pub alarms: Vec<AlarmCode>,
    /// Raw register block (silk devices; empty for the full API)
    pub registers: Vec<u16>,
}

impl CurrentData {
    /// Wrap a raw register block into a snapshot (silk devices)
    pub fn from_registers(registers: Vec<u16>) -> Self {
        Self {
            registers,
            ..Default::default()
        }
    }

    /// Register value by index, if present
    pub fn register(&self, index: usize) -> Option<u16> {
        self.registers.get(index).copied()
    }

    /// Alarms partitioned by the fatal flag
    pub fn alarms_by_fatality(&self, fatal: bool) -> Vec<&AlarmCode> {
        self.alarms.iter().filter(|a| a.fatal == fatal).collect()
    }
}

/// Derive the blended water amount from a treated amount.
///
/// The appliance softens to zero hardness and blends raw inlet water back in
/// to reach the configured outlet hardness, so the delivered (blended)
/// volume exceeds the treated volume by the blending ratio. Degenerate
/// hardness configurations fall back to the treated amount.
pub fn treated_to_blended(treated: u64, hardness_in: u16, hardness_out: u16) -> u64 {
    if hardness_out >= hardness_in || hardness_in == 0 {
        return treated;
    }
    let ratio = f64::from(hardness_in) / f64::from(hardness_in - hardness_out);
    (treated as f64 * ratio).round() as u64
}
