//! Accumulated battery state, owned by the register walk and published
//! incrementally through the sink.

use heapless::{String, Vec};

use crate::registers::manager_state_cont;

/// Longest identity string the battery can report (one SMBus block).
pub const MAX_STRING_LEN: usize = 32;

/// Cells in the pack's voltage group.
pub const CELL_COUNT: usize = 4;

/// Why the system manager is refusing to charge, from the reserved
/// bits 14/15 of the state-continuation word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeStatusReason {
    TooHot,
    TooCold,
    TemperatureGradient,
}

impl ChargeStatusReason {
    /// Decode the bit pattern: bit 14 alone reads too-cold, bit 15
    /// alone too-hot, both a cell temperature gradient, neither clears
    /// the condition.
    pub fn from_state_cont(word: u16) -> Option<ChargeStatusReason> {
        let cold = word & manager_state_cont::CHARGE_INHIBIT_COLD != 0;
        let hot = word & manager_state_cont::CHARGE_INHIBIT_HOT != 0;
        match (hot, cold) {
            (true, true) => Some(ChargeStatusReason::TemperatureGradient),
            (true, false) => Some(ChargeStatusReason::TooHot),
            (false, true) => Some(ChargeStatusReason::TooCold),
            (false, false) => None,
        }
    }
}

/// Manufacture date bitfield: day in bits 0-4, month in bits 5-8,
/// years since 1980 in bits 9-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManufactureDate {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl ManufactureDate {
    pub fn from_word(word: u16) -> ManufactureDate {
        ManufactureDate {
            day: (word & 0x1f) as u8,
            month: ((word >> 5) & 0x0f) as u8,
            year: 1980 + (word >> 9),
        }
    }
}

/// Everything the walk has learned about the battery. Created once at
/// manager start and mutated in place by every poll; a removal resets
/// the fields to their absent defaults without destroying the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatterySnapshot {
    /// `None` until the first manager read resolves it.
    pub battery_present: Option<bool>,
    pub ac_connected: Option<bool>,
    pub ac_charge_capable: bool,
    pub is_charging: bool,
    pub fully_charged: bool,
    pub fully_discharged: bool,
    pub permanent_failure: bool,
    pub charge_status: Option<ChargeStatusReason>,

    pub remaining_capacity: u16,
    pub full_charge_capacity: u16,
    pub design_capacity: u16,
    pub average_current: i16,
    pub instant_current: i16,
    pub voltage: u16,
    pub max_error_pct: u16,
    pub cycle_count: u16,
    pub temperature: u16,
    pub average_time_to_empty: u16,
    pub instant_time_to_empty: u16,
    pub average_time_to_full: u16,
    /// Whichever of the time estimates the sign of `average_current`
    /// selects for display.
    pub time_remaining: u16,

    /// Transient group buffer, cleared at the start of the cell-voltage
    /// read group and published only when all four entries landed.
    pub cell_voltages: Vec<u16, CELL_COUNT>,

    // identity fields, populated on the new-battery path only
    pub manufacturer_name: String<MAX_STRING_LEN>,
    pub manufacturer_data: Vec<u8, MAX_STRING_LEN>,
    pub manufacture_date: u16,
    pub firmware_serial: u16,
    pub hardware_serial: String<MAX_STRING_LEN>,
    pub device_name: String<MAX_STRING_LEN>,
    pub pack_reserve: u16,
    pub pf_status: u16,
    pub operation_status: u16,
}

impl BatterySnapshot {
    pub fn new() -> BatterySnapshot {
        BatterySnapshot::default()
    }

    /// Reset to the absent-battery defaults. AC state belongs to the
    /// system manager, not the battery, and survives a removal.
    pub fn clear_battery_state(&mut self) {
        let ac_connected = self.ac_connected;
        let ac_charge_capable = self.ac_charge_capable;
        *self = BatterySnapshot::default();
        self.battery_present = Some(false);
        self.ac_connected = ac_connected;
        self.ac_charge_capable = ac_charge_capable;
    }
}
