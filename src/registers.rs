//! SMBus addresses, command bytes, and status bit masks for the smart
//! battery and the battery system manager.

// 7-bit device addresses on the shared bus
pub const BATTERY_ADDR: u8 = 0x0b;
pub const MANAGER_ADDR: u8 = 0x0a;
pub const CHARGER_ADDR: u8 = 0x09;

/// Smart battery command bytes (word reads unless stated otherwise).
pub mod battery_cmd {
    pub const MANUFACTURER_ACCESS: u8 = 0x00;
    pub const TEMPERATURE: u8 = 0x08;
    pub const VOLTAGE: u8 = 0x09;
    pub const CURRENT: u8 = 0x0a; // signed
    pub const AVERAGE_CURRENT: u8 = 0x0b; // signed
    pub const MAX_ERROR: u8 = 0x0c;
    pub const REMAINING_CAPACITY: u8 = 0x0f;
    pub const FULL_CHARGE_CAPACITY: u8 = 0x10;
    pub const RUN_TIME_TO_EMPTY: u8 = 0x11;
    pub const AVERAGE_TIME_TO_EMPTY: u8 = 0x12;
    pub const AVERAGE_TIME_TO_FULL: u8 = 0x13;
    pub const BATTERY_STATUS: u8 = 0x16;
    pub const CYCLE_COUNT: u8 = 0x17;
    pub const DESIGN_CAPACITY: u8 = 0x18;
    pub const MANUFACTURE_DATE: u8 = 0x1b;
    pub const SERIAL_NUMBER: u8 = 0x1c;
    pub const MANUFACTURER_NAME: u8 = 0x20; // block
    pub const DEVICE_NAME: u8 = 0x21; // block
    pub const MANUFACTURER_DATA: u8 = 0x23; // block

    // cell voltages are read in command-descending order, cell 1 first
    pub const CELL_VOLTAGE_4: u8 = 0x3c;
    pub const CELL_VOLTAGE_3: u8 = 0x3d;
    pub const CELL_VOLTAGE_2: u8 = 0x3e;
    pub const CELL_VOLTAGE_1: u8 = 0x3f;

    // vendor range
    pub const HARDWARE_SERIAL: u8 = 0x76; // block
    pub const PACK_RESERVE: u8 = 0x8b;
}

/// Selector words written to `MANUFACTURER_ACCESS` ahead of the paired
/// read of the same command.
pub mod manufacturer_access {
    pub const EXTENDED_PF_STATUS: u16 = 0x0053;
    pub const EXTENDED_OPERATION_STATUS: u16 = 0x0054;
}

/// Bit masks in the `BATTERY_STATUS` word.
pub mod battery_status {
    pub const FULLY_DISCHARGED: u16 = 0x0010;
    pub const FULLY_CHARGED: u16 = 0x0020;
    pub const TERMINATE_DISCHARGE_ALARM: u16 = 0x0800;
    pub const TERMINATE_CHARGE_ALARM: u16 = 0x4000;
}

/// Battery system manager command bytes.
pub mod manager_cmd {
    pub const BATTERY_SYSTEM_STATE: u8 = 0x01;
    pub const BATTERY_SYSTEM_STATE_CONT: u8 = 0x02;
}

/// Bit masks in the manager `BATTERY_SYSTEM_STATE` word.
pub mod manager_state {
    pub const BATTERY_A_PRESENT: u16 = 0x0001;
    pub const CHARGING_A: u16 = 0x0010;
}

/// Bit masks in the manager `BATTERY_SYSTEM_STATE_CONT` word.
///
/// Bits 14/15 are reserved charge-inhibit reason bits; their four
/// combinations map onto [`crate::snapshot::ChargeStatusReason`].
pub mod manager_state_cont {
    pub const AC_PRESENT: u16 = 0x0001;
    pub const POWER_NOT_GOOD: u16 = 0x0002;
    pub const CHARGE_INHIBIT_COLD: u16 = 0x4000;
    pub const CHARGE_INHIBIT_HOT: u16 = 0x8000;
}
