//! The state publication seam.
//!
//! The register walk publishes each field as it decodes it; whatever
//! sits behind this trait (an OS power-source object, a telemetry
//! packet builder, a test recorder) consumes the values fire-and-forget.
//! The walk never reads anything back.

use crate::snapshot::{BatterySnapshot, ChargeStatusReason};

pub trait BatterySink {
    fn set_battery_installed(&mut self, installed: bool);
    fn set_ac_connected(&mut self, connected: bool);
    fn set_ac_charge_capable(&mut self, capable: bool);
    /// Fired only on an AC attach/detach transition, for power-source
    /// re-evaluation outside the battery itself.
    fn ac_transition(&mut self, connected: bool);
    fn set_adapter_info(&mut self, raw: u32);
    fn set_battery_location(&mut self, location: u16);

    fn set_is_charging(&mut self, charging: bool);
    fn set_fully_charged(&mut self, fully_charged: bool);
    /// Edge-triggered: fired exactly once when the battery newly
    /// reports fully discharged.
    fn notify_fully_discharged(&mut self);

    fn set_current_capacity(&mut self, mah: u16);
    fn set_max_capacity(&mut self, mah: u16);
    fn set_design_capacity(&mut self, mah: u16);
    fn set_voltage(&mut self, mv: u16);
    fn set_amperage(&mut self, ma: i16);
    fn set_instant_amperage(&mut self, ma: i16);
    fn set_max_err(&mut self, pct: u16);
    fn set_cycle_count(&mut self, count: u16);
    fn set_temperature(&mut self, raw: u16);

    fn set_average_time_to_empty(&mut self, minutes: u16);
    fn set_instant_time_to_empty(&mut self, minutes: u16);
    fn set_average_time_to_full(&mut self, minutes: u16);
    /// The remaining-time estimate selected by the sign of the average
    /// current.
    fn set_time_remaining(&mut self, minutes: u16);

    fn set_cell_voltages(&mut self, cells: &[u16]);
    fn clear_cell_voltages(&mut self);
    fn set_charge_status(&mut self, reason: Option<ChargeStatusReason>);

    fn set_manufacturer_name(&mut self, name: &str);
    fn set_manufacturer_data(&mut self, data: &[u8]);
    fn set_manufacture_date(&mut self, raw: u16);
    fn set_device_name(&mut self, name: &str);
    fn set_firmware_serial(&mut self, serial: u16);
    fn set_hardware_serial(&mut self, serial: &str);
    fn set_pack_reserve(&mut self, mah: u16);
    fn set_pf_status(&mut self, word: u16);
    fn set_operation_status(&mut self, word: u16);

    /// Drop the identity and error-condition keys entirely (battery
    /// removed), as opposed to setting them to zero.
    fn clear_battery_identity(&mut self);

    /// Rebuild the aggregate legacy battery-info blob from a completed
    /// snapshot.
    fn rebuild_legacy_battery_info(&mut self, snapshot: &BatterySnapshot);

    /// Tell observers a coherent update is ready.
    fn notify_observers(&mut self);
}
