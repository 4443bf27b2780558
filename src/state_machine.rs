//! The battery register walk.
//!
//! One complete walk reads the system manager's state words, the
//! battery's status, the extended permanent-failure/operation status
//! pair, optionally the identity group (new-battery path), and the
//! gauge/cell-voltage chain, publishing each field through the sink as
//! it decodes. Every transport completion re-enters through the guard
//! clauses, so sleep, exclusive-access stalls, cancellation, and
//! restart requests all take effect at the next step boundary.

use embassy_time::{with_timeout, TimeoutError, Timer};
use heapless::{String, Vec};

use crate::manager::{
    BatteryEvent, BatteryEventReceiver, PowerAckSignal, SharedBatteryState,
};
use crate::registers::{
    battery_cmd, battery_status, manager_cmd, manager_state, manager_state_cont,
    manufacturer_access, BATTERY_ADDR, MANAGER_ADDR,
};
use crate::retry::{self, RetryDecision};
use crate::scheduler::{MachinePath, PollState, PollingConfig, OVERALL_READ_TIMEOUT};
use crate::sink::BatterySink;
use crate::snapshot::{BatterySnapshot, ChargeStatusReason, CELL_COUNT, MAX_STRING_LEN};
use crate::transport::{SmbusTransport, TransactionStatus, MAX_BLOCK_LEN};

/// Why a walk stopped before its last register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum WalkAbort {
    Sleeping,
    Stalled,
    Cancelled,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkOutcome {
    Completed,
    NoBattery,
}

/// Result of one `run_poll` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    Completed,
    Aborted,
    TimedOut,
}

pub struct SmbusBattery<'a, T: SmbusTransport, S: BatterySink> {
    transport: T,
    sink: S,
    snapshot: BatterySnapshot,
    poll: PollState,
    shared: &'a SharedBatteryState,
    events: BatteryEventReceiver<'a>,
    power_ack: &'a PowerAckSignal,
    pending_power_ack: bool,
    /// Charging bit from the manager state word, resolved against the
    /// permanent-failure check before it is published.
    manager_reports_charging: bool,
}

impl<'a, T: SmbusTransport, S: BatterySink> SmbusBattery<'a, T, S> {
    pub fn new(
        transport: T,
        sink: S,
        config: PollingConfig,
        shared: &'a SharedBatteryState,
        events: BatteryEventReceiver<'a>,
        power_ack: &'a PowerAckSignal,
    ) -> SmbusBattery<'a, T, S> {
        SmbusBattery {
            transport,
            sink,
            snapshot: BatterySnapshot::new(),
            poll: PollState::new(config),
            shared,
            events,
            power_ack,
            pending_power_ack: false,
            manager_reports_charging: false,
        }
    }

    pub fn snapshot(&self) -> &BatterySnapshot {
        &self.snapshot
    }

    pub fn poll_state(&self) -> &PollState {
        &self.poll
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn events(&self) -> BatteryEventReceiver<'a> {
        self.events
    }

    // ------------------------------------------------------------------
    //  external events
    // ------------------------------------------------------------------

    fn process_pending_events(&mut self) {
        let events = self.events;
        while let Ok(event) = events.try_receive() {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: BatteryEvent) {
        match event {
            BatteryEvent::Inserted => {
                info!("battery inserted");
                self.request_poll(MachinePath::NewBattery);
            }
            BatteryEvent::Removed => {
                info!("battery removed");
                if self.shared.polling_now() {
                    self.poll.cancel_polling = true;
                }
                self.poll.requested_poll = None;
                self.clear_battery_state();
                self.fire_power_ack();
            }
            BatteryEvent::AcInflowChanged { disabled } => {
                self.shared.set_inflow_disabled(disabled);
                self.poll.interval_select = crate::scheduler::PollIntervalSelect::Quick;
                self.request_poll(MachinePath::ExistingBattery);
            }
            BatteryEvent::ChargeInhibitChanged { inhibited } => {
                self.shared.set_charge_inhibited(inhibited);
                self.poll.interval_select = crate::scheduler::PollIntervalSelect::Quick;
                self.request_poll(MachinePath::ExistingBattery);
            }
            BatteryEvent::ExclusiveAccess { active } => {
                if active {
                    warn!("exclusive client took the bus, battery polling stalls");
                    self.shared.set_stalled_by_exclusive_client(true);
                } else {
                    info!("exclusive client released the bus");
                    self.shared.set_stalled_by_exclusive_client(false);
                    self.request_poll(MachinePath::NewBattery);
                }
            }
            BatteryEvent::SystemWillSleep => {
                self.shared.set_system_sleeping(true);
                self.pending_power_ack = true;
                if !self.shared.polling_now() {
                    self.fire_power_ack();
                }
            }
            BatteryEvent::SystemDidWake => {
                self.shared.set_system_sleeping(false);
                self.pending_power_ack = true;
                if !self.request_poll(MachinePath::ExistingBattery) {
                    self.fire_power_ack();
                }
            }
            BatteryEvent::PollRequest { path } => {
                self.request_poll(path);
            }
            BatteryEvent::SetPollingInterval { seconds } => {
                self.poll.config.set_seconds(seconds);
            }
        }
    }

    /// Ask for a walk. Mid-walk this becomes a restart request the
    /// in-flight step picks up; idle requests wait for the task loop.
    /// Refused while an exclusive client owns the bus.
    pub fn request_poll(&mut self, path: MachinePath) -> bool {
        if self.shared.stalled_by_exclusive_client() {
            warn!("battery poll refused, bus is held by an exclusive client");
            return false;
        }
        let path = match path {
            MachinePath::UseLastPath => self.poll.machine_path,
            p => p,
        };
        self.poll.machine_path = path;
        if self.shared.polling_now() {
            self.poll.reboot_polling = true;
        } else {
            self.poll.requested_poll = Some(path);
        }
        true
    }

    /// A requested walk the task loop may start now, if the gate
    /// allows any.
    pub fn take_startable_poll(&mut self) -> Option<MachinePath> {
        if self.shared.system_sleeping() || self.shared.stalled_by_exclusive_client() {
            return None;
        }
        self.poll.requested_poll.take()
    }

    fn fire_power_ack(&mut self) {
        if self.pending_power_ack {
            self.pending_power_ack = false;
            self.power_ack.signal(());
        }
    }

    // ------------------------------------------------------------------
    //  guard clauses, evaluated after every transaction completion
    // ------------------------------------------------------------------

    fn check_guards(&mut self) -> Result<(), WalkAbort> {
        if self.shared.system_sleeping() {
            self.shared.set_polling_now(false);
            self.fire_power_ack();
            return Err(WalkAbort::Sleeping);
        }
        if self.shared.stalled_by_exclusive_client() {
            self.shared.set_polling_now(false);
            return Err(WalkAbort::Stalled);
        }
        if self.poll.cancel_polling {
            self.poll.cancel_polling = false;
            self.shared.set_polling_now(false);
            return Err(WalkAbort::Cancelled);
        }
        if self.poll.reboot_polling {
            self.poll.reboot_polling = false;
            return Err(WalkAbort::Restart);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    //  retry-hardened step primitives
    // ------------------------------------------------------------------

    async fn read_word_step(&mut self, addr: u8, command: u8) -> Result<Option<u16>, WalkAbort> {
        loop {
            self.process_pending_events();
            self.check_guards()?;
            let completion = self.transport.read_word(addr, command).await;
            self.process_pending_events();
            self.check_guards()?;

            match retry::evaluate(
                completion.status,
                command,
                Some(completion.value),
                self.snapshot.fully_discharged,
                self.poll.retry_attempts,
            ) {
                RetryDecision::Advance => {
                    self.poll.retry_attempts = 0;
                    if completion.status == TransactionStatus::Ok {
                        return Ok(Some(completion.value));
                    }
                    warn!("read of register {:#x} failed non-recoverably", command);
                    return Ok(None);
                }
                RetryDecision::RetrySameStep { delay_us } => {
                    self.poll.retry_attempts += 1;
                    Timer::after_micros(delay_us).await;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        "read of register {:#x} still failing after {} retries",
                        command,
                        retry::MAX_RETRY_ATTEMPTS
                    );
                    self.poll.retry_attempts = 0;
                    self.fire_power_ack();
                    // a well-formed but absurd value is accepted as a
                    // last resort; a bus failure yields the step default
                    if completion.status == TransactionStatus::Ok {
                        return Ok(Some(completion.value));
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn write_word_step(
        &mut self,
        addr: u8,
        command: u8,
        value: u16,
    ) -> Result<(), WalkAbort> {
        loop {
            self.process_pending_events();
            self.check_guards()?;
            let status = self.transport.write_word(addr, command, value).await;
            self.process_pending_events();
            self.check_guards()?;

            match retry::evaluate(status, command, None, false, self.poll.retry_attempts) {
                RetryDecision::Advance => {
                    self.poll.retry_attempts = 0;
                    if status != TransactionStatus::Ok {
                        warn!("write of register {:#x} failed non-recoverably", command);
                    }
                    return Ok(());
                }
                RetryDecision::RetrySameStep { delay_us } => {
                    self.poll.retry_attempts += 1;
                    Timer::after_micros(delay_us).await;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        "write of register {:#x} still failing after {} retries",
                        command,
                        retry::MAX_RETRY_ATTEMPTS
                    );
                    self.poll.retry_attempts = 0;
                    self.fire_power_ack();
                    return Ok(());
                }
            }
        }
    }

    async fn read_block_step(
        &mut self,
        addr: u8,
        command: u8,
    ) -> Result<Option<Vec<u8, MAX_BLOCK_LEN>>, WalkAbort> {
        loop {
            self.process_pending_events();
            self.check_guards()?;
            let completion = self.transport.read_block(addr, command).await;
            self.process_pending_events();
            self.check_guards()?;

            match retry::evaluate(completion.status, command, None, false, self.poll.retry_attempts)
            {
                RetryDecision::Advance => {
                    self.poll.retry_attempts = 0;
                    if completion.status == TransactionStatus::Ok {
                        return Ok(Some(completion.data));
                    }
                    warn!("block read of register {:#x} failed non-recoverably", command);
                    return Ok(None);
                }
                RetryDecision::RetrySameStep { delay_us } => {
                    self.poll.retry_attempts += 1;
                    Timer::after_micros(delay_us).await;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        "block read of register {:#x} still failing after {} retries",
                        command,
                        retry::MAX_RETRY_ATTEMPTS
                    );
                    self.poll.retry_attempts = 0;
                    self.fire_power_ack();
                    return Ok(None);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    //  the walk
    // ------------------------------------------------------------------

    /// One full poll cycle: walk the registers under the overall-read
    /// watchdog, restarting on reboot requests and on watchdog fires
    /// while the stalled-walk budget lasts.
    pub async fn run_poll(&mut self, path: MachinePath) -> PollOutcome {
        let mut path = match path {
            MachinePath::UseLastPath => self.poll.machine_path,
            p => p,
        };

        loop {
            self.poll.machine_path = path;
            let attempt = with_timeout(OVERALL_READ_TIMEOUT, self.walk(path)).await;
            match attempt {
                Ok(Ok(WalkOutcome::Completed)) => {
                    self.sink.rebuild_legacy_battery_info(&self.snapshot);
                    self.sink.notify_observers();
                    self.shared.set_polling_now(false);
                    self.fire_power_ack();
                    return PollOutcome::Completed;
                }
                Ok(Ok(WalkOutcome::NoBattery)) => {
                    self.clear_battery_state();
                    self.shared.set_polling_now(false);
                    self.fire_power_ack();
                    return PollOutcome::Completed;
                }
                Ok(Err(WalkAbort::Restart)) => {
                    debug!("battery walk restarting");
                    path = self.poll.machine_path;
                }
                // the guard clause that raised these already cleared
                // the polling flag and fired any pending ack
                Ok(Err(_)) => return PollOutcome::Aborted,
                Err(TimeoutError) => {
                    error!("battery register walk exceeded the overall read timeout");
                    if self.poll.note_watchdog_fired() {
                        path = MachinePath::NewBattery;
                    } else {
                        warn!("stalled-walk restart budget exhausted, polling stops");
                        self.shared.set_polling_now(false);
                        return PollOutcome::TimedOut;
                    }
                }
            }
        }
    }

    async fn walk(&mut self, path: MachinePath) -> Result<WalkOutcome, WalkAbort> {
        // fresh walk: a stale cancel request belongs to a previous cycle
        self.poll.cancel_polling = false;
        self.poll.retry_attempts = 0;
        self.shared.set_polling_now(true);

        // the manager's words gate everything else: AC state first,
        // then whether a battery is in the bay at all
        let cont = self
            .read_word_step(MANAGER_ADDR, manager_cmd::BATTERY_SYSTEM_STATE_CONT)
            .await?
            .unwrap_or(0);
        self.decode_manager_state_cont(cont);

        let state = self
            .read_word_step(MANAGER_ADDR, manager_cmd::BATTERY_SYSTEM_STATE)
            .await?
            .unwrap_or(0);
        let manager_present = state & manager_state::BATTERY_A_PRESENT != 0;
        self.manager_reports_charging =
            state & manager_state::CHARGING_A != 0 && !self.shared.charge_inhibited();

        // read battery status present or not: a permanently failed
        // pack announces itself here even when the manager says absent
        let status = self
            .read_word_step(BATTERY_ADDR, battery_cmd::BATTERY_STATUS)
            .await?;
        if !self.decode_battery_status(status, manager_present) {
            return Ok(WalkOutcome::NoBattery);
        }

        // extended status words go through the manufacturer-access
        // selector-write/read pairs
        self.write_word_step(
            BATTERY_ADDR,
            battery_cmd::MANUFACTURER_ACCESS,
            manufacturer_access::EXTENDED_PF_STATUS,
        )
        .await?;
        let pf_status = self
            .read_word_step(BATTERY_ADDR, battery_cmd::MANUFACTURER_ACCESS)
            .await?
            .unwrap_or(0);
        self.snapshot.pf_status = pf_status;
        self.sink.set_pf_status(pf_status);

        self.write_word_step(
            BATTERY_ADDR,
            battery_cmd::MANUFACTURER_ACCESS,
            manufacturer_access::EXTENDED_OPERATION_STATUS,
        )
        .await?;
        let op_status = self
            .read_word_step(BATTERY_ADDR, battery_cmd::MANUFACTURER_ACCESS)
            .await?
            .unwrap_or(0);
        self.snapshot.operation_status = op_status;
        self.sink.set_operation_status(op_status);

        if path == MachinePath::NewBattery {
            self.read_identity_group().await?;
        }

        if self.snapshot.permanent_failure {
            self.zero_untrusted_readings();
            return Ok(WalkOutcome::Completed);
        }

        self.read_gauge_group().await?;
        self.read_cell_voltage_group().await?;

        let current = self
            .read_word_step(BATTERY_ADDR, battery_cmd::CURRENT)
            .await?
            .map(|v| v as i16)
            .unwrap_or(0);
        self.snapshot.instant_current = current;
        self.sink.set_instant_amperage(current);

        Ok(WalkOutcome::Completed)
    }

    /// Identity fields, new-battery path only. Every step advances to
    /// the next regardless of its own success; a failed read publishes
    /// the empty/zero default.
    async fn read_identity_group(&mut self) -> Result<(), WalkAbort> {
        let name = self
            .read_block_step(BATTERY_ADDR, battery_cmd::MANUFACTURER_NAME)
            .await?;
        self.snapshot.manufacturer_name = block_to_string(name.as_deref());
        self.sink
            .set_manufacturer_name(self.snapshot.manufacturer_name.as_str());

        let data = self
            .read_block_step(BATTERY_ADDR, battery_cmd::MANUFACTURER_DATA)
            .await?
            .unwrap_or_default();
        self.snapshot.manufacturer_data = data;
        self.sink
            .set_manufacturer_data(self.snapshot.manufacturer_data.as_slice());

        let date = self
            .read_word_step(BATTERY_ADDR, battery_cmd::MANUFACTURE_DATE)
            .await?
            .unwrap_or(0);
        self.snapshot.manufacture_date = date;
        self.sink.set_manufacture_date(date);

        let device = self
            .read_block_step(BATTERY_ADDR, battery_cmd::DEVICE_NAME)
            .await?;
        self.snapshot.device_name = block_to_string(device.as_deref());
        self.sink.set_device_name(self.snapshot.device_name.as_str());

        let serial = self
            .read_word_step(BATTERY_ADDR, battery_cmd::SERIAL_NUMBER)
            .await?
            .unwrap_or(0);
        self.snapshot.firmware_serial = serial;
        self.sink.set_firmware_serial(serial);

        let hw_serial = self
            .read_block_step(BATTERY_ADDR, battery_cmd::HARDWARE_SERIAL)
            .await?;
        self.snapshot.hardware_serial = block_to_string(hw_serial.as_deref());
        self.sink
            .set_hardware_serial(self.snapshot.hardware_serial.as_str());

        let design = self
            .read_word_step(BATTERY_ADDR, battery_cmd::DESIGN_CAPACITY)
            .await?
            .unwrap_or(0);
        self.snapshot.design_capacity = design;
        self.sink.set_design_capacity(design);

        let reserve = self
            .read_word_step(BATTERY_ADDR, battery_cmd::PACK_RESERVE)
            .await?
            .unwrap_or(0);
        self.snapshot.pack_reserve = reserve;
        self.sink.set_pack_reserve(reserve);

        Ok(())
    }

    /// The converged gauge chain both paths share.
    async fn read_gauge_group(&mut self) -> Result<(), WalkAbort> {
        let remaining = self
            .read_word_step(BATTERY_ADDR, battery_cmd::REMAINING_CAPACITY)
            .await?
            .unwrap_or(0);
        self.snapshot.remaining_capacity = remaining;
        self.sink.set_current_capacity(remaining);

        let full = self
            .read_word_step(BATTERY_ADDR, battery_cmd::FULL_CHARGE_CAPACITY)
            .await?
            .unwrap_or(0);
        self.snapshot.full_charge_capacity = full;
        self.sink.set_max_capacity(full);

        let average_current = match self
            .read_word_step(BATTERY_ADDR, battery_cmd::AVERAGE_CURRENT)
            .await?
        {
            Some(v) => v as i16,
            None => {
                // no current reading means no usable time estimate
                self.snapshot.time_remaining = 0;
                self.sink.set_time_remaining(0);
                0
            }
        };
        self.snapshot.average_current = average_current;
        self.sink.set_amperage(average_current);

        let voltage = self
            .read_word_step(BATTERY_ADDR, battery_cmd::VOLTAGE)
            .await?
            .unwrap_or(0);
        self.snapshot.voltage = voltage;
        self.sink.set_voltage(voltage);

        let max_error = self
            .read_word_step(BATTERY_ADDR, battery_cmd::MAX_ERROR)
            .await?
            .unwrap_or(0);
        self.snapshot.max_error_pct = max_error;
        self.sink.set_max_err(max_error);

        let cycles = self
            .read_word_step(BATTERY_ADDR, battery_cmd::CYCLE_COUNT)
            .await?
            .unwrap_or(0);
        self.snapshot.cycle_count = cycles;
        self.sink.set_cycle_count(cycles);

        let avg_tte = self
            .read_word_step(BATTERY_ADDR, battery_cmd::AVERAGE_TIME_TO_EMPTY)
            .await?
            .unwrap_or(0);
        self.snapshot.average_time_to_empty = avg_tte;
        self.sink.set_average_time_to_empty(avg_tte);
        if self.snapshot.average_current < 0 {
            self.snapshot.time_remaining = avg_tte;
            self.sink.set_time_remaining(avg_tte);
        }

        let run_tte = self
            .read_word_step(BATTERY_ADDR, battery_cmd::RUN_TIME_TO_EMPTY)
            .await?
            .unwrap_or(0);
        self.snapshot.instant_time_to_empty = run_tte;
        self.sink.set_instant_time_to_empty(run_tte);

        let avg_ttf = self
            .read_word_step(BATTERY_ADDR, battery_cmd::AVERAGE_TIME_TO_FULL)
            .await?
            .unwrap_or(0);
        self.snapshot.average_time_to_full = avg_ttf;
        self.sink.set_average_time_to_full(avg_ttf);
        if self.snapshot.average_current > 0 {
            self.snapshot.time_remaining = avg_ttf;
            self.sink.set_time_remaining(avg_ttf);
        }

        let temperature = self
            .read_word_step(BATTERY_ADDR, battery_cmd::TEMPERATURE)
            .await?
            .unwrap_or(0);
        self.snapshot.temperature = temperature;
        self.sink.set_temperature(temperature);

        Ok(())
    }

    /// Cell voltages are grouped: the buffer restarts empty, fills in
    /// cell order 1..4 (command bytes descend), and only a complete
    /// group is published.
    async fn read_cell_voltage_group(&mut self) -> Result<(), WalkAbort> {
        self.snapshot.cell_voltages.clear();
        for cell in 0..CELL_COUNT {
            let command = battery_cmd::CELL_VOLTAGE_1 - cell as u8;
            let value = self
                .read_word_step(BATTERY_ADDR, command)
                .await?
                .unwrap_or(0);
            let _ = self.snapshot.cell_voltages.push(value);
        }

        if self.snapshot.cell_voltages.len() == CELL_COUNT {
            self.sink
                .set_cell_voltages(self.snapshot.cell_voltages.as_slice());
        } else {
            self.sink.clear_cell_voltages();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    //  decode
    // ------------------------------------------------------------------

    fn decode_manager_state_cont(&mut self, word: u16) {
        let connected =
            word & manager_state_cont::AC_PRESENT != 0 && !self.shared.inflow_disabled();
        let charge_capable = word & manager_state_cont::POWER_NOT_GOOD == 0;
        let reason = ChargeStatusReason::from_state_cont(word);

        if self.snapshot.ac_connected != Some(connected) {
            info!("external power {}", if connected { "attached" } else { "detached" });
            self.sink.ac_transition(connected);
            self.sink.set_adapter_info(0);
        }
        self.snapshot.ac_connected = Some(connected);
        self.snapshot.ac_charge_capable = charge_capable;
        self.snapshot.charge_status = reason;
        self.sink.set_ac_connected(connected);
        self.sink.set_ac_charge_capable(charge_capable);
        self.sink.set_charge_status(reason);
    }

    /// Returns whether the walk continues into the battery registers.
    fn decode_battery_status(&mut self, status: Option<u16>, manager_present: bool) -> bool {
        let word = status.unwrap_or(0);

        let failed = word & battery_status::TERMINATE_CHARGE_ALARM != 0
            && word & battery_status::TERMINATE_DISCHARGE_ALARM != 0;
        if failed {
            if !self.snapshot.permanent_failure {
                error!("battery reports permanent failure, status {:#x}", word);
            }
            // a failed pack is present and not charging, whatever the
            // manager's bits claim
            self.snapshot.permanent_failure = true;
            self.snapshot.battery_present = Some(true);
            self.snapshot.is_charging = false;
            self.sink.set_battery_installed(true);
            self.sink.set_is_charging(false);
            return true;
        }
        self.snapshot.permanent_failure = false;

        if !manager_present {
            self.snapshot.battery_present = Some(false);
            return false;
        }

        self.snapshot.battery_present = Some(true);
        self.snapshot.is_charging = self.manager_reports_charging;
        self.sink.set_battery_installed(true);
        self.sink.set_battery_location(0);
        self.sink.set_is_charging(self.manager_reports_charging);

        let fully_charged = word & battery_status::FULLY_CHARGED != 0;
        let fully_discharged = word & battery_status::FULLY_DISCHARGED != 0;
        if fully_discharged && !self.snapshot.fully_discharged {
            self.sink.notify_fully_discharged();
        }
        self.snapshot.fully_charged = fully_charged;
        self.snapshot.fully_discharged = fully_discharged;
        self.sink.set_fully_charged(fully_charged);
        true
    }

    /// A permanently failed pack's gauge output is untrustworthy;
    /// publish zeros instead of reading it.
    fn zero_untrusted_readings(&mut self) {
        self.snapshot.remaining_capacity = 0;
        self.snapshot.full_charge_capacity = 0;
        self.snapshot.average_current = 0;
        self.snapshot.instant_current = 0;
        self.snapshot.average_time_to_empty = 0;
        self.snapshot.instant_time_to_empty = 0;
        self.snapshot.average_time_to_full = 0;
        self.snapshot.time_remaining = 0;
        self.snapshot.cell_voltages.clear();

        self.sink.set_current_capacity(0);
        self.sink.set_max_capacity(0);
        self.sink.set_amperage(0);
        self.sink.set_instant_amperage(0);
        self.sink.set_average_time_to_empty(0);
        self.sink.set_instant_time_to_empty(0);
        self.sink.set_average_time_to_full(0);
        self.sink.set_time_remaining(0);
        self.sink.clear_cell_voltages();
    }

    /// Reset everything battery-specific to the absent defaults and
    /// drop the identity keys from the sink.
    pub fn clear_battery_state(&mut self) {
        self.snapshot.clear_battery_state();

        self.sink.set_battery_installed(false);
        self.sink.set_is_charging(false);
        self.sink.set_fully_charged(false);
        self.sink.set_current_capacity(0);
        self.sink.set_max_capacity(0);
        self.sink.set_design_capacity(0);
        self.sink.set_voltage(0);
        self.sink.set_amperage(0);
        self.sink.set_instant_amperage(0);
        self.sink.set_max_err(0);
        self.sink.set_cycle_count(0);
        self.sink.set_temperature(0);
        self.sink.set_average_time_to_empty(0);
        self.sink.set_instant_time_to_empty(0);
        self.sink.set_average_time_to_full(0);
        self.sink.set_time_remaining(0);
        self.sink.clear_cell_voltages();
        self.sink.set_charge_status(None);
        self.sink.clear_battery_identity();
        self.sink.notify_observers();
    }

    // ------------------------------------------------------------------
    //  scheduling hooks for the task loop
    // ------------------------------------------------------------------

    /// Re-arm decision after a completed walk; burns one initial-poll
    /// countdown slot when any remain.
    pub fn should_rearm_poll_timer(&mut self) -> bool {
        let rearm = crate::scheduler::should_rearm_poll_timer(
            self.poll.initial_poll_countdown,
            self.poll.config.overridden(),
            self.snapshot.ac_connected.unwrap_or(false),
            self.snapshot.fully_charged,
            self.snapshot.battery_present.unwrap_or(false),
            self.snapshot.permanent_failure,
        );
        if self.poll.initial_poll_countdown > 0 {
            self.poll.initial_poll_countdown -= 1;
        }
        rearm
    }

    pub fn poll_forever_mode(&self) -> bool {
        self.poll.config.poll_forever()
    }

    pub fn poll_interval(&self) -> embassy_time::Duration {
        self.poll.config.interval(self.poll.interval_select)
    }

    /// Regular timer fired: queue the cadence walk and drop back to
    /// the default interval.
    pub fn on_poll_timer_fired(&mut self) {
        let path = self.poll.timer_poll_path();
        self.poll.interval_select = crate::scheduler::PollIntervalSelect::Default;
        self.request_poll(path);
    }
}

/// Block payloads carrying strings are NUL-padded; keep the leading
/// valid-UTF-8 portion.
fn block_to_string(data: Option<&[u8]>) -> String<MAX_STRING_LEN> {
    let mut out = String::new();
    if let Some(bytes) = data {
        let trimmed = match bytes.iter().position(|&b| b == 0) {
            Some(end) => &bytes[..end],
            None => bytes,
        };
        if let Ok(s) = core::str::from_utf8(trimmed) {
            let _ = out.push_str(s);
        }
    }
    out
}
