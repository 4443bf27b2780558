//! External event plumbing: the event channel feeding the battery
//! task, the shared gate flags, and the thin facade the rest of the
//! system calls.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;

use crate::scheduler::MachinePath;

pub const BATTERY_EVENT_QUEUE_DEPTH: usize = 8;

pub type BatteryEventChannel =
    Channel<CriticalSectionRawMutex, BatteryEvent, BATTERY_EVENT_QUEUE_DEPTH>;
pub type BatteryEventReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, BatteryEvent, BATTERY_EVENT_QUEUE_DEPTH>;
pub type BatteryEventSender<'a> =
    Sender<'a, CriticalSectionRawMutex, BatteryEvent, BATTERY_EVENT_QUEUE_DEPTH>;

/// Acknowledgment the core fires when a sleep/wake transition is no
/// longer waiting on an in-flight walk.
pub type PowerAckSignal = Signal<CriticalSectionRawMutex, ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryEvent {
    Inserted,
    Removed,
    AcInflowChanged { disabled: bool },
    ChargeInhibitChanged { inhibited: bool },
    ExclusiveAccess { active: bool },
    SystemWillSleep,
    SystemDidWake,
    PollRequest { path: MachinePath },
    SetPollingInterval { seconds: u32 },
}

/// How a sleep/wake call is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepWakeResponse {
    AckImmediate,
    /// Wait on the power-ack signal, bounded by `max_wait_ms`.
    AckDeferred { max_wait_ms: u32 },
}

/// Gate and progress flags shared between the battery task and its
/// callers. The walk consults these before and after every
/// transaction; the facade reads them to answer synchronously.
pub struct SharedBatteryState {
    polling_now: AtomicBool,
    system_sleeping: AtomicBool,
    stalled_by_exclusive_client: AtomicBool,
    inflow_disabled: AtomicBool,
    charge_inhibited: AtomicBool,
}

impl SharedBatteryState {
    pub const fn new() -> SharedBatteryState {
        SharedBatteryState {
            polling_now: AtomicBool::new(false),
            system_sleeping: AtomicBool::new(false),
            stalled_by_exclusive_client: AtomicBool::new(false),
            inflow_disabled: AtomicBool::new(false),
            charge_inhibited: AtomicBool::new(false),
        }
    }

    pub fn polling_now(&self) -> bool {
        self.polling_now.load(Ordering::Relaxed)
    }

    pub fn set_polling_now(&self, polling: bool) {
        self.polling_now.store(polling, Ordering::Relaxed);
    }

    pub fn system_sleeping(&self) -> bool {
        self.system_sleeping.load(Ordering::Relaxed)
    }

    pub fn set_system_sleeping(&self, sleeping: bool) {
        self.system_sleeping.store(sleeping, Ordering::Relaxed);
    }

    pub fn stalled_by_exclusive_client(&self) -> bool {
        self.stalled_by_exclusive_client.load(Ordering::Relaxed)
    }

    pub fn set_stalled_by_exclusive_client(&self, stalled: bool) {
        self.stalled_by_exclusive_client
            .store(stalled, Ordering::Relaxed);
    }

    pub fn inflow_disabled(&self) -> bool {
        self.inflow_disabled.load(Ordering::Relaxed)
    }

    pub fn set_inflow_disabled(&self, disabled: bool) {
        self.inflow_disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn charge_inhibited(&self) -> bool {
        self.charge_inhibited.load(Ordering::Relaxed)
    }

    pub fn set_charge_inhibited(&self, inhibited: bool) {
        self.charge_inhibited.store(inhibited, Ordering::Relaxed);
    }
}

impl Default for SharedBatteryState {
    fn default() -> Self {
        SharedBatteryState::new()
    }
}

/// Cheap handle the rest of the system uses to poke the battery task.
/// Everything funnels through the event channel so all state mutation
/// stays on the task's own execution context.
#[derive(Clone, Copy)]
pub struct BatteryManager<'a> {
    shared: &'a SharedBatteryState,
    events: BatteryEventSender<'a>,
    power_ack: &'a PowerAckSignal,
}

impl<'a> BatteryManager<'a> {
    pub fn new(
        shared: &'a SharedBatteryState,
        events: BatteryEventSender<'a>,
        power_ack: &'a PowerAckSignal,
    ) -> BatteryManager<'a> {
        BatteryManager {
            shared,
            events,
            power_ack,
        }
    }

    pub fn power_ack(&self) -> &'a PowerAckSignal {
        self.power_ack
    }

    fn post(&self, event: BatteryEvent) {
        if self.events.try_send(event).is_err() {
            warn!("battery event queue full, event dropped");
        }
    }

    pub fn battery_inserted(&self) {
        self.post(BatteryEvent::Inserted);
    }

    pub fn battery_removed(&self) {
        self.post(BatteryEvent::Removed);
    }

    /// Request a walk. Refused while an exclusive client owns the bus.
    pub fn poll_battery_state(&self, path: MachinePath) -> bool {
        if self.shared.stalled_by_exclusive_client() {
            return false;
        }
        self.post(BatteryEvent::PollRequest { path });
        true
    }

    pub fn handle_inflow_disabled(&self, disabled: bool) {
        self.post(BatteryEvent::AcInflowChanged { disabled });
    }

    pub fn handle_charge_inhibited(&self, inhibited: bool) {
        self.post(BatteryEvent::ChargeInhibitChanged { inhibited });
    }

    pub fn handle_exclusive_access(&self, active: bool) {
        self.post(BatteryEvent::ExclusiveAccess { active });
    }

    pub fn set_polling_interval(&self, seconds: u32) {
        self.post(BatteryEvent::SetPollingInterval { seconds });
    }

    /// Sleep/wake notification. Entering sleep while a walk is in
    /// flight (and waking, which starts one) defers the acknowledgment
    /// to the power-ack signal, bounded by the overall read timeout.
    pub fn handle_system_sleep_wake(&self, is_sleep: bool) -> SleepWakeResponse {
        if self.shared.system_sleeping() == is_sleep {
            return SleepWakeResponse::AckImmediate;
        }

        self.power_ack.reset();
        if is_sleep {
            self.post(BatteryEvent::SystemWillSleep);
            if self.shared.polling_now() {
                SleepWakeResponse::AckDeferred { max_wait_ms: 10_000 }
            } else {
                SleepWakeResponse::AckImmediate
            }
        } else {
            self.post(BatteryEvent::SystemDidWake);
            if self.shared.stalled_by_exclusive_client() {
                SleepWakeResponse::AckImmediate
            } else {
                SleepWakeResponse::AckDeferred { max_wait_ms: 10_000 }
            }
        }
    }
}
