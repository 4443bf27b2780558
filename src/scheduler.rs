//! Polling cadence bookkeeping: which walk path runs next, when the
//! regular timer re-arms, and how many stalled-walk restarts the
//! watchdog still has left.

use embassy_time::Duration;

/// Regular polling cadence.
pub const POLL_INTERVAL_DEFAULT: Duration = Duration::from_millis(30_000);
/// Quick re-poll after an external state change.
pub const POLL_INTERVAL_QUICK: Duration = Duration::from_millis(1_000);

/// Bound on one complete register walk, independent of the per-step
/// retry delays.
pub const OVERALL_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Full new-battery walks forced after boot regardless of charge
/// state.
pub const INITIAL_POLL_COUNTDOWN: u8 = 5;

/// Lifetime budget of watchdog-triggered walk restarts. Decremented
/// once per watchdog fire and never restored, so a permanently wedged
/// transport degrades to silence instead of leaking transactions
/// forever.
pub const INCOMPLETE_READ_RETRY_MAX: u8 = 10;

/// Which branch the register walk takes at the manufacturer-access
/// fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MachinePath {
    NewBattery,
    ExistingBattery,
    UseLastPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollIntervalSelect {
    Default,
    Quick,
}

/// Debug polling-period override, armed once at start. A configured
/// value of 0 seconds means poll continuously with no timer (test
/// only). `set_seconds` is a no-op when the override was never armed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingConfig {
    override_sec: Option<u32>,
    armed: bool,
}

impl PollingConfig {
    pub const fn new() -> PollingConfig {
        PollingConfig {
            override_sec: None,
            armed: false,
        }
    }

    pub const fn with_override(seconds: u32) -> PollingConfig {
        PollingConfig {
            override_sec: Some(seconds),
            armed: true,
        }
    }

    pub fn set_seconds(&mut self, seconds: u32) {
        if self.armed {
            self.override_sec = Some(seconds);
        }
    }

    pub fn overridden(&self) -> bool {
        self.override_sec.is_some()
    }

    /// Continuous-poll debug mode: no timer, walk back to back.
    pub fn poll_forever(&self) -> bool {
        self.override_sec == Some(0)
    }

    pub fn interval(&self, select: PollIntervalSelect) -> Duration {
        match self.override_sec {
            Some(sec) if sec > 0 => Duration::from_secs(sec as u64),
            _ => match select {
                PollIntervalSelect::Default => POLL_INTERVAL_DEFAULT,
                PollIntervalSelect::Quick => POLL_INTERVAL_QUICK,
            },
        }
    }
}

/// Mutable walk/poll bookkeeping, created once and reused by every
/// poll cycle.
#[derive(Debug)]
pub struct PollState {
    pub cancel_polling: bool,
    pub reboot_polling: bool,
    /// Path for the next (or rebooted) walk; `UseLastPath` resolves
    /// against this.
    pub machine_path: MachinePath,
    /// A walk requested while idle, picked up by the task loop.
    pub requested_poll: Option<MachinePath>,
    pub retry_attempts: u8,
    pub incomplete_read_retries: u8,
    pub initial_poll_countdown: u8,
    pub interval_select: PollIntervalSelect,
    pub config: PollingConfig,
}

impl PollState {
    pub fn new(config: PollingConfig) -> PollState {
        PollState {
            cancel_polling: false,
            reboot_polling: false,
            machine_path: MachinePath::NewBattery,
            requested_poll: None,
            retry_attempts: 0,
            incomplete_read_retries: INCOMPLETE_READ_RETRY_MAX,
            initial_poll_countdown: INITIAL_POLL_COUNTDOWN,
            interval_select: PollIntervalSelect::Default,
            config,
        }
    }

    /// Path the regular timer uses: full walks until the initial
    /// countdown drains, the cheap path afterwards.
    pub fn timer_poll_path(&self) -> MachinePath {
        if self.initial_poll_countdown > 0 {
            MachinePath::NewBattery
        } else {
            MachinePath::ExistingBattery
        }
    }

    /// One watchdog fire: burn a stalled-walk restart if any remain.
    pub fn note_watchdog_fired(&mut self) -> bool {
        if self.incomplete_read_retries > 0 {
            self.incomplete_read_retries -= 1;
            true
        } else {
            false
        }
    }
}

/// Re-arm decision after a successfully completed walk. The timer
/// keeps running while the boot countdown drains, while a debug
/// override is armed, or while there is anything left to watch: on
/// battery, or charging a present battery, and never once the pack has
/// permanently failed.
pub fn should_rearm_poll_timer(
    initial_poll_countdown: u8,
    overridden: bool,
    ac_connected: bool,
    fully_charged: bool,
    battery_present: bool,
    permanent_failure: bool,
) -> bool {
    if initial_poll_countdown > 0 || overridden {
        return true;
    }
    (!ac_connected || (!fully_charged && battery_present)) && !permanent_failure
}
