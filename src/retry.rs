//! Per-step retry decisions for the register walk.
//!
//! Pure decision logic: the walk feeds every transaction completion
//! through [`evaluate`] and executes whatever comes back (delay and
//! counter bookkeeping included). Nothing here does I/O or sleeps, so
//! the whole policy is table-testable.

use crate::registers::battery_cmd;
use crate::transport::TransactionStatus;

/// Same-step retries allowed before a step is given up.
pub const MAX_RETRY_ATTEMPTS: u8 = 5;

/// Backoff delays in microseconds, indexed by the attempt count at the
/// time the failure is observed.
pub const RETRY_DELAYS_US: [u64; MAX_RETRY_ATTEMPTS as usize] = [10, 100, 1_000, 10_000, 250_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusClass {
    Ok,
    NeedsRetry,
    NonRecoverable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryDecision {
    /// Move on to the next step. The step's value is only trustworthy
    /// when the completion status was `Ok`; otherwise the step's
    /// failure default applies.
    Advance,
    /// Re-issue the same transaction after `delay_us`.
    RetrySameStep { delay_us: u64 },
    /// Retry ceiling reached: accept the step's failure default and
    /// move on. The caller also fires the pending power-management
    /// acknowledgment defensively in case a sleep transition is
    /// waiting on this poll.
    GiveUp,
}

pub fn classify(status: TransactionStatus) -> StatusClass {
    match status {
        TransactionStatus::Ok => StatusClass::Ok,
        TransactionStatus::DeviceAddressNotAcknowledged
        | TransactionStatus::DeviceCommandAccessDenied
        | TransactionStatus::DeviceAccessDenied
        | TransactionStatus::UnknownHostError
        | TransactionStatus::UnknownFailure
        | TransactionStatus::DeviceError
        | TransactionStatus::Timeout
        | TransactionStatus::Busy => StatusClass::NeedsRetry,
        TransactionStatus::HostUnsupportedProtocol | TransactionStatus::PecError => {
            StatusClass::NonRecoverable
        }
    }
}

/// A reading of zero from these registers is domain-invalid and gets
/// the same retry treatment as a bus failure. Zero remaining capacity
/// is legitimate once the battery has reported itself fully
/// discharged.
fn is_absurd_zero(command: u8, value: u16, fully_discharged: bool) -> bool {
    if value != 0 {
        return false;
    }
    match command {
        battery_cmd::REMAINING_CAPACITY => !fully_discharged,
        battery_cmd::FULL_CHARGE_CAPACITY | battery_cmd::DESIGN_CAPACITY => true,
        _ => false,
    }
}

/// Decide what the walk does with one transaction completion.
///
/// `received` is the word value for word reads, `None` for writes and
/// block reads (which have no absurd-value rule). `attempts` is the
/// retry count before this evaluation; the caller increments it on
/// `RetrySameStep` and zeroes it on `Advance`/`GiveUp`.
pub fn evaluate(
    status: TransactionStatus,
    command: u8,
    received: Option<u16>,
    fully_discharged: bool,
    attempts: u8,
) -> RetryDecision {
    let needs_retry = match classify(status) {
        StatusClass::NeedsRetry => true,
        StatusClass::NonRecoverable => false,
        StatusClass::Ok => match received {
            Some(value) => is_absurd_zero(command, value, fully_discharged),
            None => false,
        },
    };

    if !needs_retry {
        return RetryDecision::Advance;
    }

    if attempts >= MAX_RETRY_ATTEMPTS {
        RetryDecision::GiveUp
    } else {
        RetryDecision::RetrySameStep {
            delay_us: RETRY_DELAYS_US[attempts as usize],
        }
    }
}
