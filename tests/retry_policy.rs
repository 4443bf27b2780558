use smart_battery_manager::registers::battery_cmd;
use smart_battery_manager::retry::{
    classify, evaluate, RetryDecision, StatusClass, MAX_RETRY_ATTEMPTS, RETRY_DELAYS_US,
};
use smart_battery_manager::transport::TransactionStatus;

#[test]
fn status_classification() {
    assert_eq!(classify(TransactionStatus::Ok), StatusClass::Ok);

    for status in [
        TransactionStatus::DeviceAddressNotAcknowledged,
        TransactionStatus::DeviceCommandAccessDenied,
        TransactionStatus::DeviceAccessDenied,
        TransactionStatus::UnknownHostError,
        TransactionStatus::UnknownFailure,
        TransactionStatus::DeviceError,
        TransactionStatus::Timeout,
        TransactionStatus::Busy,
    ] {
        assert_eq!(classify(status), StatusClass::NeedsRetry, "{:?}", status);
    }

    for status in [
        TransactionStatus::HostUnsupportedProtocol,
        TransactionStatus::PecError,
    ] {
        assert_eq!(classify(status), StatusClass::NonRecoverable, "{:?}", status);
    }
}

/// Exactly five same-step retries with the table delays, then give up.
#[test]
fn retry_ceiling_and_backoff_table() {
    for attempt in 0..MAX_RETRY_ATTEMPTS {
        let decision = evaluate(
            TransactionStatus::Timeout,
            battery_cmd::VOLTAGE,
            Some(0),
            false,
            attempt,
        );
        assert_eq!(
            decision,
            RetryDecision::RetrySameStep {
                delay_us: RETRY_DELAYS_US[attempt as usize]
            }
        );
    }

    let decision = evaluate(
        TransactionStatus::Timeout,
        battery_cmd::VOLTAGE,
        Some(0),
        false,
        MAX_RETRY_ATTEMPTS,
    );
    assert_eq!(decision, RetryDecision::GiveUp);
}

#[test]
fn backoff_delays_are_ordered() {
    assert_eq!(RETRY_DELAYS_US, [10, 100, 1_000, 10_000, 250_000]);
}

/// Zero capacity readings are absurd unless the battery already said
/// it is fully discharged.
#[test]
fn absurd_zero_rules() {
    // remaining capacity: zero retried while not fully discharged
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::REMAINING_CAPACITY,
            Some(0),
            false,
            0,
        ),
        RetryDecision::RetrySameStep { delay_us: 10 }
    );

    // ... but accepted once fully discharged
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::REMAINING_CAPACITY,
            Some(0),
            true,
            0,
        ),
        RetryDecision::Advance
    );

    // full-charge and design capacity zero are never valid
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::FULL_CHARGE_CAPACITY,
            Some(0),
            true,
            0,
        ),
        RetryDecision::RetrySameStep { delay_us: 10 }
    );
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::DESIGN_CAPACITY,
            Some(0),
            true,
            0,
        ),
        RetryDecision::RetrySameStep { delay_us: 10 }
    );

    // zero is fine anywhere else
    assert_eq!(
        evaluate(TransactionStatus::Ok, battery_cmd::VOLTAGE, Some(0), false, 0),
        RetryDecision::Advance
    );

    // absurd zero exhausts the same ceiling
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::DESIGN_CAPACITY,
            Some(0),
            false,
            MAX_RETRY_ATTEMPTS,
        ),
        RetryDecision::GiveUp
    );
}

#[test]
fn success_advances_regardless_of_prior_attempts() {
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::REMAINING_CAPACITY,
            Some(50),
            false,
            3,
        ),
        RetryDecision::Advance
    );
    assert_eq!(
        evaluate(TransactionStatus::Ok, battery_cmd::CYCLE_COUNT, Some(12), false, 0),
        RetryDecision::Advance
    );
}

/// PEC and protocol errors skip the retry ladder entirely.
#[test]
fn non_recoverable_advances_immediately() {
    assert_eq!(
        evaluate(
            TransactionStatus::PecError,
            battery_cmd::REMAINING_CAPACITY,
            Some(0),
            false,
            0,
        ),
        RetryDecision::Advance
    );
    assert_eq!(
        evaluate(
            TransactionStatus::HostUnsupportedProtocol,
            battery_cmd::VOLTAGE,
            Some(7),
            false,
            4,
        ),
        RetryDecision::Advance
    );
}

/// Writes and block reads carry no word value and no absurd-zero rule.
#[test]
fn no_value_means_no_absurd_check() {
    assert_eq!(
        evaluate(
            TransactionStatus::Ok,
            battery_cmd::REMAINING_CAPACITY,
            None,
            false,
            0,
        ),
        RetryDecision::Advance
    );
}
