//! The battery polling loop.
//!
//! Owns the regular poll timer and pumps external events into the
//! state machine. The board crate wraps [`battery_task_entry`] in its
//! own `#[embassy_executor::task]` with concrete transport/sink types,
//! e.g.
//!
//! ```text
//! #[embassy_executor::task]
//! async fn battery_task(core: SmbusBattery<'static, BoardSmbus, PowerSourceSink>) -> ! {
//!     battery_task_entry(core).await
//! }
//! ```

use embassy_futures::select::{select, Either};
use embassy_time::{Instant, Timer};

use crate::scheduler::MachinePath;
use crate::sink::BatterySink;
use crate::state_machine::{PollOutcome, SmbusBattery};
use crate::transport::SmbusTransport;

pub async fn battery_task_entry<T: SmbusTransport, S: BatterySink>(
    mut core: SmbusBattery<'_, T, S>,
) -> ! {
    info!("battery task startup");

    // the boot countdown forces full walks regardless of charge state
    core.request_poll(MachinePath::NewBattery);

    let mut next_poll_at: Option<Instant> = None;

    loop {
        while let Some(path) = core.take_startable_poll() {
            let outcome = core.run_poll(path).await;
            match outcome {
                PollOutcome::Completed => {
                    if core.poll_forever_mode() {
                        // debug mode: walk back to back, no timer
                        core.request_poll(MachinePath::NewBattery);
                    } else if core.should_rearm_poll_timer() {
                        next_poll_at = Some(Instant::now() + core.poll_interval());
                    } else {
                        // let the timer lapse, an external alarm will
                        // wake the walk back up
                        next_poll_at = None;
                    }
                }
                PollOutcome::Aborted | PollOutcome::TimedOut => {
                    next_poll_at = None;
                }
            }
        }

        match next_poll_at {
            Some(at) => match select(Timer::at(at), core.events().receive()).await {
                Either::First(_) => {
                    next_poll_at = None;
                    core.on_poll_timer_fired();
                }
                Either::Second(event) => core.apply_event(event),
            },
            None => {
                let event = core.events().receive().await;
                core.apply_event(event);
            }
        }
    }
}
