// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Once;
use std::time::Duration;

use spin_sleep::SpinSleeper;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{info, warn};

/// Ordinary OS sleeps are only accurate to 1-16 ms. Waits longer than this
/// threshold are mostly slept; the tail (and any shorter wait in full) is
/// spun against the monotonic clock for sub-millisecond fidelity.
const SPIN_THRESHOLD: Duration = Duration::from_micros(100_000);

static REALTIME_INIT: Once = Once::new();

/// Requests the highest real-time scheduling class the OS exposes for the
/// playback thread, once per process. Failure is non-fatal: playback still
/// works, it just jitters more on a loaded host.
pub fn request_realtime_priority() {
    REALTIME_INIT.call_once(|| {
        if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
            warn!(
                err = format!("{:?}", e),
                "Unable to raise thread priority."
            );
        }

        #[cfg(unix)]
        {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };

            let tid = thread_native_id();
            match set_thread_priority_and_policy(
                tid,
                ThreadPriority::Max,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => info!("Enabled RT SCHED_FIFO for the playback thread."),
                Err(e) => warn!(
                    err = format!("{:?}", e),
                    "Failed to set RT SCHED_FIFO for the playback thread."
                ),
            }
        }
    });
}

/// A sleeper that sleeps long waits down to the spin threshold and busy-waits
/// the rest.
pub fn sleeper() -> SpinSleeper {
    SpinSleeper::new(SPIN_THRESHOLD.as_nanos() as u32)
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_sleeper_short_wait_is_accurate() {
        let sleeper = sleeper();
        let start = Instant::now();
        sleeper.sleep(Duration::from_micros(2_000));
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_micros(2_000));
        // A spun wait should not overshoot by anything near OS granularity.
        assert!(elapsed < Duration::from_millis(10));
    }

    #[test]
    fn test_sleeper_zero_wait_returns_immediately() {
        let sleeper = sleeper();
        let start = Instant::now();
        sleeper.sleep(Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_request_realtime_priority_is_idempotent() {
        // Whether or not the host grants it, repeated calls must not panic.
        request_realtime_priority();
        request_realtime_priority();
    }
}
