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
use std::time::{Duration, Instant};

use crate::pin::Pin;
use crate::timing;

use super::registry::Registry;

/// One MIDI clock tick at 120 BPM. A delay beyond one tick pushes the whole
/// remaining schedule instead of piling up as lag; jitter below it does not
/// move the clock.
const DRAG_THRESHOLD_MS: f64 = 1000.0 / ((120.0 / 60.0) * 24.0);

pub struct Playback {
    /// The dispatched pins, each with its measured delay.
    pub pins: Vec<Pin>,
    /// Accumulated schedule slippage.
    pub total_drag_ms: f64,
}

/// Dispatches every pin at its scheduled time, sleeping with sub-millisecond
/// resolution and measuring the per-pin delivery error.
pub fn run(pins: Vec<Pin>, registry: &mut Registry) -> Playback {
    let sleeper = timing::sleeper();
    let start = Instant::now();
    let mut total_drag_ms = 0.0f64;
    let mut processed = Vec::with_capacity(pins.len());

    for mut pin in pins {
        let target_us = ((pin.time_ms + total_drag_ms) * 1000.0).round() as u64;
        let elapsed_us = start.elapsed().as_micros() as u64;
        sleeper.sleep(Duration::from_micros(target_us.saturating_sub(elapsed_us)));

        let pluck_us = start.elapsed().as_micros() as i64;
        registry.send(pin.endpoint, &pin.bytes);

        let delay_ms = (pluck_us - target_us as i64) as f64 / 1000.0;
        pin.delay_ms = Some(delay_ms);
        if delay_ms > DRAG_THRESHOLD_MS {
            total_drag_ms += delay_ms - DRAG_THRESHOLD_MS;
        }

        processed.push(pin);
    }

    Playback {
        pins: processed,
        total_drag_ms,
    }
}

#[cfg(test)]
mod test {
    use crate::midi::mock::MockTransport;
    use crate::pin::dispatch_priority;

    use super::*;

    fn pin(time_ms: f64, bytes: Vec<u8>) -> Pin {
        let data1 = bytes.get(1).copied().unwrap_or(0);
        let priority = dispatch_priority(bytes[0], data1);
        Pin::new(time_ms, 0, bytes, priority)
    }

    #[test]
    fn test_run_dispatches_in_order_at_scheduled_times() {
        let transport = MockTransport::new(&["mock device"]);
        let sent = transport.sent();
        let mut registry = Registry::new(Box::new(transport)).expect("registry");
        assert!(registry.open(0));

        let playback = run(
            vec![
                pin(0.0, vec![0x90, 60, 100]),
                pin(30.0, vec![0x80, 60, 0]),
            ],
            &mut registry,
        );

        let sent = sent.lock().expect("sent lock");
        assert_eq!(2, sent.len());
        assert_eq!(vec![0x90, 60, 100], sent[0].bytes);
        assert_eq!(vec![0x80, 60, 0], sent[1].bytes);
        // The second message must not fire before its 30 ms offset.
        assert!(sent[1].at >= Duration::from_millis(30));

        assert_eq!(0.0, playback.total_drag_ms);
        for pin in &playback.pins {
            let delay_ms = pin.delay_ms.expect("delay recorded");
            assert!(delay_ms >= 0.0);
            // An idle host should dispatch well within one clock tick.
            assert!(delay_ms < DRAG_THRESHOLD_MS, "delay was {}", delay_ms);
        }
    }

    #[test]
    fn test_run_with_no_pins_sends_nothing() {
        let transport = MockTransport::new(&["mock device"]);
        let sent = transport.sent();
        let mut registry = Registry::new(Box::new(transport)).expect("registry");

        let playback = run(Vec::new(), &mut registry);

        assert!(playback.pins.is_empty());
        assert_eq!(0.0, playback.total_drag_ms);
        assert!(sent.lock().expect("sent lock").is_empty());
    }

    #[test]
    fn test_drag_threshold_is_one_clock_tick_at_120_bpm() {
        assert!((DRAG_THRESHOLD_MS - 20.833).abs() < 0.001);
    }
}
