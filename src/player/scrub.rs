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
use std::collections::HashMap;

use tracing::debug;

use crate::pin::{dispatch_priority, Pin};

use super::registry::Registry;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const KEY_PRESSURE: u8 = 0xA0;
const CONTROL_CHANGE: u8 = 0xB0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const PITCH_BEND: u8 = 0xE0;
const SONG_POSITION: u8 = 0xF2;
const TIMING_CLOCK: u8 = 0xF8;
const CLOCK_START: u8 = 0xFA;
const CLOCK_CONTINUE: u8 = 0xFB;
const CLOCK_STOP: u8 = 0xFC;

/// A Note On that has not been closed by a Note Off yet.
struct OpenNote {
    /// The original Note On status byte, channel in the low nibble.
    status: u8,
    key: u8,
    velocity: u8,
    /// Concurrent duplicates of this note.
    level: u32,
    /// Index of the first Note On in the output stream.
    pin: usize,
}

/// The last clock-family pin emitted to an endpoint. Its status byte may
/// still be rewritten when later clock pins arrive.
struct ClockPin {
    pin: usize,
    time_ms: f64,
    status: u8,
}

#[derive(Default)]
struct EndpointState {
    notes_on: Vec<OpenNote>,
    /// (status << 8 | controller-or-key) -> last value.
    last_cc_kp: HashMap<u16, u8>,
    /// status -> last data bytes, for Pitch Bend and Channel Pressure.
    last_bend_cp: HashMap<u8, (u8, u8)>,
    last_clock: Option<ClockPin>,
    /// (time, data bytes) of the last Song Position Pointer.
    last_song_pointer: Option<(f64, u8, u8)>,
}

pub struct Scrub {
    pub pins: Vec<Pin>,
    pub redundant: usize,
}

/// Walks the sorted pin stream once, dropping redundant pins, rewriting
/// clock statuses into a well-formed Start..Timing..Stop sequence, and
/// closing whatever is still sounding at the end. Running the pass on its
/// own output changes nothing.
pub fn scrub(pins: Vec<Pin>, registry: &Registry) -> Scrub {
    let mut pass = Pass {
        out: Vec::with_capacity(pins.len()),
        redundant: 0,
        states: registry
            .endpoints()
            .iter()
            .map(|_| EndpointState::default())
            .collect(),
    };

    // The closure fires at the schedule's true end, even when the last
    // authored pin itself gets dropped as redundant.
    let last_time_ms = pins.last().map(|pin| pin.time_ms);

    for pin in pins {
        match pin.action() {
            NOTE_OFF => pass.note_off(pin),
            NOTE_ON => pass.note_on(pin),
            CONTROL_CHANGE | KEY_PRESSURE => pass.cc_or_key_pressure(pin),
            CHANNEL_PRESSURE => pass.channel_pressure(pin),
            PITCH_BEND => pass.pitch_bend(pin),
            0xF0 => match pin.status() {
                TIMING_CLOCK | CLOCK_START | CLOCK_CONTINUE | CLOCK_STOP => pass.clock(pin),
                SONG_POSITION => pass.song_position(pin),
                // SysEx, Tune Request, MTC, Song Select, Active Sensing, Reset.
                _ => pass.out.push(pin),
            },
            // Program Change is never redundant.
            _ => pass.out.push(pin),
        }
    }

    pass.close(registry, last_time_ms);

    debug!(
        kept = pass.out.len(),
        redundant = pass.redundant,
        "Scrubbed pin stream."
    );

    Scrub {
        pins: pass.out,
        redundant: pass.redundant,
    }
}

struct Pass {
    out: Vec<Pin>,
    redundant: usize,
    states: Vec<EndpointState>,
}

impl Pass {
    fn drop_redundant(&mut self, pin: &Pin) {
        self.redundant += 1;
        debug!(
            time_ms = pin.time_ms,
            status = format!("{:#04X}", pin.status()),
            "Dropping redundant pin."
        );
    }

    fn note_off(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        let (channel, key) = (pin.channel(), pin.data1());
        match state
            .notes_on
            .iter()
            .position(|note| note.status & 0x0F == channel && note.key == key)
        {
            Some(i) if state.notes_on[i].level == 1 => {
                state.notes_on.remove(i);
                self.out.push(pin);
            }
            Some(i) => {
                // One of the stacked Note Ons is still sounding.
                state.notes_on[i].level -= 1;
                self.drop_redundant(&pin);
            }
            None => self.drop_redundant(&pin),
        }
    }

    fn note_on(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        let (channel, key) = (pin.channel(), pin.data1());
        match state
            .notes_on
            .iter()
            .position(|note| note.status & 0x0F == channel && note.key == key)
        {
            Some(i) => {
                let stored = state.notes_on[i].velocity;
                let incoming = pin.data2();
                if (stored == 0) != (incoming == 0) {
                    // Velocity flips between zero and non-zero: track the new
                    // value but leave the note open.
                    state.notes_on[i].velocity = incoming;
                    self.out.push(pin);
                } else {
                    // A true duplicate. Stack it, and interleave a Note Off so
                    // the hardware re-triggers instead of silently merging.
                    state.notes_on[i].level += 1;
                    let first = state.notes_on[i].pin;
                    self.out[first].level = state.notes_on[i].level;

                    let off_status = NOTE_OFF | channel;
                    self.out.push(Pin::new(
                        pin.time_ms,
                        pin.endpoint,
                        vec![off_status, key, 0],
                        dispatch_priority(off_status, key),
                    ));
                    self.out.push(pin);
                }
            }
            None => {
                state.notes_on.push(OpenNote {
                    status: pin.status(),
                    key,
                    velocity: pin.data2(),
                    level: 1,
                    pin: self.out.len(),
                });
                self.out.push(pin);
            }
        }
    }

    fn cc_or_key_pressure(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        let key = u16::from(pin.status()) << 8 | u16::from(pin.data1());
        match state.last_cc_kp.get(&key) {
            Some(&value) if value == pin.data2() => self.drop_redundant(&pin),
            _ => {
                state.last_cc_kp.insert(key, pin.data2());
                self.out.push(pin);
            }
        }
    }

    fn channel_pressure(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        match state.last_bend_cp.get(&pin.status()) {
            Some(&(value, _)) if value == pin.data1() => self.drop_redundant(&pin),
            _ => {
                state.last_bend_cp.insert(pin.status(), (pin.data1(), 0));
                self.out.push(pin);
            }
        }
    }

    fn pitch_bend(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        match state.last_bend_cp.get(&pin.status()) {
            Some(&(d1, d2)) if d1 == pin.data1() && d2 == pin.data2() => self.drop_redundant(&pin),
            _ => {
                state
                    .last_bend_cp
                    .insert(pin.status(), (pin.data1(), pin.data2()));
                self.out.push(pin);
            }
        }
    }

    /// The clock state machine. Whatever the author labelled the events, the
    /// emitted sequence per endpoint reads Start, Timing..., Stop: the first
    /// clock pin becomes Start, duplicates within the same millisecond
    /// collapse onto one pin, and any transition out of Stop becomes
    /// Continue.
    fn clock(&mut self, mut pin: Pin) {
        let incoming = pin.status();
        let last = self.states[pin.endpoint]
            .last_clock
            .as_ref()
            .map(|clock| (clock.pin, clock.time_ms, clock.status));

        match last {
            None => {
                if incoming != CLOCK_STOP {
                    pin.set_status(CLOCK_START);
                }
                self.track_clock(pin);
            }
            Some((last_pin, last_time, last_status)) if last_time == pin.time_ms => {
                // Collapse onto the pin already emitted at this millisecond.
                let collapsed = match incoming {
                    TIMING_CLOCK | CLOCK_START => {
                        if last_status == CLOCK_STOP {
                            TIMING_CLOCK
                        } else {
                            last_status
                        }
                    }
                    CLOCK_STOP => CLOCK_STOP,
                    _ => TIMING_CLOCK, // Continue
                };
                if collapsed != last_status {
                    self.rewrite_clock(pin.endpoint, last_pin, collapsed);
                }
                self.drop_redundant(&pin);
            }
            Some((last_pin, _, last_status)) => {
                match incoming {
                    TIMING_CLOCK => {
                        if last_status == CLOCK_STOP {
                            pin.set_status(CLOCK_CONTINUE);
                        }
                    }
                    CLOCK_START => {
                        // A Start mid-stream is either a resume or just a tick.
                        if last_status == CLOCK_STOP {
                            pin.set_status(CLOCK_CONTINUE);
                        } else {
                            pin.set_status(TIMING_CLOCK);
                        }
                    }
                    CLOCK_STOP => {
                        if last_status == CLOCK_STOP {
                            self.drop_redundant(&pin);
                            return;
                        }
                    }
                    _ => {
                        // Continue
                        if last_status == CLOCK_START || last_status == CLOCK_CONTINUE {
                            pin.set_status(TIMING_CLOCK);
                        } else if last_status == TIMING_CLOCK {
                            // Materialize the pause the author implied.
                            self.rewrite_clock(pin.endpoint, last_pin, CLOCK_STOP);
                        }
                    }
                }
                self.track_clock(pin);
            }
        }
    }

    fn track_clock(&mut self, pin: Pin) {
        self.states[pin.endpoint].last_clock = Some(ClockPin {
            pin: self.out.len(),
            time_ms: pin.time_ms,
            status: pin.status(),
        });
        self.out.push(pin);
    }

    fn rewrite_clock(&mut self, endpoint: usize, out_index: usize, status: u8) {
        self.out[out_index].set_status(status);
        if let Some(clock) = self.states[endpoint].last_clock.as_mut() {
            clock.status = status;
        }
    }

    fn song_position(&mut self, pin: Pin) {
        let state = &mut self.states[pin.endpoint];
        match state.last_song_pointer {
            Some((time_ms, d1, d2))
                if time_ms == pin.time_ms && d1 == pin.data1() && d2 == pin.data2() =>
            {
                self.drop_redundant(&pin)
            }
            _ => {
                state.last_song_pointer = Some((pin.time_ms, pin.data1(), pin.data2()));
                self.out.push(pin);
            }
        }
    }

    /// End-of-stream closure: every note still sounding gets a Note Off at
    /// the last timestamp, and a clock left ticking is rewritten to Stop.
    fn close(&mut self, registry: &Registry, last_time_ms: Option<f64>) {
        let last_time_ms = match last_time_ms {
            Some(time_ms) => time_ms,
            None => return,
        };

        for (endpoint, state) in self.states.iter_mut().enumerate() {
            if !registry.endpoints()[endpoint].is_open() {
                continue;
            }

            for note in &state.notes_on {
                let status = NOTE_OFF | (note.status & 0x0F);
                self.out.push(Pin::new(
                    last_time_ms,
                    endpoint,
                    vec![status, note.key, note.velocity],
                    dispatch_priority(status, note.key),
                ));
            }
            state.notes_on.clear();

            if let Some(clock) = &state.last_clock {
                if clock.status == TIMING_CLOCK {
                    self.out[clock.pin].set_status(CLOCK_STOP);
                }
            }
        }
    }
}
