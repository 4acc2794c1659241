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

use tracing::{debug, warn};

use crate::document::{Element, MidiMessage, ScoreFile};
use crate::pin::{dispatch_priority, Pin};

use super::registry::Registry;

/// Why a message entry was refused.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Reject {
    #[error("negative time")]
    NegativeTime,
    #[error("missing or out-of-range data byte")]
    BadDataByte,
    #[error("unrecognized status byte")]
    UnknownStatus,
    #[error("empty SysEx payload")]
    EmptySysEx,
    #[error("no endpoint resolved for this clip")]
    NoEndpoint,
    #[error("endpoint unavailable")]
    EndpointUnavailable,
}

pub struct Ingest {
    pub pins: Vec<Pin>,
    pub excluded: usize,
}

/// Walks the document tree and yields one pin per admitted message. A
/// devices directive sets the clip endpoint for the rest of its file;
/// resolution is memoized per distinct candidate list. Refused entries are
/// counted, logged at debug level, and skipped.
pub fn ingest(files: &[ScoreFile], registry: &mut Registry) -> Ingest {
    let mut pins = Vec::new();
    let mut excluded = 0usize;
    let mut resolutions: HashMap<Vec<String>, Option<usize>> = HashMap::new();

    for file in files {
        if !file.is_playable() {
            warn!(
                filetype = format!("{:?}", file.filetype),
                url = format!("{:?}", file.url),
                "Skipping file with unrecognized filetype or url."
            );
            continue;
        }

        let mut clip_endpoint: Option<usize> = None;
        for element in &file.content {
            match element {
                Element::Devices { devices } => {
                    clip_endpoint = *resolutions.entry(devices.clone()).or_insert_with(|| {
                        let resolved = registry.resolve(devices);
                        if resolved.is_none() {
                            warn!(
                                devices = format!("{:?}", devices),
                                "No MIDI device matches any requested name."
                            );
                        }
                        resolved
                    });
                }
                Element::Message {
                    time_ms,
                    midi_message,
                } => match admit(*time_ms, midi_message, clip_endpoint, registry) {
                    Ok(pin) => pins.push(pin),
                    Err(reason) => {
                        excluded += 1;
                        debug!(time_ms = *time_ms, reason = %reason, "Excluded message.");
                    }
                },
                Element::Unrecognized(value) => {
                    excluded += 1;
                    debug!(
                        element = value.to_string(),
                        "Excluded unrecognized element."
                    );
                }
            }
        }
    }

    Ingest { pins, excluded }
}

fn admit(
    time_ms: f64,
    message: &MidiMessage,
    clip_endpoint: Option<usize>,
    registry: &mut Registry,
) -> Result<Pin, Reject> {
    // NaN fails this comparison too.
    if !(time_ms >= 0.0) {
        return Err(Reject::NegativeTime);
    }

    let (bytes, priority) = assemble(message)?;

    let endpoint = clip_endpoint.ok_or(Reject::NoEndpoint)?;
    if !registry.open(endpoint) {
        return Err(Reject::EndpointUnavailable);
    }

    Ok(Pin::new(time_ms, endpoint, bytes, priority))
}

/// Validates a message entry against the MIDI wire grammar and assembles its
/// byte buffer and dispatch priority.
fn assemble(message: &MidiMessage) -> Result<(Vec<u8>, u8), Reject> {
    let status = match u8::try_from(message.status_byte) {
        Ok(status) if status >= 0x80 => status,
        _ => return Err(Reject::UnknownStatus),
    };

    let bytes = match status & 0xF0 {
        // Two-data-byte channel messages.
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => vec![
            status,
            data_byte(message.data_byte_1)?,
            data_byte(message.data_byte_2)?,
        ],
        // One-data-byte channel messages.
        0xC0 | 0xD0 => vec![status, data_byte(message.data_byte)?],
        _ => match status {
            0xF0 => {
                let payload = message.data_bytes.as_ref().ok_or(Reject::EmptySysEx)?;
                if payload.is_empty() {
                    return Err(Reject::EmptySysEx);
                }
                let mut bytes = Vec::with_capacity(payload.len() + 2);
                bytes.push(0xF0);
                for &value in payload {
                    // Rejects stray status bytes (0xF0/0xF7 included) inside
                    // the payload; the delimiters are ours to add.
                    bytes.push(data_byte(Some(value))?);
                }
                bytes.push(0xF7);
                bytes
            }
            // Song Position Pointer.
            0xF2 => vec![
                status,
                data_byte(message.data_byte_1)?,
                data_byte(message.data_byte_2)?,
            ],
            // MTC Quarter Frame and Song Select.
            0xF1 | 0xF3 => vec![status, data_byte(message.data_byte)?],
            // Tune Request, clock family, Active Sensing, Reset.
            0xF6 | 0xF8 | 0xFA | 0xFB | 0xFC | 0xFE | 0xFF => vec![status],
            _ => return Err(Reject::UnknownStatus),
        },
    };

    let data1 = bytes.get(1).copied().unwrap_or(0);
    Ok((bytes, dispatch_priority(status, data1)))
}

fn data_byte(value: Option<i64>) -> Result<u8, Reject> {
    match value {
        Some(value) if (0..=127).contains(&value) => Ok(value as u8),
        _ => Err(Reject::BadDataByte),
    }
}
