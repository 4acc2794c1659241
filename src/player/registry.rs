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
use midly::live::LiveEvent;
use tracing::{debug, error, info, warn};

use crate::midi::Transport;

use super::error::PlayerError;

/// One MIDI output endpoint in the registry arena. Pins address endpoints by
/// their index here, valid for the duration of one playback run.
pub struct Endpoint {
    index: usize,
    name: String,
    opened: bool,
    failed: bool,
}

impl Endpoint {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

/// Owns the transport and the endpoint arena. Endpoints open lazily on first
/// use and close on teardown; an endpoint that fails to open stays failed for
/// the rest of the run.
pub struct Registry {
    transport: Box<dyn Transport>,
    endpoints: Vec<Endpoint>,
}

impl Registry {
    /// Enumerates the transport's output ports into an endpoint arena.
    pub fn new(transport: Box<dyn Transport>) -> Result<Registry, PlayerError> {
        let endpoints: Vec<Endpoint> = transport
            .port_names()
            .iter()
            .enumerate()
            .map(|(index, name)| Endpoint {
                index,
                name: name.clone(),
                opened: false,
                failed: false,
            })
            .collect();

        if endpoints.is_empty() {
            return Err(PlayerError::NoEndpointsAvailable);
        }

        Ok(Registry {
            transport,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Tries each candidate in order and returns the first registered
    /// endpoint whose name contains the candidate as a substring.
    pub fn resolve(&self, candidates: &[String]) -> Option<usize> {
        for candidate in candidates {
            if let Some(endpoint) = self
                .endpoints
                .iter()
                .find(|endpoint| endpoint.name.contains(candidate.as_str()))
            {
                return Some(endpoint.index);
            }
        }
        None
    }

    /// Opens the endpoint if it isn't open yet. Returns whether the endpoint
    /// is usable. The first open failure marks the endpoint failed; later
    /// attempts are silent no-ops.
    pub fn open(&mut self, index: usize) -> bool {
        let endpoint = &mut self.endpoints[index];
        if endpoint.opened {
            return true;
        }
        if endpoint.failed {
            return false;
        }

        match self.transport.open(index) {
            Ok(()) => {
                endpoint.opened = true;
                info!(device = endpoint.name, "Midi device connected.");
                true
            }
            Err(e) => {
                endpoint.failed = true;
                warn!(
                    device = endpoint.name,
                    err = e.to_string(),
                    "Unable to open MIDI device; its messages will be skipped."
                );
                false
            }
        }
    }

    /// Pushes one message to an endpoint. Send errors are logged, not
    /// propagated: a flaky device must not stall the rest of the schedule.
    pub fn send(&mut self, index: usize, bytes: &[u8]) {
        match self.transport.send(index, bytes) {
            Ok(()) => {
                if let Ok(event) = LiveEvent::parse(bytes) {
                    debug!(
                        device = self.endpoints[index].name,
                        event = format!("{:?}", event),
                        "Dispatched MIDI event."
                    );
                }
            }
            Err(e) => error!(
                device = self.endpoints[index].name,
                err = e.to_string(),
                "Error sending MIDI event."
            ),
        }
    }

    /// Whether any endpoint is currently open.
    pub fn any_open(&self) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.opened)
    }

    /// Closes every open endpoint. Idempotent.
    pub fn close_all(&mut self) {
        for endpoint in self.endpoints.iter_mut() {
            if endpoint.opened {
                self.transport.close(endpoint.index);
                endpoint.opened = false;
                info!(device = endpoint.name, "Midi device disconnected.");
            }
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close_all();
    }
}
