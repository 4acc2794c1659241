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
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{Transport, TransportError};

/// One message recorded by the mock transport.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub port: usize,
    pub bytes: Vec<u8>,
    /// Elapsed time since the transport was created.
    pub at: Duration,
}

/// A mock transport. Doesn't actually send anything; it records every
/// message with a timestamp so tests can assert on the dispatched stream.
pub struct MockTransport {
    names: Vec<String>,
    failing: HashSet<usize>,
    open: HashSet<usize>,
    started: Instant,
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl MockTransport {
    pub fn new(names: &[&str]) -> MockTransport {
        MockTransport {
            names: names.iter().map(|name| name.to_string()).collect(),
            failing: HashSet::new(),
            open: HashSet::new(),
            started: Instant::now(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes every open attempt on the given port fail.
    pub fn failing(mut self, port: usize) -> MockTransport {
        self.failing.insert(port);
        self
    }

    /// A handle onto the record of sent messages, valid after the transport
    /// itself has been consumed by the player.
    pub fn sent(&self) -> Arc<Mutex<Vec<SentMessage>>> {
        self.sent.clone()
    }
}

impl Transport for MockTransport {
    fn port_names(&self) -> &[String] {
        &self.names
    }

    fn open(&mut self, port: usize) -> Result<(), TransportError> {
        if port >= self.names.len() {
            return Err(TransportError::UnknownPort(port));
        }
        if self.failing.contains(&port) {
            return Err(TransportError::Open {
                port,
                name: self.names[port].clone(),
                reason: "mock open failure".to_string(),
            });
        }
        self.open.insert(port);
        Ok(())
    }

    fn close(&mut self, port: usize) {
        self.open.remove(&port);
    }

    fn send(&mut self, port: usize, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.open.contains(&port) {
            return Err(TransportError::NotOpen(port));
        }
        self.sent
            .lock()
            .expect("unable to get sent lock")
            .push(SentMessage {
                port,
                bytes: bytes.to_vec(),
                at: self.started.elapsed(),
            });
        Ok(())
    }
}
