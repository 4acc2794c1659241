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

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

use super::TransportError;

const CLIENT_NAME: &str = "jmplay output";

/// The midir-backed output transport. Each open port holds its own
/// connection; connections are created on open and dropped on close.
pub struct MidirOutput {
    ports: Vec<MidiOutputPort>,
    names: Vec<String>,
    connections: HashMap<usize, MidiOutputConnection>,
}

impl MidirOutput {
    pub fn new() -> Result<MidirOutput, TransportError> {
        let output =
            MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;

        let mut ports = Vec::new();
        let mut names = Vec::new();
        for port in output.ports() {
            // Ports whose names can't be read are skipped.
            if let Ok(name) = output.port_name(&port) {
                ports.push(port);
                names.push(name);
            }
        }

        Ok(MidirOutput {
            ports,
            names,
            connections: HashMap::new(),
        })
    }
}

impl super::Transport for MidirOutput {
    fn port_names(&self) -> &[String] {
        &self.names
    }

    fn open(&mut self, port: usize) -> Result<(), TransportError> {
        if self.connections.contains_key(&port) {
            return Ok(());
        }

        let midir_port = self
            .ports
            .get(port)
            .ok_or(TransportError::UnknownPort(port))?;
        let output =
            MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;
        let connection =
            output
                .connect(midir_port, "jmplay player")
                .map_err(|e| TransportError::Open {
                    port,
                    name: self.names[port].clone(),
                    reason: e.to_string(),
                })?;

        self.connections.insert(port, connection);
        Ok(())
    }

    fn close(&mut self, port: usize) {
        if let Some(connection) = self.connections.remove(&port) {
            connection.close();
        }
    }

    fn send(&mut self, port: usize, bytes: &[u8]) -> Result<(), TransportError> {
        let connection = self
            .connections
            .get_mut(&port)
            .ok_or(TransportError::NotOpen(port))?;
        connection.send(bytes).map_err(|e| TransportError::Send {
            port,
            reason: e.to_string(),
        })
    }
}
