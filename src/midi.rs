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
mod midir;
#[cfg(test)]
pub mod mock;

/// A MIDI output transport: a set of output ports addressed by index that
/// byte buffers can be pushed to. Ports are enumerated once at construction.
pub trait Transport {
    /// The names of the available output ports, in port-index order.
    fn port_names(&self) -> &[String];

    /// Opens the given port. Opening an already-open port is a no-op.
    fn open(&mut self, port: usize) -> Result<(), TransportError>;

    /// Closes the given port if it is open.
    fn close(&mut self, port: usize);

    /// Sends one MIDI message on an opened port.
    fn send(&mut self, port: usize, bytes: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI backend initialization failed: {0}")]
    Init(String),
    #[error("no MIDI output port at index {0}")]
    UnknownPort(usize),
    #[error("unable to open MIDI output port {port} ({name}): {reason}")]
    Open {
        port: usize,
        name: String,
        reason: String,
    },
    #[error("MIDI output port {0} is not open")]
    NotOpen(usize),
    #[error("unable to send on MIDI output port {port}: {reason}")]
    Send { port: usize, reason: String },
}

/// Gets the system MIDI output transport.
pub fn output_transport() -> Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(midir::MidirOutput::new()?))
}

/// Lists the names of the MIDI output devices known to midir.
pub fn list_devices() -> Result<Vec<String>, TransportError> {
    Ok(output_transport()?.port_names().to_vec())
}
