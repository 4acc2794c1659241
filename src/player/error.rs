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

/// Typed error for a playback run. Per-endpoint and per-message failures are
/// not errors at this level: they degrade to exclusions and sticky endpoint
/// flags so the rest of the schedule still plays.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Transport enumeration returned no usable output ports.
    #[error("no MIDI output endpoints available")]
    NoEndpointsAvailable,
}
