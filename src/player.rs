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
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, span, Level};

use crate::document::ScoreFile;
use crate::midi::Transport;
use crate::pin;
use crate::timing;

mod error;
mod ingest;
mod playback;
mod registry;
mod scrub;
mod stats;

pub use error::PlayerError;
pub use stats::{DelayStats, PlaybackStats};

use registry::Registry;

/// Held before returning so devices aren't torn down mid-flush.
const DEVICE_SETTLE: Duration = Duration::from_millis(500);

/// Plays the concatenated document files against the host's MIDI output
/// endpoints: ingests and validates every message, sorts them into dispatch
/// order, scrubs the stream of redundant and dangerous events, and drives
/// the high-resolution playback loop. Runs to completion on the calling
/// thread; endpoints close before it returns, on error paths included.
pub fn play_list(
    files: &[ScoreFile],
    transport: Box<dyn Transport>,
) -> Result<PlaybackStats, PlayerError> {
    let span = span!(Level::INFO, "play list");
    let _enter = span.enter();

    timing::request_realtime_priority();

    let mut registry = Registry::new(transport)?;
    for endpoint in registry.endpoints() {
        info!(
            port = endpoint.index(),
            device = endpoint.name(),
            "Available MIDI output port."
        );
    }

    let pre_processing = Instant::now();
    let ingested = ingest::ingest(files, &mut registry);
    let mut pins = ingested.pins;
    pin::sort_by_dispatch_order(&mut pins);
    let scrubbed = scrub::scrub(pins, &registry);
    let pre_processing = pre_processing.elapsed();

    info!(
        pins = scrubbed.pins.len(),
        excluded = ingested.excluded,
        redundant = scrubbed.redundant,
        "Prepared playback schedule."
    );

    let playback = playback::run(scrubbed.pins, &mut registry);

    let stats = PlaybackStats {
        pre_processing,
        total_processed: playback.pins.len(),
        total_redundant: scrubbed.redundant,
        total_excluded: ingested.excluded,
        total_drag_ms: playback.total_drag_ms,
        delay: DelayStats::from_pins(&playback.pins),
    };

    if registry.any_open() {
        thread::sleep(DEVICE_SETTLE);
    }
    registry.close_all();

    Ok(stats)
}
