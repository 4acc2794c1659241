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
use std::fmt;
use std::time::Duration;

use crate::pin::Pin;

/// Aggregated outcome of one playback run.
#[derive(Debug)]
pub struct PlaybackStats {
    /// Time spent ingesting, sorting, and scrubbing before the first send.
    pub pre_processing: Duration,
    pub total_processed: usize,
    pub total_redundant: usize,
    pub total_excluded: usize,
    pub total_drag_ms: f64,
    pub delay: DelayStats,
}

/// Distribution of the measured per-pin delivery errors.
#[derive(Debug, Default)]
pub struct DelayStats {
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
}

impl DelayStats {
    pub fn from_pins(pins: &[Pin]) -> DelayStats {
        let delays: Vec<f64> = pins.iter().filter_map(|pin| pin.delay_ms).collect();
        if delays.is_empty() {
            return DelayStats::default();
        }

        let total_ms: f64 = delays.iter().sum();
        let mean_ms = total_ms / delays.len() as f64;
        let variance = delays
            .iter()
            .map(|delay| (delay - mean_ms) * (delay - mean_ms))
            .sum::<f64>()
            / delays.len() as f64;

        DelayStats {
            total_ms,
            min_ms: delays.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: delays.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_ms,
            std_dev_ms: variance.sqrt(),
        }
    }
}

impl fmt::Display for PlaybackStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\tPre-processing (ms):    {:.3}",
            self.pre_processing.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "\tTotal processed Midi Messages (sent):     {}",
            self.total_processed
        )?;
        writeln!(
            f,
            "\tTotal redundant Midi Messages (not sent): {}",
            self.total_redundant
        )?;
        writeln!(
            f,
            "\tTotal excluded Midi Messages (invalid):   {}",
            self.total_excluded
        )?;
        writeln!(f, "\tTotal drag (ms):        {:.3}", self.total_drag_ms)?;
        writeln!(f, "\tAccumulated delay (ms): {:.3}", self.delay.total_ms)?;
        writeln!(f, "\tMinimum delay (ms):     {:.3}", self.delay.min_ms)?;
        writeln!(f, "\tMaximum delay (ms):     {:.3}", self.delay.max_ms)?;
        writeln!(f, "\tAverage delay (ms):     {:.3}", self.delay.mean_ms)?;
        write!(
            f,
            "\tDelay deviation (ms):   {:.3}",
            self.delay.std_dev_ms
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pin_with_delay(delay_ms: f64) -> Pin {
        let mut pin = Pin::new(0.0, 0, vec![0x90, 60, 100], 0x50);
        pin.delay_ms = Some(delay_ms);
        pin
    }

    #[test]
    fn test_delay_stats_from_empty_stream() {
        let stats = DelayStats::from_pins(&[]);
        assert_eq!(0.0, stats.total_ms);
        assert_eq!(0.0, stats.min_ms);
        assert_eq!(0.0, stats.max_ms);
        assert_eq!(0.0, stats.mean_ms);
        assert_eq!(0.0, stats.std_dev_ms);
    }

    #[test]
    fn test_delay_stats_distribution() {
        let pins = vec![
            pin_with_delay(1.0),
            pin_with_delay(2.0),
            pin_with_delay(3.0),
            pin_with_delay(6.0),
        ];
        let stats = DelayStats::from_pins(&pins);

        assert_eq!(12.0, stats.total_ms);
        assert_eq!(1.0, stats.min_ms);
        assert_eq!(6.0, stats.max_ms);
        assert_eq!(3.0, stats.mean_ms);
        // Variance of [1, 2, 3, 6] around 3 is 3.5.
        assert!((stats.std_dev_ms - 3.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_pins_without_delay_are_ignored() {
        let pins = vec![
            pin_with_delay(2.0),
            Pin::new(0.0, 0, vec![0x90, 60, 100], 0x50),
        ];
        let stats = DelayStats::from_pins(&pins);
        assert_eq!(2.0, stats.total_ms);
        assert_eq!(2.0, stats.mean_ms);
    }
}
