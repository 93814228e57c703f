// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small formatting helpers shared across the crate.

use std::time::Duration;
use swrite::{SWrite, swrite};

/// Formats a wall-clock duration as `H hours M minutes S.SS seconds`, with
/// leading units omitted while the duration is too short for them.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs_f64();
    let mut out = String::new();
    if total > 3600.0 {
        swrite!(out, "{} hours ", (total / 3600.0) as u64);
    }
    if total > 60.0 {
        swrite!(out, "{} minutes ", (total % 3600.0 / 60.0) as u64);
    }
    swrite!(out, "{:.2} seconds", total % 60.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_durations_show_only_seconds() {
        assert_eq!(format_duration(Duration::from_millis(5250)), "5.25 seconds");
        assert_eq!(format_duration(Duration::ZERO), "0.00 seconds");
    }

    #[test]
    fn minutes_appear_past_one_minute() {
        assert_eq!(
            format_duration(Duration::from_secs(65)),
            "1 minutes 5.00 seconds"
        );
    }

    #[test]
    fn hours_appear_past_one_hour() {
        assert_eq!(
            format_duration(Duration::from_secs(3700)),
            "1 hours 1 minutes 40.00 seconds"
        );
    }
}
