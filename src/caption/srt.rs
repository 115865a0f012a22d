//! SubRip document generation

use std::fmt::Write;

use crate::caption::Cue;

/// Format seconds as `HH:MM:SS,mmm`.
///
/// Milliseconds are truncated, not rounded. Negative or non-finite input
/// clamps to zero.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Render cues as an SRT document, numbering them from 1 in input order
pub fn format_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}
