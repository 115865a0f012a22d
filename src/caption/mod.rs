//! Caption module
//!
//! Turns a transcript into timed caption cues and renders them as SubRip:
//! - Word-level grouping with count and duration thresholds
//! - Proportional chunking for segments without word timing
//! - SRT document generation with `HH:MM:SS,mmm` timestamps

pub mod segmenter;
pub mod srt;

pub use segmenter::segment;
pub use srt::format_srt;

/// One caption: display window in seconds and its text.
///
/// Cues carry no index; numbering happens when the document is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}
