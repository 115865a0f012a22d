//! Transcript data as produced by the transcription engine

use serde::{Deserialize, Serialize};

/// A single recognised word. Either timestamp may be missing when the
/// aligner could not place the word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub confidence: Option<f32>,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
            confidence: None,
        }
    }

    /// Both timestamps, if the word carries them
    pub fn timing(&self) -> Option<(f64, f64)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// One pause-bounded chunk of speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl TranscriptSegment {
    /// A segment with only coarse timing
    pub fn coarse(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            words: Vec::new(),
        }
    }

    /// A segment built from aligned words; text and bounds derive from them
    pub fn from_words(words: Vec<Word>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let start = words.iter().filter_map(|w| w.start).fold(f64::INFINITY, f64::min);
        let end = words.iter().filter_map(|w| w.end).fold(0.0, f64::max);
        Self {
            text,
            start: if start.is_finite() { start } else { 0.0 },
            end,
            words,
        }
    }

    /// True when at least one word carries complete timing
    pub fn has_word_timing(&self) -> bool {
        self.words.iter().any(|w| w.timing().is_some())
    }
}

/// Full transcription result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}
