//! Caption segmentation
//!
//! Groups timestamped words into caption cues. A cue is flushed once the
//! pending words reach `words_per_caption` or span `max_caption_duration`,
//! but never before `min_words_per_caption` words are pending. Whatever is
//! left at the end of the transcript becomes one final cue.
//!
//! Segments without word timing are split into `words_per_caption`-token
//! chunks whose times are interpolated across the segment.

use crate::caption::Cue;
use crate::config::CaptionConfig;
use crate::transcript::{TranscriptSegment, Word};

/// Cue ends are widened to at least this far past the start (one SRT tick).
const MIN_CUE_SECS: f64 = 0.001;

/// Words waiting to become a cue
#[derive(Debug, Clone, Default)]
struct Pending {
    words: Vec<String>,
    start: f64,
    end: f64,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn push(mut self, text: &str, start: f64, end: f64) -> Self {
        if self.words.is_empty() {
            self.start = start;
        }
        self.words.push(text.trim().to_string());
        self.end = end;
        self
    }

    fn should_flush(&self, config: &CaptionConfig) -> bool {
        let count = self.words.len();
        let hit_threshold = count >= config.words_per_caption
            || (self.end - self.start) >= config.max_caption_duration;
        hit_threshold && count >= config.min_words_per_caption
    }

    /// Finalize into a cue. `None` when every pending word trimmed to nothing.
    fn into_cue(self) -> Option<Cue> {
        let text = self
            .words
            .iter()
            .filter(|w| !w.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return None;
        }
        let end = if self.end > self.start {
            self.end
        } else {
            self.start + MIN_CUE_SECS
        };
        Some(Cue::new(self.start, end, text))
    }
}

/// Fold state: cues emitted so far plus the words not yet flushed
#[derive(Debug, Default)]
struct Fold {
    cues: Vec<Cue>,
    pending: Pending,
}

impl Fold {
    fn flush(mut self) -> Self {
        let pending = std::mem::take(&mut self.pending);
        self.cues.extend(pending.into_cue());
        self
    }

    fn word(self, word: &Word, config: &CaptionConfig) -> Self {
        let Some((start, end)) = word.timing() else {
            return self;
        };
        let pending = self.pending.push(&word.text, start, end);
        let next = Fold {
            cues: self.cues,
            pending,
        };
        if next.pending.should_flush(config) {
            next.flush()
        } else {
            next
        }
    }

    fn coarse_segment(self, segment: &TranscriptSegment, config: &CaptionConfig) -> Self {
        // Keep cues in time order: pending words precede this segment.
        let mut fold = if self.pending.is_empty() {
            self
        } else {
            self.flush()
        };
        fold.cues.extend(chunk_segment(segment, config.words_per_caption));
        fold
    }

    fn segment(self, segment: &TranscriptSegment, config: &CaptionConfig) -> Self {
        if segment.has_word_timing() {
            segment
                .words
                .iter()
                .fold(self, |fold, word| fold.word(word, config))
        } else {
            self.coarse_segment(segment, config)
        }
    }
}

/// Convert transcript segments into an ordered list of caption cues.
///
/// An empty result means no speech was found; callers decide what that means.
pub fn segment(segments: &[TranscriptSegment], config: &CaptionConfig) -> Vec<Cue> {
    let fold = segments
        .iter()
        .fold(Fold::default(), |fold, seg| fold.segment(seg, config));

    // The trailing remainder is emitted regardless of the minimum.
    let Fold { cues, .. } = fold.flush();

    tracing::debug!(
        segments = segments.len(),
        cues = cues.len(),
        "Segmented transcript into cues"
    );
    cues
}

/// Split a coarse segment into fixed-size token chunks with interpolated timing
fn chunk_segment(segment: &TranscriptSegment, words_per_caption: usize) -> Vec<Cue> {
    let tokens: Vec<&str> = segment.text.split_whitespace().collect();
    let n = tokens.len();
    if n == 0 {
        return Vec::new();
    }
    if !segment.start.is_finite() {
        tracing::debug!(start = segment.start, "Skipping segment without a usable start");
        return Vec::new();
    }

    // Degenerate ranges get one tick per token so every chunk still has end > start
    let span = if segment.end > segment.start && segment.end.is_finite() {
        segment.end - segment.start
    } else {
        MIN_CUE_SECS * n as f64
    };
    let k = words_per_caption.max(1);
    tokens
        .chunks(k)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let i = chunk_idx * k;
            let start = segment.start + (i as f64 / n as f64) * span;
            let end = segment.start + ((i + chunk.len()) as f64 / n as f64) * span;
            Cue::new(start, end, chunk.join(" "))
        })
        .collect()
}
