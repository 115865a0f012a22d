//! Subtitle styling
//!
//! Builds the style descriptor handed to the renderer and serializes it as an
//! ASS `force_style` string.

pub mod color;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::config::StyleConfig;
pub use color::resolve_color;

/// Accepted caption font sizes
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 12..=72;

/// Where captions sit on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Bottom,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(Position::Top),
            "bottom" => Ok(Position::Bottom),
            other => Err(format!("Position must be 'top' or 'bottom', got '{}'", other)),
        }
    }
}

/// ASS numpad alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    BottomCenter,
    TopCenter,
}

impl Alignment {
    pub fn code(&self) -> u8 {
        match self {
            Alignment::BottomCenter => 2,
            Alignment::TopCenter => 8,
        }
    }
}

impl From<Position> for Alignment {
    fn from(position: Position) -> Self {
        match position {
            Position::Bottom => Alignment::BottomCenter,
            Position::Top => Alignment::TopCenter,
        }
    }
}

/// Per-job styling choices; unset fields come from configuration
#[derive(Debug, Clone, Default)]
pub struct StyleOptions {
    pub font_size: Option<u32>,
    pub font_color: Option<String>,
    pub position: Option<Position>,
}

/// Resolved styling for one burn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescriptor {
    pub font_name: String,
    pub font_size: u32,
    /// `BBGGRR`
    pub primary_color: String,
    pub outline_color: String,
    pub background_color: String,
    pub background_alpha: u8,
    pub outline_width: u32,
    pub shadow_width: u32,
    pub alignment: Alignment,
    pub margin_v: u32,
}

impl StyleDescriptor {
    /// Combine request options with configured defaults.
    ///
    /// Font size is clamped into 12..=72; the HTTP layer rejects out-of-range
    /// values before they get here.
    pub fn build(options: &StyleOptions, defaults: &StyleConfig) -> Self {
        let font_size = options
            .font_size
            .unwrap_or(defaults.font_size)
            .clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
        let font_color = options
            .font_color
            .as_deref()
            .unwrap_or(&defaults.font_color);
        let position = options.position.unwrap_or(defaults.position);

        Self {
            font_name: defaults.font_name.clone(),
            font_size,
            primary_color: resolve_color(font_color),
            outline_color: resolve_color(&defaults.outline_color),
            background_color: resolve_color(&defaults.background_color),
            background_alpha: defaults.background_alpha,
            outline_width: defaults.outline_width,
            shadow_width: defaults.shadow_width,
            alignment: Alignment::from(position),
            margin_v: defaults.margin_v,
        }
    }

    /// Serialize for FFmpeg's `subtitles=...:force_style='...'`
    pub fn to_force_style(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StyleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FontName={},FontSize={},PrimaryColour=&H{},OutlineColour=&H{},BackColour=&H{:02X}{},Outline={},Shadow={},Alignment={},MarginV={}",
            self.font_name,
            self.font_size,
            self.primary_color,
            self.outline_color,
            self.background_alpha,
            self.background_color,
            self.outline_width,
            self.shadow_width,
            self.alignment.code(),
            self.margin_v
        )
    }
}
