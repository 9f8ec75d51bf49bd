//! Enhancement configuration for a single export.
//!
//! The configuration is a value object: the orchestrator snapshots and
//! normalizes it when an export starts, and the frame loop only ever sees
//! that snapshot. Changing settings mid-export affects the next export,
//! never the in-flight one.

use serde::{Deserialize, Serialize};

/// Smallest allowed overlay text size in pixels.
pub const MIN_TEXT_SIZE_PX: u32 = 12;

/// Largest allowed overlay text size in pixels.
pub const MAX_TEXT_SIZE_PX: u32 = 72;

/// Filter percentages live in [0, 200]; 100 is identity.
pub const MAX_FILTER_PERCENT: u32 = 200;

/// Identity value for all filter percentages.
pub const IDENTITY_PERCENT: u32 = 100;

/// Watermark, text overlay, and color filter settings for one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Whether the brand watermark is stamped onto every frame.
    pub watermark_enabled: bool,

    /// Watermark anchor.
    pub watermark_position: WatermarkPosition,

    /// Fixed watermark text.
    pub watermark_text: String,

    /// Free text overlay; empty means disabled.
    pub text_overlay: String,

    /// Text overlay anchor.
    pub text_position: OverlayPosition,

    /// Text overlay color.
    pub text_color: RgbColor,

    /// Text overlay size in pixels, clamped to [12, 72].
    pub text_size_px: u32,

    /// Global color filters applied to the base image.
    pub filters: FilterSettings,
}

/// Anchor positions for the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// Anchor positions for the free text overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    #[default]
    BottomCenter,
    BottomRight,
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `RRGGBB` hex string (leading `#` allowed).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }
}

/// Brightness/contrast/saturation percentages, each in [0, 200].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub brightness: u32,
    pub contrast: u32,
    pub saturation: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            brightness: IDENTITY_PERCENT,
            contrast: IDENTITY_PERCENT,
            saturation: IDENTITY_PERCENT,
        }
    }
}

impl FilterSettings {
    /// Whether every filter is at its identity value.
    pub fn is_identity(&self) -> bool {
        self.brightness == IDENTITY_PERCENT
            && self.contrast == IDENTITY_PERCENT
            && self.saturation == IDENTITY_PERCENT
    }

    /// Clamp all percentages into [0, 200].
    pub fn clamped(&self) -> Self {
        Self {
            brightness: self.brightness.min(MAX_FILTER_PERCENT),
            contrast: self.contrast.min(MAX_FILTER_PERCENT),
            saturation: self.saturation.min(MAX_FILTER_PERCENT),
        }
    }
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            watermark_enabled: true,
            watermark_position: WatermarkPosition::default(),
            watermark_text: "clipmark".to_string(),
            text_overlay: String::new(),
            text_position: OverlayPosition::default(),
            text_color: RgbColor::WHITE,
            text_size_px: 24,
            filters: FilterSettings::default(),
        }
    }
}

impl EnhancementConfig {
    /// Whether the free text overlay is active.
    pub fn has_text_overlay(&self) -> bool {
        !self.text_overlay.is_empty()
    }

    /// Return a copy with every field clamped into its domain.
    ///
    /// The pipeline only ever works with normalized snapshots, so
    /// out-of-range caller input degrades to the nearest valid value
    /// instead of failing the export.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        config.text_size_px = config
            .text_size_px
            .clamp(MIN_TEXT_SIZE_PX, MAX_TEXT_SIZE_PX);
        config.filters = config.filters.clamped();
        config
    }
}
