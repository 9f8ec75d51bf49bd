//! Global color transforms: brightness, contrast, saturation.
//!
//! All three are percentages in [0, 200] with 100 as identity. They apply
//! to the base image only; overlays are stamped afterwards and are never
//! filtered.

use clipmark_media_model::FilterSettings;

use crate::frame::RawFrame;

/// Rec. 601 luma weights, used for the saturation mix.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Apply the filter settings to every pixel of the frame in place.
///
/// Identity settings leave the buffer byte-for-byte untouched.
pub fn apply_filters(frame: &mut RawFrame, filters: &FilterSettings) {
    if filters.is_identity() {
        return;
    }

    let brightness = filters.brightness as f32 / 100.0;
    let contrast = filters.contrast as f32 / 100.0;
    let saturation = filters.saturation as f32 / 100.0;

    for pixel in frame.image_mut().pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let (mut r, mut g, mut b) = (r as f32, g as f32, b as f32);

        // Brightness scales channels toward black/white.
        r *= brightness;
        g *= brightness;
        b *= brightness;

        // Contrast pivots around mid-gray.
        r = (r - 128.0) * contrast + 128.0;
        g = (g - 128.0) * contrast + 128.0;
        b = (b - 128.0) * contrast + 128.0;

        // Saturation mixes each channel with its luma.
        let luma = LUMA_R * r + LUMA_G * g + LUMA_B * b;
        r = luma + (r - luma) * saturation;
        g = luma + (g - luma) * saturation;
        b = luma + (b - luma) * saturation;

        pixel.0 = [clamp_u8(r), clamp_u8(g), clamp_u8(b), a];
    }
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
