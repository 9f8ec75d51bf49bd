//! Frame compositor: filter the base image, stamp overlays on top.
//!
//! `composite` is a pure function of `(frame, config)`: no shared state,
//! no caching of text metrics. Right- and center-anchored positions are
//! recomputed on every call because metrics depend on the overlay text,
//! while the output resolution stays fixed for the whole export.

use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_media_model::{EnhancementConfig, OverlayPosition, RgbColor, WatermarkPosition};

use crate::filters::apply_filters;
use crate::font::{draw_text, measure_text};
use crate::frame::RawFrame;

/// Watermark glyph size. The watermark is brand furniture, not caller
/// content, so its size and opacity are fixed.
const WATERMARK_SIZE_PX: u32 = 16;

/// Watermark blend alpha (semi-transparent white).
const WATERMARK_ALPHA: u8 = 160;

/// Distance overlays keep from the frame edge.
const MARGIN_PX: i64 = 12;

/// Composite one frame: color filters over the whole base image first,
/// then watermark and text overlay stamped unfiltered on top.
///
/// Output dimensions always equal input dimensions. A zero-size frame
/// returns `FrameNotReady`; the caller retries on the next tick.
pub fn composite(frame: &RawFrame, config: &EnhancementConfig) -> PipelineResult<RawFrame> {
    if frame.is_empty() {
        return Err(PipelineError::FrameNotReady);
    }

    let mut out = frame.clone();
    apply_filters(&mut out, &config.filters);

    if config.watermark_enabled {
        let (text_w, text_h) = measure_text(&config.watermark_text, WATERMARK_SIZE_PX);
        let (x, y) = watermark_anchor(
            config.watermark_position,
            out.width(),
            out.height(),
            text_w,
            text_h,
        );
        draw_text(
            &mut out,
            &config.watermark_text,
            x,
            y,
            RgbColor::WHITE,
            WATERMARK_SIZE_PX,
            WATERMARK_ALPHA,
        );
    }

    if config.has_text_overlay() {
        let (text_w, text_h) = measure_text(&config.text_overlay, config.text_size_px);
        let (x, y) = overlay_anchor(
            config.text_position,
            out.width(),
            out.height(),
            text_w,
            text_h,
        );
        draw_text(
            &mut out,
            &config.text_overlay,
            x,
            y,
            config.text_color,
            config.text_size_px,
            255,
        );
    }

    Ok(out)
}

/// Top-left corner for the watermark at its five anchors.
fn watermark_anchor(
    position: WatermarkPosition,
    frame_w: u32,
    frame_h: u32,
    text_w: u32,
    text_h: u32,
) -> (i64, i64) {
    let (fw, fh) = (frame_w as i64, frame_h as i64);
    let (tw, th) = (text_w as i64, text_h as i64);
    let (x, y) = match position {
        WatermarkPosition::TopLeft => (MARGIN_PX, MARGIN_PX),
        WatermarkPosition::TopRight => (fw - tw - MARGIN_PX, MARGIN_PX),
        WatermarkPosition::BottomLeft => (MARGIN_PX, fh - th - MARGIN_PX),
        WatermarkPosition::BottomRight => (fw - tw - MARGIN_PX, fh - th - MARGIN_PX),
        WatermarkPosition::Center => ((fw - tw) / 2, (fh - th) / 2),
    };
    clamp_into_frame(x, y, fw, fh, tw, th)
}

/// Top-left corner for the text overlay at its six anchors.
fn overlay_anchor(
    position: OverlayPosition,
    frame_w: u32,
    frame_h: u32,
    text_w: u32,
    text_h: u32,
) -> (i64, i64) {
    let (fw, fh) = (frame_w as i64, frame_h as i64);
    let (tw, th) = (text_w as i64, text_h as i64);
    let (x, y) = match position {
        OverlayPosition::TopLeft => (MARGIN_PX, MARGIN_PX),
        OverlayPosition::TopCenter => ((fw - tw) / 2, MARGIN_PX),
        OverlayPosition::TopRight => (fw - tw - MARGIN_PX, MARGIN_PX),
        OverlayPosition::BottomLeft => (MARGIN_PX, fh - th - MARGIN_PX),
        OverlayPosition::BottomCenter => ((fw - tw) / 2, fh - th - MARGIN_PX),
        OverlayPosition::BottomRight => (fw - tw - MARGIN_PX, fh - th - MARGIN_PX),
    };
    clamp_into_frame(x, y, fw, fh, tw, th)
}

/// Keep the text box inside the frame where the frame allows it; text
/// wider than the frame pins to the left edge and clips on the right.
fn clamp_into_frame(x: i64, y: i64, fw: i64, fh: i64, tw: i64, th: i64) -> (i64, i64) {
    let x = x.clamp(0, (fw - tw).max(0));
    let y = y.clamp(0, (fh - th).max(0));
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmark_media_model::FilterSettings;
    use proptest::prelude::*;

    fn gradient_frame(w: u32, h: u32) -> RawFrame {
        let mut frame = RawFrame::new(w, h);
        for (x, y, pixel) in frame.image_mut().enumerate_pixels_mut() {
            pixel.0 = [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255];
        }
        frame
    }

    fn bare_config() -> EnhancementConfig {
        EnhancementConfig {
            watermark_enabled: false,
            text_overlay: String::new(),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_size_frame_is_not_ready() {
        let err = composite(&RawFrame::new(0, 0), &EnhancementConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::FrameNotReady));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_identity_config_is_pixel_identical() {
        let frame = gradient_frame(64, 48);
        let out = composite(&frame, &bare_config()).unwrap();
        assert_eq!(frame, out);
    }

    #[test]
    fn test_no_overlays_equals_filtered_only_base() {
        let frame = gradient_frame(64, 48);
        let config = EnhancementConfig {
            filters: FilterSettings {
                brightness: 130,
                contrast: 90,
                saturation: 60,
            },
            ..bare_config()
        };

        let mut expected = frame.clone();
        apply_filters(&mut expected, &config.filters);
        let out = composite(&frame, &config).unwrap();
        assert_eq!(expected, out);
    }

    #[test]
    fn test_composite_is_pure() {
        let frame = gradient_frame(80, 60);
        let config = EnhancementConfig {
            text_overlay: "demo".to_string(),
            ..EnhancementConfig::default()
        };
        let first = composite(&frame, &config).unwrap();
        let second = composite(&frame, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_watermark_changes_pixels() {
        let frame = gradient_frame(320, 240);
        let config = EnhancementConfig {
            watermark_enabled: true,
            ..bare_config()
        };
        let out = composite(&frame, &config).unwrap();
        assert_ne!(frame, out);
    }

    #[test]
    fn test_overlays_survive_filters() {
        // Filters run before stamping, so a black-crush filter must not
        // darken the overlay text.
        let frame = gradient_frame(320, 240);
        let config = EnhancementConfig {
            watermark_enabled: false,
            text_overlay: "W".to_string(),
            text_position: OverlayPosition::TopLeft,
            text_color: RgbColor::new(255, 0, 0),
            text_size_px: 24,
            filters: FilterSettings {
                brightness: 0,
                contrast: 100,
                saturation: 100,
            },
            ..Default::default()
        };
        let out = composite(&frame, &config).unwrap();
        let has_red = out
            .image()
            .pixels()
            .any(|p| p.0[0] == 255 && p.0[1] == 0 && p.0[2] == 0);
        assert!(has_red, "overlay text was filtered away");
    }

    #[test]
    fn test_small_frame_overlay_is_clipped_not_panicking() {
        let frame = gradient_frame(20, 10);
        let config = EnhancementConfig {
            watermark_enabled: true,
            watermark_position: WatermarkPosition::BottomRight,
            text_overlay: "a very long caption that cannot fit".to_string(),
            text_size_px: 72,
            ..Default::default()
        };
        let out = composite(&frame, &config).unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    proptest! {
        #[test]
        fn prop_output_dimensions_match_source(
            w in 1u32..256,
            h in 1u32..256,
            watermark in any::<bool>(),
            wm_pos in 0usize..5,
            text in "[ -~]{0,12}",
            text_pos in 0usize..6,
            size in 0u32..100,
            brightness in 0u32..300,
            contrast in 0u32..300,
            saturation in 0u32..300,
        ) {
            let wm_positions = [
                WatermarkPosition::TopLeft,
                WatermarkPosition::TopRight,
                WatermarkPosition::BottomLeft,
                WatermarkPosition::BottomRight,
                WatermarkPosition::Center,
            ];
            let text_positions = [
                OverlayPosition::TopLeft,
                OverlayPosition::TopCenter,
                OverlayPosition::TopRight,
                OverlayPosition::BottomLeft,
                OverlayPosition::BottomCenter,
                OverlayPosition::BottomRight,
            ];
            let config = EnhancementConfig {
                watermark_enabled: watermark,
                watermark_position: wm_positions[wm_pos],
                text_overlay: text,
                text_position: text_positions[text_pos],
                text_size_px: size,
                filters: FilterSettings { brightness, contrast, saturation },
                ..Default::default()
            }.normalized();

            let frame = gradient_frame(w, h);
            let out = composite(&frame, &config).unwrap();
            prop_assert_eq!(out.width(), w);
            prop_assert_eq!(out.height(), h);
        }
    }
}
