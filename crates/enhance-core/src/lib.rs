//! Clipmark Enhance Core
//!
//! Pure per-frame compositing: color filters, watermark stamping, and
//! text overlay drawing. No I/O, no codecs — everything here is a
//! function of a frame and a configuration snapshot, which is what makes
//! the recorder testable without a real video decoder.

pub mod compositor;
pub mod filters;
pub mod font;
pub mod frame;

pub use compositor::composite;
pub use font::{draw_text, measure_text};
pub use frame::RawFrame;
