//! UI image stream records.

use bytes::Bytes;
use serde::Deserialize;

/// Header of one image tile in the UI overlay stream.
///
/// `size` counts the whole binary payload (color plane plus alpha plane);
/// `alpha_size` is the alpha-plane portion. `is_frame == 1` marks the tile
/// that completes a full frame, which must be presented atomically together
/// with the tiles received since the previous completed frame.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UiImageHeader {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub size: u32,
    pub alpha_size: u32,
    pub is_frame: i32,
}

impl UiImageHeader {
    /// Bytes of the color plane (`size - alpha_size`).
    pub fn color_size(&self) -> u32 {
        self.size.saturating_sub(self.alpha_size)
    }
}

/// One assembled image tile: header plus its separated planes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiImage {
    pub header: UiImageHeader,
    /// Color plane, `header.color_size()` bytes.
    pub img: Bytes,
    /// Alpha plane, `header.alpha_size` bytes (empty when no alpha).
    pub alpha_img: Bytes,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
