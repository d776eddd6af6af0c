use std::str::FromStr;

use crate::foundation::error::{FlipbookError, FlipbookResult};

pub use kurbo::{Circle, Point, Rect};

/// Handle of a drawable element owned by a [`Canvas`](crate::Canvas).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ArtistId(pub u32);

/// Handle of an axes (a plotting region with its own view) owned by a canvas.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct AxesId(pub u32);

/// Current view of an axes. A cached blit background is valid only for the view it was taken in.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ViewSignature {
    /// Visible data range along x.
    pub xlim: [f64; 2],
    /// Visible data range along y.
    pub ylim: [f64; 2],
}

impl ViewSignature {
    /// Create a view signature from x and y limits.
    pub fn new(xlim: [f64; 2], ylim: [f64; 2]) -> Self {
        Self { xlim, ylim }
    }
}

impl Default for ViewSignature {
    fn default() -> Self {
        Self {
            xlim: [0.0, 1.0],
            ylim: [0.0, 1.0],
        }
    }
}

/// Pixels copied out of a canvas region, restorable with
/// [`Canvas::restore_region`](crate::Canvas::restore_region).
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Region the pixels were copied from, in device pixels.
    pub bbox: Rect,
    /// Width of the copied region in pixels.
    pub width: u32,
    /// Height of the copied region in pixels.
    pub height: u32,
    /// Straight-alpha RGBA8 pixels, row-major.
    pub pixels: Vec<u8>,
}

/// Encoding used when a figure renders one frame into a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// TIFF image.
    Tiff,
    /// Windows bitmap.
    Bmp,
    /// Binary portable pixmap.
    Ppm,
    /// Raw RGBA8 bytes written to a `.raw` file.
    Raw,
    /// Raw RGBA8 bytes, row-major, no header.
    Rgba,
    /// SVG document.
    Svg,
}

impl FrameFormat {
    /// File extension (and image subtype) used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Ppm => "ppm",
            Self::Raw => "raw",
            Self::Rgba => "rgba",
            Self::Svg => "svg",
        }
    }

    /// `true` when the format is headerless RGBA8 pixel data.
    pub fn is_raw_rgba(self) -> bool {
        matches!(self, Self::Raw | Self::Rgba)
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FrameFormat {
    type Err = FlipbookError;

    fn from_str(s: &str) -> FlipbookResult<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpeg" | "jpg" => Self::Jpeg,
            "tiff" | "tif" => Self::Tiff,
            "bmp" => Self::Bmp,
            "ppm" => Self::Ppm,
            "raw" => Self::Raw,
            "rgba" => Self::Rgba,
            "svg" => Self::Svg,
            other => {
                return Err(FlipbookError::configuration(format!(
                    "unknown frame format '{other}'"
                )));
            }
        })
    }
}

/// Per-frame render options forwarded to [`Figure::render`](crate::Figure::render).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderOptions {
    /// Override the figure background (straight-alpha RGBA8).
    pub background: Option<[u8; 4]>,
}

/// Pixel size of a figure of `width x height` inches at `dpi`, truncated toward zero.
pub fn pixel_size(width: f64, height: f64, dpi: f64) -> (u32, u32) {
    ((width * dpi) as u32, (height * dpi) as u32)
}
