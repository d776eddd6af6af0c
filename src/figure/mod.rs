//! Renderable-target seams.
//!
//! Writers only need a [`Figure`]: something with a physical size that can render itself into a
//! byte sink. Animations additionally need a [`Canvas`], which exposes the drawable elements,
//! their axes and the region copy/restore primitives used for blitting.

use std::io::Write;

use crate::foundation::core::{
    ArtistId, AxesId, FrameFormat, Rect, RenderOptions, Snapshot, ViewSignature,
};
use crate::foundation::error::FlipbookResult;

/// In-memory reference canvas.
pub mod raster;

/// A target that movie writers capture frames from.
pub trait Figure {
    /// Physical size in inches.
    fn size_inches(&self) -> (f64, f64);

    /// Resize the figure. Implementations should re-layout before the next render.
    fn set_size_inches(&mut self, width: f64, height: f64);

    /// Native resolution in dots per inch.
    fn dpi(&self) -> f64;

    /// Render the current state into `sink` using `format` at `dpi`.
    fn render(
        &mut self,
        sink: &mut dyn Write,
        format: FrameFormat,
        dpi: f64,
        opts: &RenderOptions,
    ) -> FlipbookResult<()>;

    /// `true` while a save loop is capturing frames from this figure.
    fn is_saving(&self) -> bool;

    /// Mark the figure as being saved (or not).
    fn set_saving(&mut self, saving: bool);
}

/// A figure whose elements an animation can draw, hide and blit.
pub trait Canvas: Figure {
    /// Whether region copy/restore/blit are supported. Animations fall back to full redraws
    /// when this is `false`.
    fn supports_blit(&self) -> bool {
        false
    }

    /// Request a full redraw at the host's convenience.
    fn draw_idle(&mut self);

    /// Show or hide an element.
    fn set_visible(&mut self, artist: ArtistId, visible: bool);

    /// Exclude (or include) an element from full redraws; animated elements are drawn by blitting.
    fn set_animated(&mut self, artist: ArtistId, animated: bool);

    /// Axes an element belongs to.
    fn artist_axes(&self, artist: ArtistId) -> Option<AxesId>;

    /// Stacking order of an element; lower draws first.
    fn zorder(&self, artist: ArtistId) -> f64;

    /// Draw a single element onto the current screen buffer.
    fn draw_artist(&mut self, artist: ArtistId);

    /// Current view of an axes.
    fn view_signature(&self, axes: AxesId) -> ViewSignature;

    /// Bounding box of an axes in device pixels.
    fn axes_bbox(&self, axes: AxesId) -> Rect;

    /// Copy the screen pixels under `bbox`.
    fn copy_from_bbox(&mut self, bbox: Rect) -> Snapshot;

    /// Write a previously copied region back onto the screen buffer.
    fn restore_region(&mut self, snapshot: &Snapshot);

    /// Push the screen pixels under `bbox` to the display.
    fn blit(&mut self, bbox: Rect);
}
