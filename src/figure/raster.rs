use std::io::{Cursor, Write};

use anyhow::Context as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use kurbo::Shape as _;

use crate::figure::{Canvas, Figure};
use crate::foundation::core::{
    ArtistId, AxesId, Circle, FrameFormat, Point, Rect, RenderOptions, Snapshot, ViewSignature,
    pixel_size,
};
use crate::foundation::error::{FlipbookError, FlipbookResult};

const AXES_FACE: [u8; 4] = [235, 235, 242, 255];

/// Geometry of a [`RasterFigure`] element, in the data coordinates of its axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArtistShape {
    /// Axis-aligned filled rectangle.
    Rect(Rect),
    /// Filled disc centered on a data point, radius in pixels at the figure's native dpi.
    Marker {
        /// Center in data coordinates.
        center: Point,
        /// Radius in pixels.
        radius: f64,
    },
}

#[derive(Clone, Debug)]
struct AxesSpec {
    /// Position in figure fractions, origin top-left.
    bounds: Rect,
    view: ViewSignature,
}

#[derive(Clone, Debug)]
struct ArtistSpec {
    axes: AxesId,
    shape: ArtistShape,
    color: [u8; 4],
    zorder: f64,
    visible: bool,
    animated: bool,
}

/// Counters describing how a [`RasterFigure`] was driven.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CanvasStats {
    /// Full redraws requested through [`Canvas::draw_idle`].
    pub idle_draws: usize,
    /// Regions pushed through [`Canvas::blit`], in call order.
    pub blits: Vec<Rect>,
    /// Regions copied through [`Canvas::copy_from_bbox`].
    pub snapshots: usize,
    /// Regions restored through [`Canvas::restore_region`].
    pub restores: usize,
    /// Single-element draws through [`Canvas::draw_artist`].
    pub artist_draws: usize,
    /// Frames produced by [`Figure::render`].
    pub renders: usize,
}

/// Software canvas made of axes with filled rectangles and markers.
///
/// It keeps a screen buffer at the native dpi so that blitting works for real: regions copied
/// with [`Canvas::copy_from_bbox`] are byte-exact snapshots of that buffer.
#[derive(Clone, Debug)]
pub struct RasterFigure {
    width_in: f64,
    height_in: f64,
    dpi: f64,
    background: [u8; 4],
    axes: Vec<AxesSpec>,
    artists: Vec<ArtistSpec>,
    screen: RgbaImage,
    saving: bool,
    stats: CanvasStats,
}

impl RasterFigure {
    /// Create an empty figure of `width x height` inches at `dpi`.
    pub fn new(width: f64, height: f64, dpi: f64) -> Self {
        let mut fig = Self {
            width_in: width,
            height_in: height,
            dpi,
            background: [255, 255, 255, 255],
            axes: Vec::new(),
            artists: Vec::new(),
            screen: RgbaImage::new(1, 1),
            saving: false,
            stats: CanvasStats::default(),
        };
        fig.redraw_screen();
        fig
    }

    /// Set the figure background.
    pub fn set_background(&mut self, rgba: [u8; 4]) {
        self.background = rgba;
        self.redraw_screen();
    }

    /// Add an axes occupying `bounds` (figure fractions, origin top-left).
    pub fn add_axes(&mut self, bounds: Rect, view: ViewSignature) -> AxesId {
        self.axes.push(AxesSpec { bounds, view });
        self.redraw_screen();
        AxesId((self.axes.len() - 1) as u32)
    }

    /// Add a visible element to `axes`.
    pub fn add_artist(&mut self, axes: AxesId, shape: ArtistShape, color: [u8; 4]) -> ArtistId {
        let zorder = self.artists.len() as f64;
        self.artists.push(ArtistSpec {
            axes,
            shape,
            color,
            zorder,
            visible: true,
            animated: false,
        });
        ArtistId((self.artists.len() - 1) as u32)
    }

    /// Move or reshape an element.
    pub fn set_shape(&mut self, artist: ArtistId, shape: ArtistShape) {
        if let Some(a) = self.artists.get_mut(artist.0 as usize) {
            a.shape = shape;
        }
    }

    /// Change an element's color.
    pub fn set_color(&mut self, artist: ArtistId, color: [u8; 4]) {
        if let Some(a) = self.artists.get_mut(artist.0 as usize) {
            a.color = color;
        }
    }

    /// Change an element's stacking order.
    pub fn set_zorder(&mut self, artist: ArtistId, zorder: f64) {
        if let Some(a) = self.artists.get_mut(artist.0 as usize) {
            a.zorder = zorder;
        }
    }

    /// Pan or zoom an axes. Cached blit backgrounds for it become stale.
    pub fn set_view(&mut self, axes: AxesId, view: ViewSignature) {
        if let Some(ax) = self.axes.get_mut(axes.0 as usize) {
            ax.view = view;
        }
    }

    /// Whether an element is currently visible.
    pub fn is_visible(&self, artist: ArtistId) -> bool {
        self.artists
            .get(artist.0 as usize)
            .is_some_and(|a| a.visible)
    }

    /// Whether an element is excluded from full redraws.
    pub fn is_animated(&self, artist: ArtistId) -> bool {
        self.artists
            .get(artist.0 as usize)
            .is_some_and(|a| a.animated)
    }

    /// Screen buffer at native dpi.
    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    /// Usage counters.
    pub fn stats(&self) -> &CanvasStats {
        &self.stats
    }

    /// Reset usage counters.
    pub fn reset_stats(&mut self) {
        self.stats = CanvasStats::default();
    }

    fn redraw_screen(&mut self) {
        let (w, h) = pixel_size(self.width_in, self.height_in, self.dpi);
        let mut img = RgbaImage::from_pixel(w.max(1), h.max(1), image::Rgba(self.background));
        self.paint(&mut img, 1.0, false);
        self.screen = img;
    }

    /// Paint axes faces and elements onto `img`. `scale` maps native-dpi pixels to `img` pixels.
    fn paint(&self, img: &mut RgbaImage, scale: f64, include_animated: bool) {
        let (w, h) = (f64::from(img.width()), f64::from(img.height()));
        for ax in &self.axes {
            fill_rect(img, axes_pixels(ax.bounds, w, h), AXES_FACE);
        }
        for idx in self.draw_order() {
            let a = &self.artists[idx];
            if !a.visible || (a.animated && !include_animated) {
                continue;
            }
            self.paint_artist(img, a, scale);
        }
    }

    fn draw_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.artists.len()).collect();
        order.sort_by(|&a, &b| self.artists[a].zorder.total_cmp(&self.artists[b].zorder));
        order
    }

    fn paint_artist(&self, img: &mut RgbaImage, a: &ArtistSpec, scale: f64) {
        let Some(ax) = self.axes.get(a.axes.0 as usize) else {
            return;
        };
        let (w, h) = (f64::from(img.width()), f64::from(img.height()));
        let clip = axes_pixels(ax.bounds, w, h);
        match a.shape {
            ArtistShape::Rect(r) => {
                let p0 = data_to_pixel(Point::new(r.x0, r.y0), ax.view, clip);
                let p1 = data_to_pixel(Point::new(r.x1, r.y1), ax.view, clip);
                let px = Rect::from_points(p0, p1).intersect(clip);
                fill_rect(img, px, a.color);
            }
            ArtistShape::Marker { center, radius } => {
                let c = Circle::new(data_to_pixel(center, ax.view, clip), radius * scale);
                fill_circle(img, c, clip, a.color);
            }
        }
    }

    fn encode(&self, img: RgbaImage, format: FrameFormat) -> FlipbookResult<Vec<u8>> {
        let image_format = match format {
            FrameFormat::Rgba | FrameFormat::Raw => return Ok(img.into_raw()),
            FrameFormat::Svg => return Ok(self.svg_document(img.width(), img.height())),
            FrameFormat::Png => ImageFormat::Png,
            FrameFormat::Jpeg => ImageFormat::Jpeg,
            FrameFormat::Tiff => ImageFormat::Tiff,
            FrameFormat::Bmp => ImageFormat::Bmp,
            FrameFormat::Ppm => ImageFormat::Pnm,
        };
        let dynamic = DynamicImage::ImageRgba8(img);
        let dynamic = match format {
            // Neither encoder accepts an alpha channel.
            FrameFormat::Jpeg | FrameFormat::Ppm => DynamicImage::ImageRgb8(dynamic.to_rgb8()),
            _ => dynamic,
        };
        let mut out = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut out, image_format)
            .with_context(|| format!("encode {format} frame"))?;
        Ok(out.into_inner())
    }

    fn svg_document(&self, w: u32, h: u32) -> Vec<u8> {
        let (wf, hf) = (f64::from(w), f64::from(h));
        let scale = wf / f64::from(self.screen.width().max(1));
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\">\n\
             <rect width=\"{w}\" height=\"{h}\" fill=\"{}\"/>\n",
            css_rgba(self.background)
        );
        for ax in &self.axes {
            let r = axes_pixels(ax.bounds, wf, hf);
            svg.push_str(&svg_rect(r, AXES_FACE));
        }
        for idx in self.draw_order() {
            let a = &self.artists[idx];
            let Some(ax) = self.axes.get(a.axes.0 as usize) else {
                continue;
            };
            if !a.visible {
                continue;
            }
            let clip = axes_pixels(ax.bounds, wf, hf);
            match a.shape {
                ArtistShape::Rect(r) => {
                    let p0 = data_to_pixel(Point::new(r.x0, r.y0), ax.view, clip);
                    let p1 = data_to_pixel(Point::new(r.x1, r.y1), ax.view, clip);
                    svg.push_str(&svg_rect(Rect::from_points(p0, p1).intersect(clip), a.color));
                }
                ArtistShape::Marker { center, radius } => {
                    let c = data_to_pixel(center, ax.view, clip);
                    svg.push_str(&format!(
                        "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>\n",
                        c.x,
                        c.y,
                        radius * scale,
                        css_rgba(a.color)
                    ));
                }
            }
        }
        svg.push_str("</svg>\n");
        svg.into_bytes()
    }
}

impl Figure for RasterFigure {
    fn size_inches(&self) -> (f64, f64) {
        (self.width_in, self.height_in)
    }

    fn set_size_inches(&mut self, width: f64, height: f64) {
        if (width, height) == (self.width_in, self.height_in) {
            return;
        }
        self.width_in = width;
        self.height_in = height;
        self.redraw_screen();
    }

    fn dpi(&self) -> f64 {
        self.dpi
    }

    fn render(
        &mut self,
        sink: &mut dyn Write,
        format: FrameFormat,
        dpi: f64,
        opts: &RenderOptions,
    ) -> FlipbookResult<()> {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(FlipbookError::configuration(format!(
                "render dpi must be positive, got {dpi}"
            )));
        }
        let (w, h) = pixel_size(self.width_in, self.height_in, dpi);
        if w == 0 || h == 0 {
            return Err(FlipbookError::configuration(format!(
                "figure renders to an empty {w}x{h} frame"
            )));
        }
        let bg = opts.background.unwrap_or(self.background);
        let mut img = RgbaImage::from_pixel(w, h, image::Rgba(bg));
        self.paint(&mut img, dpi / self.dpi, true);
        let bytes = self.encode(img, format)?;
        sink.write_all(&bytes).context("write rendered frame")?;
        self.stats.renders += 1;
        Ok(())
    }

    fn is_saving(&self) -> bool {
        self.saving
    }

    fn set_saving(&mut self, saving: bool) {
        self.saving = saving;
    }
}

impl Canvas for RasterFigure {
    fn supports_blit(&self) -> bool {
        true
    }

    fn draw_idle(&mut self) {
        self.redraw_screen();
        self.stats.idle_draws += 1;
    }

    fn set_visible(&mut self, artist: ArtistId, visible: bool) {
        if let Some(a) = self.artists.get_mut(artist.0 as usize) {
            a.visible = visible;
        }
    }

    fn set_animated(&mut self, artist: ArtistId, animated: bool) {
        if let Some(a) = self.artists.get_mut(artist.0 as usize) {
            a.animated = animated;
        }
    }

    fn artist_axes(&self, artist: ArtistId) -> Option<AxesId> {
        self.artists.get(artist.0 as usize).map(|a| a.axes)
    }

    fn zorder(&self, artist: ArtistId) -> f64 {
        self.artists
            .get(artist.0 as usize)
            .map_or(0.0, |a| a.zorder)
    }

    fn draw_artist(&mut self, artist: ArtistId) {
        let Some(a) = self.artists.get(artist.0 as usize).cloned() else {
            return;
        };
        if a.visible {
            let mut screen = std::mem::replace(&mut self.screen, RgbaImage::new(1, 1));
            self.paint_artist(&mut screen, &a, 1.0);
            self.screen = screen;
        }
        self.stats.artist_draws += 1;
    }

    fn view_signature(&self, axes: AxesId) -> ViewSignature {
        self.axes
            .get(axes.0 as usize)
            .map(|ax| ax.view)
            .unwrap_or_default()
    }

    fn axes_bbox(&self, axes: AxesId) -> Rect {
        let (w, h) = (
            f64::from(self.screen.width()),
            f64::from(self.screen.height()),
        );
        self.axes
            .get(axes.0 as usize)
            .map_or(Rect::ZERO, |ax| axes_pixels(ax.bounds, w, h))
    }

    fn copy_from_bbox(&mut self, bbox: Rect) -> Snapshot {
        let (x0, y0, x1, y1) = pixel_span(bbox, self.screen.width(), self.screen.height());
        let mut pixels = Vec::with_capacity(((x1 - x0) * (y1 - y0) * 4) as usize);
        for y in y0..y1 {
            for x in x0..x1 {
                pixels.extend_from_slice(&self.screen.get_pixel(x, y).0);
            }
        }
        self.stats.snapshots += 1;
        Snapshot {
            bbox: Rect::new(f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1)),
            width: x1 - x0,
            height: y1 - y0,
            pixels,
        }
    }

    fn restore_region(&mut self, snapshot: &Snapshot) {
        let x0 = snapshot.bbox.x0 as u32;
        let y0 = snapshot.bbox.y0 as u32;
        for (i, px) in snapshot.pixels.chunks_exact(4).enumerate() {
            let x = x0 + (i as u32 % snapshot.width.max(1));
            let y = y0 + (i as u32 / snapshot.width.max(1));
            if x < self.screen.width() && y < self.screen.height() {
                self.screen
                    .put_pixel(x, y, image::Rgba([px[0], px[1], px[2], px[3]]));
            }
        }
        self.stats.restores += 1;
    }

    fn blit(&mut self, bbox: Rect) {
        self.stats.blits.push(bbox);
    }
}

fn axes_pixels(bounds: Rect, w: f64, h: f64) -> Rect {
    Rect::new(bounds.x0 * w, bounds.y0 * h, bounds.x1 * w, bounds.y1 * h)
}

fn data_to_pixel(p: Point, view: ViewSignature, axes_px: Rect) -> Point {
    let span_x = view.xlim[1] - view.xlim[0];
    let span_y = view.ylim[1] - view.ylim[0];
    let fx = if span_x == 0.0 { 0.0 } else { (p.x - view.xlim[0]) / span_x };
    let fy = if span_y == 0.0 { 0.0 } else { (p.y - view.ylim[0]) / span_y };
    Point::new(
        axes_px.x0 + fx * axes_px.width(),
        axes_px.y1 - fy * axes_px.height(),
    )
}

/// Integer pixel span `[x0, x1) x [y0, y1)` of `r`, clamped to the image.
fn pixel_span(r: Rect, w: u32, h: u32) -> (u32, u32, u32, u32) {
    let clamp = |v: f64, max: u32| v.max(0.0).min(f64::from(max)) as u32;
    let x0 = clamp(r.x0.floor(), w);
    let y0 = clamp(r.y0.floor(), h);
    let x1 = clamp(r.x1.ceil(), w).max(x0);
    let y1 = clamp(r.y1.ceil(), h).max(y0);
    (x0, y0, x1, y1)
}

fn fill_rect(img: &mut RgbaImage, r: Rect, color: [u8; 4]) {
    let (x0, y0, x1, y1) = pixel_span(r, img.width(), img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(img, x, y, color);
        }
    }
}

fn fill_circle(img: &mut RgbaImage, c: Circle, clip: Rect, color: [u8; 4]) {
    let (x0, y0, x1, y1) = pixel_span(c.bounding_box().intersect(clip), img.width(), img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            if c.contains(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)) {
                blend_pixel(img, x, y, color);
            }
        }
    }
}

fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, src: [u8; 4]) {
    let dst = img.get_pixel_mut(x, y);
    let a = u32::from(src[3]);
    if a == 255 {
        dst.0 = src;
        return;
    }
    let inv = 255 - a;
    for i in 0..3 {
        dst.0[i] = ((u32::from(src[i]) * a + u32::from(dst.0[i]) * inv + 127) / 255) as u8;
    }
    dst.0[3] = (a + (u32::from(dst.0[3]) * inv + 127) / 255).min(255) as u8;
}

fn css_rgba(c: [u8; 4]) -> String {
    format!(
        "rgba({},{},{},{:.3})",
        c[0],
        c[1],
        c[2],
        f64::from(c[3]) / 255.0
    )
}

fn svg_rect(r: Rect, color: [u8; 4]) -> String {
    format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>\n",
        r.x0,
        r.y0,
        r.width(),
        r.height(),
        css_rgba(color)
    )
}

#[cfg(test)]
#[path = "../../tests/unit/figure/raster.rs"]
mod tests;
