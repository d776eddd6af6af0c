use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::encode::writer::{MovieWriter, Session, SessionState, WriterSettings};
use crate::figure::Figure;
use crate::foundation::core::{FrameFormat, RenderOptions};
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// In-process animated GIF writer.
///
/// Frames are kept in memory as RGBA images and encoded on [`MovieWriter::finish`]; the output
/// loops forever.
#[derive(Debug)]
pub struct GifWriter {
    fps: f64,
    session: Session,
    frames: Vec<RgbaImage>,
}

impl GifWriter {
    /// Writer at `settings.fps`. Codec, bitrate and extra arguments do not apply to GIFs.
    pub fn new(settings: &WriterSettings) -> FlipbookResult<Self> {
        settings.validate()?;
        Ok(Self {
            fps: settings.fps,
            session: Session::new(),
            frames: Vec::new(),
        })
    }

    /// Frames captured so far.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Per-frame delay; frame rates too slow for a [`Duration`] get the longest delay a GIF holds.
    fn delay(&self) -> Delay {
        let frame = Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::MAX);
        Delay::from_saturating_duration(frame)
    }
}

impl MovieWriter for GifWriter {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn setup(
        &mut self,
        fig: &mut dyn Figure,
        outfile: &Path,
        dpi: Option<f64>,
    ) -> FlipbookResult<()> {
        self.session.setup("gif", fig, outfile, dpi, None)
    }

    fn grab_frame(&mut self, fig: &mut dyn Figure, opts: &RenderOptions) -> FlipbookResult<()> {
        self.session.begin_frame("gif", fig)?;
        let (w, h) = self
            .session
            .frame_size()
            .ok_or_else(|| FlipbookError::state("gif writer has no frame size"))?;
        let mut raw = Vec::with_capacity((w as usize) * (h as usize) * 4);
        fig.render(&mut raw, FrameFormat::Rgba, self.session.dpi(), opts)?;
        let img = RgbaImage::from_raw(w, h, raw).ok_or_else(|| {
            FlipbookError::state(format!("rendered frame does not match {w}x{h} RGBA"))
        })?;
        self.frames.push(img);
        self.session.frame_grabbed();
        Ok(())
    }

    fn finish(&mut self) -> FlipbookResult<()> {
        self.session.close("gif")?;
        let frames = std::mem::take(&mut self.frames);
        if frames.is_empty() {
            return Err(FlipbookError::state("gif writer finished without any frames"));
        }
        let path = self.session.outfile().to_path_buf();
        let delay = self.delay();
        let count = frames.len();
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder
                .set_repeat(Repeat::Infinite)
                .context("configure gif looping")?;
            encoder
                .encode_frames(
                    frames
                        .into_iter()
                        .map(|img| Frame::from_parts(img, 0, 0, delay)),
                )
                .with_context(|| format!("encode gif '{}'", path.display()))?;
        }
        std::fs::write(&path, &bytes).with_context(|| format!("write '{}'", path.display()))?;
        tracing::info!(frames = count, outfile = %path.display(), "gif written");
        Ok(())
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.session.frame_size()
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
