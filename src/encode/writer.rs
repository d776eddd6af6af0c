use std::path::{Path, PathBuf};

use crate::figure::Figure;
use crate::foundation::config::Config;
use crate::foundation::core::{FrameFormat, RenderOptions, pixel_size};
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Lifecycle of a writer session. Sessions are single-use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, `setup` not called yet.
    Created,
    /// Output configured, no frame grabbed yet.
    Setup,
    /// At least one frame grabbed.
    Grabbing,
    /// Finished (successfully or not).
    Closed,
}

/// Contract shared by every movie writer.
///
/// A session is `setup` once, receives zero or more `grab_frame` calls and is terminated by
/// exactly one `finish`. Use [`saving`] to get the teardown guarantee.
pub trait MovieWriter {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Configure the output file and capture geometry for `fig`.
    ///
    /// `dpi` defaults to the figure's own dpi.
    fn setup(&mut self, fig: &mut dyn Figure, outfile: &Path, dpi: Option<f64>)
    -> FlipbookResult<()>;

    /// Capture the current state of `fig` as one frame.
    fn grab_frame(&mut self, fig: &mut dyn Figure, opts: &RenderOptions) -> FlipbookResult<()>;

    /// Complete the output and release every resource the session holds.
    fn finish(&mut self) -> FlipbookResult<()>;

    /// Frame rate of the output.
    fn fps(&self) -> f64;

    /// Pixel size of captured frames, once set up.
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Current session state.
    fn state(&self) -> SessionState;
}

/// Per-session knobs shared by the process-backed writers.
#[derive(Clone, Debug, PartialEq)]
pub struct WriterSettings {
    /// Output frame rate.
    pub fps: f64,
    /// Video codec (ffmpeg-style encoders).
    pub codec: String,
    /// Bitrate in kbit/s; `<= 0` lets the encoder choose.
    pub bitrate: i64,
    /// Extra output arguments; `None` uses the configured defaults for the encoder.
    pub extra_args: Option<Vec<String>>,
    /// Output metadata, emitted in insertion order.
    pub metadata: Vec<(String, String)>,
    /// Frame format for file-buffered writers; `None` uses the configured default.
    pub frame_format: Option<FrameFormat>,
}

impl WriterSettings {
    /// Settings at `fps` with every other value from `cfg`.
    pub fn from_config(cfg: &Config, fps: Option<f64>) -> Self {
        Self {
            fps: fps.unwrap_or(cfg.default_fps),
            codec: cfg.codec.clone(),
            bitrate: cfg.bitrate,
            extra_args: None,
            metadata: Vec::new(),
            frame_format: None,
        }
    }

    /// Override the codec.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Override the bitrate.
    pub fn with_bitrate(mut self, kbps: i64) -> Self {
        self.bitrate = kbps;
        self
    }

    /// Replace the extra output arguments.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Append one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Request a frame format for file-buffered writers.
    pub fn with_frame_format(mut self, format: FrameFormat) -> Self {
        self.frame_format = Some(format);
        self
    }

    pub(crate) fn validate(&self) -> FlipbookResult<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(FlipbookError::configuration(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        Ok(())
    }
}

/// Bookkeeping shared by writer implementations: state transitions and capture geometry.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    state: SessionState,
    outfile: PathBuf,
    dpi: f64,
    size_inches: (f64, f64),
    frame_size: Option<(u32, u32)>,
    frames: usize,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Created,
            outfile: PathBuf::new(),
            dpi: 0.0,
            size_inches: (0.0, 0.0),
            frame_size: None,
            frames: 0,
        }
    }

    /// Record the output and geometry. With `align`, the figure is resized so both pixel
    /// dimensions are multiples of it.
    pub(crate) fn setup(
        &mut self,
        writer: &str,
        fig: &mut dyn Figure,
        outfile: &Path,
        dpi: Option<f64>,
        align: Option<u32>,
    ) -> FlipbookResult<()> {
        if self.state != SessionState::Created {
            return Err(FlipbookError::state(format!(
                "{writer} writer was already set up; writer sessions are single-use"
            )));
        }
        let dpi = dpi.unwrap_or_else(|| fig.dpi());
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(FlipbookError::configuration(format!(
                "dpi must be a positive number, got {dpi}"
            )));
        }

        let (mut w, mut h) = fig.size_inches();
        if let Some(n) = align.filter(|n| *n > 1) {
            let (aw, ah) = adjusted_figsize(w, h, dpi, n);
            if (aw, ah) != (w, h) {
                tracing::info!(
                    writer,
                    from_w = w,
                    from_h = h,
                    to_w = aw,
                    to_h = ah,
                    "figure size adjusted so frame dimensions are multiples of {n}"
                );
                fig.set_size_inches(aw, ah);
                (w, h) = (aw, ah);
            }
        }

        let (pw, ph) = pixel_size(w, h, dpi);
        if pw == 0 || ph == 0 {
            return Err(FlipbookError::configuration(format!(
                "figure of {w}x{h} inches at {dpi} dpi produces an empty {pw}x{ph} frame"
            )));
        }
        tracing::debug!(writer, width = pw, height = ph, dpi, "frame size in pixels");

        self.outfile = outfile.to_path_buf();
        self.dpi = dpi;
        self.size_inches = (w, h);
        self.frame_size = Some((pw, ph));
        self.state = SessionState::Setup;
        Ok(())
    }

    /// Check a frame may be grabbed and restore the session's figure size.
    pub(crate) fn begin_frame(&mut self, writer: &str, fig: &mut dyn Figure) -> FlipbookResult<()> {
        match self.state {
            SessionState::Setup | SessionState::Grabbing => {}
            SessionState::Created => {
                return Err(FlipbookError::state(format!(
                    "{writer} writer: grab_frame called before setup"
                )));
            }
            SessionState::Closed => {
                return Err(FlipbookError::state(format!(
                    "{writer} writer: grab_frame called after finish"
                )));
            }
        }
        // Frames keep the geometry chosen at setup even if the figure was resized since.
        let (w, h) = self.size_inches;
        fig.set_size_inches(w, h);
        Ok(())
    }

    pub(crate) fn frame_grabbed(&mut self) {
        self.frames += 1;
        self.state = SessionState::Grabbing;
    }

    /// Check the session may be finished and mark it closed.
    pub(crate) fn close(&mut self, writer: &str) -> FlipbookResult<()> {
        match self.state {
            SessionState::Setup | SessionState::Grabbing => {
                self.state = SessionState::Closed;
                Ok(())
            }
            SessionState::Created => Err(FlipbookError::state(format!(
                "{writer} writer: finish called before setup"
            ))),
            SessionState::Closed => Err(FlipbookError::state(format!(
                "{writer} writer: finish called twice"
            ))),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn outfile(&self) -> &Path {
        &self.outfile
    }

    pub(crate) fn dpi(&self) -> f64 {
        self.dpi
    }

    pub(crate) fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    pub(crate) fn frames(&self) -> usize {
        self.frames
    }
}

/// Run `body` inside a writer session: `setup`, then `body`, then `finish` no matter how
/// `body` ended.
///
/// When both `body` and `finish` fail, an encoder process failure wins (its captured output
/// usually explains the other error); the other error is logged.
pub fn saving<F, R>(
    writer: &mut dyn MovieWriter,
    fig: &mut F,
    outfile: &Path,
    dpi: Option<f64>,
    body: impl FnOnce(&mut dyn MovieWriter, &mut F) -> FlipbookResult<R>,
) -> FlipbookResult<R>
where
    F: Figure,
{
    writer.setup(fig, outfile, dpi)?;
    let result = body(&mut *writer, &mut *fig);
    let finished = writer.finish();
    match (result, finished) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(body_err), Err(finish_err)) => {
            if finish_err.process_failure().is_some() {
                tracing::warn!(writer = writer.name(), error = %body_err, "saving failed");
                Err(finish_err)
            } else {
                tracing::warn!(
                    writer = writer.name(),
                    error = %finish_err,
                    "finishing writer after a failed save also failed"
                );
                Err(body_err)
            }
        }
    }
}

/// Figure size nudged so that `size * dpi` is a multiple of `n` pixels in both dimensions.
///
/// Each dimension is truncated to the nearest lower multiple. When floating-point roundoff
/// leaves the product one pixel short, the nearest representable sizes above and below are
/// tried (closest first) before settling for the truncated value.
pub fn adjusted_figsize(w: f64, h: f64, dpi: f64, n: u32) -> (f64, f64) {
    (align_dimension(w, dpi, n), align_dimension(h, dpi, n))
}

fn align_dimension(x: f64, dpi: f64, n: u32) -> f64 {
    let n = i64::from(n.max(1));
    let aligned = ((x * dpi / n as f64) as i64 * n) as f64 / dpi;
    correct_roundoff(aligned, dpi, n)
}

fn correct_roundoff(x: f64, dpi: f64, n: i64) -> f64 {
    const MAX_ULPS: usize = 4;
    let fits = |v: f64| (v * dpi) as i64 % n == 0;
    if fits(x) {
        return x;
    }
    let (mut up, mut down) = (x, x);
    for _ in 0..MAX_ULPS {
        up = up.next_up();
        if fits(up) {
            return up;
        }
        down = down.next_down();
        if fits(down) {
            return down;
        }
    }
    x
}

#[cfg(test)]
#[path = "../../tests/unit/encode/writer.rs"]
mod tests;
