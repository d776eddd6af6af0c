use std::path::Path;

use anyhow::Context as _;
use base64::Engine as _;

use crate::animation::anim::Animation;
use crate::encode::html::{HtmlOptions, HtmlWriter};
use crate::encode::registry::{WriterKind, WriterRegistry};
use crate::encode::writer::{MovieWriter, WriterSettings, saving};
use crate::figure::Canvas;
use crate::foundation::config::{PlaybackMode, mb_to_bytes};
use crate::foundation::core::RenderOptions;
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Returned by [`Animation::to_html5_video`] when the encoded video exceeds the embed limit.
pub const VIDEO_TOO_LARGE: &str = "Video too large to embed.";

/// Per-frame progress callback: `(frame_number, total_frames)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, Option<usize>);

/// Options of [`save_animations`] and [`Animation::save`].
///
/// Unset values come from the registry's [`Config`](crate::Config) or from the first animation.
#[derive(Default)]
pub struct SaveOptions<'a> {
    /// Writer to use; `None` picks the configured writer, falling back to any available one.
    pub writer: Option<WriterKind>,
    /// Output frame rate; defaults to the first animation's frame rate.
    pub fps: Option<f64>,
    /// Output resolution; defaults to `savefig_dpi`, then to the figure's dpi.
    pub dpi: Option<f64>,
    /// Video codec.
    pub codec: Option<String>,
    /// Bitrate in kbit/s.
    pub bitrate: Option<i64>,
    /// Extra encoder output arguments.
    pub extra_args: Option<Vec<String>>,
    /// Output metadata, in order.
    pub metadata: Vec<(String, String)>,
    /// Options forwarded to every frame render.
    pub render: RenderOptions,
    /// Called once per drawn animation frame.
    pub progress: Option<ProgressFn<'a>>,
}

/// An animation that can be replayed into a movie writer.
///
/// Saving several animations at once advances all of them before drawing any, and stops as
/// soon as one is exhausted.
pub trait Saveable {
    /// Frames a save will produce, when known.
    fn save_count(&self) -> Option<usize>;

    /// Frame rate used when the caller does not pick one.
    fn default_fps(&self) -> f64;

    /// Whether the animation repeats interactively.
    fn repeats(&self) -> bool;

    /// Snapshot the frames to replay and draw a clean base.
    fn begin_save(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()>;

    /// Pull the next saved frame. Returns `false` once the saved pass is exhausted.
    fn advance_saved(&mut self) -> bool;

    /// Draw the frame pulled by [`Saveable::advance_saved`], without blitting.
    fn draw_saved(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()>;

    /// Drop any state left by the saved pass.
    fn end_save(&mut self);
}

impl<T: Clone + 'static> Saveable for Animation<T> {
    fn save_count(&self) -> Option<usize> {
        if !self.frame_cache.is_empty() {
            return Some(self.frame_cache.len());
        }
        self.opts.save_count.or(self.source.len())
    }

    fn default_fps(&self) -> f64 {
        self.fps()
    }

    fn repeats(&self) -> bool {
        self.opts.repeat
    }

    fn begin_save(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()> {
        let pass: Box<dyn Iterator<Item = T>> = if self.frame_cache.is_empty() {
            Box::new(self.source.iter().take(self.save_limit()))
        } else {
            let cached: Vec<T> = self.frame_cache.iter().cloned().collect();
            Box::new(cached.into_iter())
        };
        self.saved_pass = Some(pass);
        self.pending_saved = None;
        self.init_draw(canvas)
    }

    fn advance_saved(&mut self) -> bool {
        self.pending_saved = self.saved_pass.as_mut().and_then(Iterator::next);
        self.pending_saved.is_some()
    }

    fn draw_saved(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()> {
        let Some(frame) = self.pending_saved.take() else {
            return Err(FlipbookError::state("no saved frame pending"));
        };
        self.draw_next_frame(canvas, &frame, false)
    }

    fn end_save(&mut self) {
        self.saved_pass = None;
        self.pending_saved = None;
    }
}

/// Save several animations sharing `canvas` into one movie at `outfile`.
#[tracing::instrument(skip_all, fields(outfile = %outfile.display()))]
pub fn save_animations<C: Canvas>(
    anims: &mut [&mut dyn Saveable],
    canvas: &mut C,
    outfile: &Path,
    registry: &WriterRegistry,
    opts: SaveOptions<'_>,
) -> FlipbookResult<()> {
    let Some(first) = anims.first() else {
        return Err(FlipbookError::state("no animation to save"));
    };
    let cfg = registry.config();
    let kind = registry.resolve(opts.writer)?;
    let fps = opts.fps.unwrap_or_else(|| first.default_fps());

    let mut settings = WriterSettings::from_config(cfg, Some(fps));
    if let Some(codec) = opts.codec {
        settings = settings.with_codec(codec);
    }
    if let Some(bitrate) = opts.bitrate {
        settings = settings.with_bitrate(bitrate);
    }
    settings.extra_args = opts.extra_args;
    settings.metadata = opts.metadata;

    let mut writer = registry.create(kind, settings)?;
    tracing::info!(writer = %kind, fps, "saving animation");
    let dpi = opts.dpi.or(cfg.savefig_dpi);
    save_with_writer(
        anims,
        canvas,
        outfile,
        writer.as_mut(),
        dpi,
        &opts.render,
        opts.progress,
    )
}

/// Save several animations through a prepared writer.
///
/// The canvas is flagged as saving for the duration, so animations do not start on the draws
/// the save loop triggers. The flag is cleared on every exit path.
#[tracing::instrument(skip_all, fields(writer = writer.name(), outfile = %outfile.display()))]
pub fn save_with_writer<C: Canvas>(
    anims: &mut [&mut dyn Saveable],
    canvas: &mut C,
    outfile: &Path,
    writer: &mut dyn MovieWriter,
    dpi: Option<f64>,
    render: &RenderOptions,
    mut progress: Option<ProgressFn<'_>>,
) -> FlipbookResult<()> {
    if anims.is_empty() {
        return Err(FlipbookError::state("no animation to save"));
    }
    let total = anims
        .iter()
        .map(|a| a.save_count())
        .sum::<Option<usize>>();

    canvas.set_saving(true);
    let result = saving(writer, canvas, outfile, dpi, |writer, canvas| {
        for anim in anims.iter_mut() {
            anim.begin_save(&mut *canvas)?;
        }
        let mut frame_number = 0;
        'frames: loop {
            for anim in anims.iter_mut() {
                if !anim.advance_saved() {
                    break 'frames;
                }
            }
            for anim in anims.iter_mut() {
                anim.draw_saved(&mut *canvas)?;
                if let Some(report) = progress.as_deref_mut() {
                    report(frame_number, total);
                }
                frame_number += 1;
            }
            writer.grab_frame(&mut *canvas, render)?;
        }
        Ok(frame_number)
    });
    for anim in anims.iter_mut() {
        anim.end_save();
    }
    canvas.set_saving(false);

    let drawn = result?;
    tracing::debug!(frames = drawn, "animation saved");
    Ok(())
}

impl<T: Clone + 'static> Animation<T> {
    /// Save this animation into `outfile`.
    pub fn save<C: Canvas>(
        &mut self,
        canvas: &mut C,
        outfile: impl AsRef<Path>,
        registry: &WriterRegistry,
        opts: SaveOptions<'_>,
    ) -> FlipbookResult<()> {
        let mut anims: [&mut dyn Saveable; 1] = [self];
        save_animations(&mut anims, canvas, outfile.as_ref(), registry, opts)
    }

    /// Save this animation through a prepared writer.
    pub fn save_with<C: Canvas>(
        &mut self,
        canvas: &mut C,
        outfile: impl AsRef<Path>,
        writer: &mut dyn MovieWriter,
        dpi: Option<f64>,
    ) -> FlipbookResult<()> {
        let mut anims: [&mut dyn Saveable; 1] = [self];
        save_with_writer(
            &mut anims,
            canvas,
            outfile.as_ref(),
            writer,
            dpi,
            &RenderOptions::default(),
            None,
        )
    }

    /// An HTML `<video>` tag with the animation encoded as base64 h264.
    ///
    /// Uses the configured writer, which must be a process encoder. When the encoded video
    /// reaches the embed limit (`embed_limit_mb`, else the configured one) a warning is
    /// logged and [`VIDEO_TOO_LARGE`] is returned. A successful result is cached.
    pub fn to_html5_video<C: Canvas>(
        &mut self,
        canvas: &mut C,
        registry: &WriterRegistry,
        embed_limit_mb: Option<f64>,
    ) -> FlipbookResult<String> {
        if let Some(tag) = &self.html5_video {
            return Ok(tag.clone());
        }
        let cfg = registry.config();
        let kind = cfg.writer.parse::<WriterKind>()?;
        if matches!(kind, WriterKind::Gif | WriterKind::Html) {
            return Err(FlipbookError::configuration(format!(
                "writer '{kind}' cannot produce an embeddable video"
            )));
        }
        let kind = registry.resolve(Some(kind))?;
        let settings = WriterSettings::from_config(cfg, Some(self.fps())).with_codec("h264");
        let mut writer = registry.create(kind, settings)?;

        let dir = tempfile::Builder::new()
            .prefix("flipbook-video-")
            .tempdir()
            .context("create temporary directory")?;
        let path = dir.path().join("temp.m4v");
        self.save_with(canvas, &path, writer.as_mut(), cfg.savefig_dpi)?;
        let bytes = std::fs::read(&path).with_context(|| format!("read '{}'", path.display()))?;
        let video = base64::engine::general_purpose::STANDARD.encode(bytes);

        let limit = mb_to_bytes(embed_limit_mb.unwrap_or(cfg.embed_limit_mb));
        if video.len() as u64 >= limit {
            tracing::warn!(
                size_bytes = video.len(),
                limit_bytes = limit,
                "animation size exceeds the embed limit; raise embed_limit_mb to embed it"
            );
            return Ok(VIDEO_TOO_LARGE.to_owned());
        }
        let (width, height) = writer.frame_size().unwrap_or_default();
        let mut options = vec!["controls", "autoplay"];
        if self.opts.repeat {
            options.push("loop");
        }
        let tag = format!(
            "<video width=\"{width}\" height=\"{height}\" {}>\n  \
             <source type=\"video/mp4\" src=\"data:video/mp4;base64,{video}\">\n  \
             Your browser does not support the video tag.\n\
             </video>",
            options.join(" ")
        );
        self.html5_video = Some(tag.clone());
        Ok(tag)
    }

    /// A self-contained HTML page playing the animation with JavaScript.
    ///
    /// `fps` defaults to the animation's frame rate and `default_mode` to
    /// [`PlaybackMode::Loop`] for repeating animations, else [`PlaybackMode::Once`]. The page is
    /// cached after the first call.
    pub fn to_jshtml<C: Canvas>(
        &mut self,
        canvas: &mut C,
        registry: &WriterRegistry,
        fps: Option<f64>,
        embed_frames: bool,
        default_mode: Option<PlaybackMode>,
    ) -> FlipbookResult<String> {
        if let Some(page) = &self.jshtml {
            return Ok(page.clone());
        }
        let cfg = registry.config();
        let fps = fps.unwrap_or_else(|| self.fps());
        let mode = default_mode.unwrap_or(if self.opts.repeat {
            PlaybackMode::Loop
        } else {
            PlaybackMode::Once
        });
        let opts = HtmlOptions {
            embed_frames,
            ..HtmlOptions::from_config(cfg).with_mode(mode)
        };
        let mut writer = HtmlWriter::new(&WriterSettings::from_config(cfg, Some(fps)), opts)?;

        let dir = tempfile::Builder::new()
            .prefix("flipbook-jshtml-")
            .tempdir()
            .context("create temporary directory")?;
        let path = dir.path().join("temp.html");
        self.save_with(canvas, &path, &mut writer, cfg.savefig_dpi)?;
        let page =
            std::fs::read_to_string(&path).with_context(|| format!("read '{}'", path.display()))?;
        self.jshtml = Some(page.clone());
        Ok(page)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/save.rs"]
mod tests;
