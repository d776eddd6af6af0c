use std::path::{Path, PathBuf};

use crate::encode::frames::FrameFiles;
use crate::encode::process::EncoderProcess;
use crate::encode::profile::{CodecProfile, FfmpegProfile, ImageMagickProfile};
use crate::encode::writer::{MovieWriter, Session, SessionState, WriterSettings};
use crate::figure::Figure;
use crate::foundation::config::Config;
use crate::foundation::core::{FrameFormat, RenderOptions};
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// How frames reach the external encoder.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Strategy {
    /// Stream raw frames through the encoder's stdin while it runs.
    #[default]
    Pipe,
    /// Write numbered frame files, then run the encoder once over all of them.
    File {
        /// Where to write the frames; `None` uses a temporary directory.
        frame_prefix: Option<PathBuf>,
        /// Keep frames written under `frame_prefix` after finishing.
        keep_frames: bool,
    },
}

impl Strategy {
    /// File buffering in a temporary directory.
    pub fn file() -> Self {
        Self::File {
            frame_prefix: None,
            keep_frames: false,
        }
    }
}

enum Sink {
    Idle,
    Pipe(EncoderProcess),
    Files(FrameFiles),
}

/// Movie writer driving an external encoder described by a [`CodecProfile`].
pub struct Encoder {
    profile: Box<dyn CodecProfile>,
    program: PathBuf,
    strategy: Strategy,
    settings: WriterSettings,
    default_format: FrameFormat,
    session: Session,
    sink: Sink,
}

impl Encoder {
    /// Combine `profile` with `strategy`.
    ///
    /// Fails with [`FlipbookError::EncoderUnavailable`] when the encoder is missing or fails its
    /// capability probe, so a session never starts against a broken encoder.
    pub fn new(
        profile: Box<dyn CodecProfile>,
        strategy: Strategy,
        settings: WriterSettings,
    ) -> FlipbookResult<Self> {
        settings.validate()?;
        let Some(program) = profile.resolve() else {
            return Err(FlipbookError::unavailable(format!(
                "{} executable was not found",
                profile.name()
            )));
        };
        if !profile.is_available() {
            return Err(FlipbookError::unavailable(format!(
                "'{}' failed the {} capability check",
                program.display(),
                profile.name()
            )));
        }
        let default_format = profile
            .file_formats()
            .first()
            .copied()
            .unwrap_or(FrameFormat::Png);
        Ok(Self {
            profile,
            program,
            strategy,
            settings,
            default_format,
            session: Session::new(),
            sink: Sink::Idle,
        })
    }

    /// Streaming ffmpeg writer from `cfg`.
    pub fn ffmpeg(cfg: &Config, settings: WriterSettings) -> FlipbookResult<Self> {
        Self::new(Box::new(FfmpegProfile::from_config(cfg)), Strategy::Pipe, settings)
            .map(|e| e.with_default_format(cfg.frame_format))
    }

    /// File-buffered ffmpeg writer from `cfg`.
    pub fn ffmpeg_file(cfg: &Config, settings: WriterSettings) -> FlipbookResult<Self> {
        Self::new(Box::new(FfmpegProfile::from_config(cfg)), Strategy::file(), settings)
            .map(|e| e.with_default_format(cfg.frame_format))
    }

    /// Streaming ImageMagick writer from `cfg`.
    pub fn imagemagick(cfg: &Config, settings: WriterSettings) -> FlipbookResult<Self> {
        Self::new(
            Box::new(ImageMagickProfile::from_config(cfg)),
            Strategy::Pipe,
            settings,
        )
        .map(|e| e.with_default_format(cfg.frame_format))
    }

    /// File-buffered ImageMagick writer from `cfg`.
    pub fn imagemagick_file(cfg: &Config, settings: WriterSettings) -> FlipbookResult<Self> {
        Self::new(
            Box::new(ImageMagickProfile::from_config(cfg)),
            Strategy::file(),
            settings,
        )
        .map(|e| e.with_default_format(cfg.frame_format))
    }

    /// Frame format used for file buffering when the settings request none.
    ///
    /// Ignored (with a debug log) when the encoder cannot read it back.
    pub fn with_default_format(mut self, format: FrameFormat) -> Self {
        if self.profile.file_formats().contains(&format) {
            self.default_format = format;
        } else {
            tracing::debug!(
                encoder = self.profile.name(),
                %format,
                fallback = %self.default_format,
                "configured frame format is not supported"
            );
        }
        self
    }

    /// Frame strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Session settings.
    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Frames buffered on disk so far (file strategy only).
    pub fn frame_files(&self) -> Option<&FrameFiles> {
        match &self.sink {
            Sink::Files(files) => Some(files),
            _ => None,
        }
    }

    fn frame_format(&self) -> FlipbookResult<FrameFormat> {
        let Some(format) = self.settings.frame_format else {
            return Ok(self.default_format);
        };
        if self.profile.file_formats().contains(&format) {
            Ok(format)
        } else {
            Err(FlipbookError::configuration(format!(
                "frame format '{format}' is not supported by {} (expected one of {})",
                self.profile.name(),
                self.profile
                    .file_formats()
                    .iter()
                    .map(|f| f.extension())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    fn command(&self, input: Vec<String>) -> Vec<String> {
        let mut args = input;
        args.extend(
            self.profile
                .output_args(&self.settings, self.session.outfile()),
        );
        args
    }

    fn finish_files(&mut self, files: FrameFiles) -> FlipbookResult<()> {
        let args = self.command(self.profile.file_input_args(&self.settings, &files));
        tracing::debug!(
            encoder = self.profile.name(),
            frames = files.count(),
            "encoding buffered frames"
        );
        let result = EncoderProcess::spawn(&self.program, &args).and_then(EncoderProcess::finish);
        // Cleanup is unconditional and happens after the exit status is known.
        files.cleanup();
        result.map(|_| ())
    }
}

impl MovieWriter for Encoder {
    fn name(&self) -> &'static str {
        self.profile.name()
    }

    #[tracing::instrument(
        skip_all,
        fields(encoder = self.profile.name(), outfile = %outfile.display())
    )]
    fn setup(
        &mut self,
        fig: &mut dyn Figure,
        outfile: &Path,
        dpi: Option<f64>,
    ) -> FlipbookResult<()> {
        let align = self.profile.size_alignment(&self.settings);
        self.session
            .setup(self.profile.name(), fig, outfile, dpi, align)?;
        match &self.strategy {
            Strategy::Pipe => {
                let size = self
                    .session
                    .frame_size()
                    .ok_or_else(|| FlipbookError::state("frame size unknown after setup"))?;
                let input =
                    self.profile
                        .pipe_input_args(&self.settings, size, self.profile.pipe_format());
                let args = self.command(input);
                self.sink = Sink::Pipe(EncoderProcess::spawn(&self.program, &args)?);
            }
            Strategy::File {
                frame_prefix,
                keep_frames,
            } => {
                let format = self.frame_format()?;
                let files = match frame_prefix {
                    Some(prefix) => FrameFiles::with_prefix(prefix, format, *keep_frames)?,
                    None => FrameFiles::temporary(format)?,
                };
                tracing::debug!(pattern = %files.printf_pattern(), "buffering frames");
                self.sink = Sink::Files(files);
            }
        }
        Ok(())
    }

    fn grab_frame(&mut self, fig: &mut dyn Figure, opts: &RenderOptions) -> FlipbookResult<()> {
        self.session.begin_frame(self.profile.name(), fig)?;
        let dpi = self.session.dpi();
        match &mut self.sink {
            Sink::Pipe(process) => {
                let format = self.profile.pipe_format();
                fig.render(process.stdin()?, format, dpi, opts)?;
            }
            Sink::Files(files) => files.write_frame(fig, dpi, opts)?,
            Sink::Idle => {
                return Err(FlipbookError::state(format!(
                    "{} writer has no open output",
                    self.profile.name()
                )));
            }
        }
        self.session.frame_grabbed();
        tracing::trace!(frame = self.session.frames(), "frame grabbed");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(encoder = self.profile.name()))]
    fn finish(&mut self) -> FlipbookResult<()> {
        self.session.close(self.profile.name())?;
        let frames = self.session.frames();
        let result = match std::mem::replace(&mut self.sink, Sink::Idle) {
            Sink::Pipe(process) => process.finish().map(|_| ()),
            Sink::Files(files) => self.finish_files(files),
            Sink::Idle => Ok(()),
        };
        if result.is_ok() {
            tracing::info!(
                frames,
                outfile = %self.session.outfile().display(),
                "movie written"
            );
        }
        result
    }

    fn fps(&self) -> f64 {
        self.settings.fps
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.session.frame_size()
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("profile", &self.profile.name())
            .field("program", &self.program)
            .field("strategy", &self.strategy)
            .field("state", &self.session.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
