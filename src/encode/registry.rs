use std::str::FromStr;

use crate::encode::encoder::Encoder;
use crate::encode::gif::GifWriter;
use crate::encode::html::{HtmlOptions, HtmlWriter};
use crate::encode::profile::{CodecProfile, FfmpegProfile, ImageMagickProfile};
use crate::encode::writer::{MovieWriter, WriterSettings};
use crate::foundation::config::Config;
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Every writer flipbook can construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriterKind {
    /// ffmpeg fed through a pipe.
    Ffmpeg,
    /// ffmpeg over buffered frame files.
    FfmpegFile,
    /// ImageMagick fed through a pipe.
    ImageMagick,
    /// ImageMagick over buffered frame files.
    ImageMagickFile,
    /// In-process animated GIF.
    Gif,
    /// HTML page with a JavaScript player.
    Html,
}

impl WriterKind {
    /// Registration order; the fallback search walks this list.
    pub const ALL: [WriterKind; 6] = [
        Self::Ffmpeg,
        Self::FfmpegFile,
        Self::ImageMagick,
        Self::ImageMagickFile,
        Self::Gif,
        Self::Html,
    ];

    /// Registered name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::FfmpegFile => "ffmpeg_file",
            Self::ImageMagick => "imagemagick",
            Self::ImageMagickFile => "imagemagick_file",
            Self::Gif => "gif",
            Self::Html => "html",
        }
    }
}

impl std::fmt::Display for WriterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WriterKind {
    type Err = FlipbookError;

    fn from_str(s: &str) -> FlipbookResult<Self> {
        let name = s.trim().to_ascii_lowercase();
        if name == "pillow" {
            return Ok(Self::Gif);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| {
                FlipbookError::configuration(format!(
                    "unknown writer '{s}' (expected one of {})",
                    Self::ALL.map(Self::name).join(", ")
                ))
            })
    }
}

/// Constructors and availability probes for every [`WriterKind`], bound to one [`Config`].
#[derive(Clone, Debug, Default)]
pub struct WriterRegistry {
    config: Config,
}

impl WriterRegistry {
    /// Registry reading executable paths and defaults from `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Configuration the writers are built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether `kind` can be constructed right now. Process writers probe their executable.
    pub fn is_available(&self, kind: WriterKind) -> bool {
        match kind {
            WriterKind::Ffmpeg | WriterKind::FfmpegFile => {
                FfmpegProfile::from_config(&self.config).is_available()
            }
            WriterKind::ImageMagick | WriterKind::ImageMagickFile => {
                ImageMagickProfile::from_config(&self.config).is_available()
            }
            WriterKind::Gif | WriterKind::Html => true,
        }
    }

    /// Available writers, in registration order.
    pub fn available(&self) -> Vec<WriterKind> {
        WriterKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    /// Pick the writer for a save.
    ///
    /// A writer named by the caller must be available. Without one, the configured default is
    /// used when available, otherwise the first available writer (with a warning).
    pub fn resolve(&self, requested: Option<WriterKind>) -> FlipbookResult<WriterKind> {
        if let Some(kind) = requested {
            return if self.is_available(kind) {
                Ok(kind)
            } else {
                Err(FlipbookError::unavailable(format!(
                    "writer '{kind}' is not available"
                )))
            };
        }
        let preferred = self.config.writer.parse::<WriterKind>();
        if let Ok(kind) = &preferred
            && self.is_available(*kind)
        {
            return Ok(*kind);
        }
        let Some(fallback) = WriterKind::ALL
            .into_iter()
            .find(|kind| self.is_available(*kind))
        else {
            return Err(FlipbookError::unavailable("no movie writer is available"));
        };
        tracing::warn!(
            configured = %self.config.writer,
            using = %fallback,
            "configured writer is not available; falling back"
        );
        Ok(fallback)
    }

    /// Construct `kind` with `settings`.
    pub fn create(
        &self,
        kind: WriterKind,
        settings: WriterSettings,
    ) -> FlipbookResult<Box<dyn MovieWriter>> {
        let cfg = &self.config;
        Ok(match kind {
            WriterKind::Ffmpeg => Box::new(Encoder::ffmpeg(cfg, settings)?),
            WriterKind::FfmpegFile => Box::new(Encoder::ffmpeg_file(cfg, settings)?),
            WriterKind::ImageMagick => Box::new(Encoder::imagemagick(cfg, settings)?),
            WriterKind::ImageMagickFile => Box::new(Encoder::imagemagick_file(cfg, settings)?),
            WriterKind::Gif => Box::new(GifWriter::new(&settings)?),
            WriterKind::Html => Box::new(HtmlWriter::new(
                &settings,
                HtmlOptions::from_config(cfg),
            )?),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/registry.rs"]
mod tests;
