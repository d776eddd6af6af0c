use std::path::Path;
use std::str::FromStr;

use anyhow::Context as _;

use crate::foundation::core::FrameFormat;
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Explicit defaults for writers and saving.
///
/// A `Config` is read once when a writer or save operation is constructed and threaded through
/// from there; nothing re-reads it while a session is in progress.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Writer used when the caller does not name one (see [`WriterKind`](crate::WriterKind)).
    pub writer: String,
    /// Video codec passed to ffmpeg-style encoders.
    pub codec: String,
    /// Bitrate in kbit/s; values `<= 0` let the encoder choose.
    pub bitrate: i64,
    /// Frame format used by file-buffered writers.
    pub frame_format: FrameFormat,
    /// ffmpeg executable name or path.
    pub ffmpeg_path: String,
    /// Extra arguments appended to ffmpeg output arguments.
    pub ffmpeg_args: Vec<String>,
    /// ImageMagick `convert` executable name or path.
    pub convert_path: String,
    /// Extra arguments appended to ImageMagick output arguments.
    pub convert_args: Vec<String>,
    /// Size limit for embedded animations, in MiB.
    pub embed_limit_mb: f64,
    /// Resolution used when saving; `None` uses the figure's own dpi.
    pub savefig_dpi: Option<f64>,
    /// Frame rate used by writers built without an explicit fps.
    pub default_fps: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            writer: "ffmpeg".to_owned(),
            codec: "h264".to_owned(),
            bitrate: -1,
            frame_format: FrameFormat::Png,
            ffmpeg_path: "ffmpeg".to_owned(),
            ffmpeg_args: Vec::new(),
            convert_path: "convert".to_owned(),
            convert_args: Vec::new(),
            embed_limit_mb: 20.0,
            savefig_dpi: None,
            default_fps: 5.0,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> FlipbookResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| FlipbookError::configuration(format!("invalid config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> FlipbookResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check numeric fields for values no writer can use.
    pub fn validate(&self) -> FlipbookResult<()> {
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(FlipbookError::configuration(
                "default_fps must be a positive number",
            ));
        }
        if !(self.embed_limit_mb.is_finite() && self.embed_limit_mb >= 0.0) {
            return Err(FlipbookError::configuration(
                "embed_limit_mb must be a non-negative number",
            ));
        }
        if let Some(dpi) = self.savefig_dpi
            && !(dpi.is_finite() && dpi > 0.0)
        {
            return Err(FlipbookError::configuration(
                "savefig_dpi must be a positive number",
            ));
        }
        Ok(())
    }

    /// Embed limit converted to bytes.
    pub fn embed_limit_bytes(&self) -> u64 {
        mb_to_bytes(self.embed_limit_mb)
    }
}

pub(crate) fn mb_to_bytes(mb: f64) -> u64 {
    (mb * 1024.0 * 1024.0) as u64
}

/// Default playback mode of the HTML player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Restart from the first frame after the last one.
    #[default]
    Loop,
    /// Stop at the last frame.
    Once,
    /// Play back and forth.
    Reflect,
}

impl PlaybackMode {
    /// All modes, in the order the player lists them.
    pub const ALL: [PlaybackMode; 3] = [Self::Once, Self::Loop, Self::Reflect];

    /// Lowercase name used by the HTML player.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Once => "once",
            Self::Reflect => "reflect",
        }
    }
}

impl FromStr for PlaybackMode {
    type Err = FlipbookError;

    fn from_str(s: &str) -> FlipbookResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "loop" => Ok(Self::Loop),
            "once" => Ok(Self::Once),
            "reflect" => Ok(Self::Reflect),
            other => Err(FlipbookError::configuration(format!(
                "invalid default playback mode '{other}' (expected one of loop, once, reflect)"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
