use std::path::{Path, PathBuf};

use crate::encode::frames::FrameFiles;
use crate::encode::process::{find_executable, probe_output};
use crate::encode::writer::WriterSettings;
use crate::foundation::config::Config;
use crate::foundation::core::FrameFormat;

/// Frame formats an ffmpeg-style encoder can read back from numbered files.
pub const FILE_FRAME_FORMATS: [FrameFormat; 7] = [
    FrameFormat::Png,
    FrameFormat::Jpeg,
    FrameFormat::Ppm,
    FrameFormat::Tiff,
    FrameFormat::Bmp,
    FrameFormat::Raw,
    FrameFormat::Rgba,
];

/// How a specific external encoder is invoked.
///
/// A profile only knows the encoder's command-line dialect. Whether frames are streamed through
/// a pipe or buffered to files is chosen by [`Strategy`](crate::Strategy), and the two are
/// combined by [`Encoder`](crate::Encoder).
pub trait CodecProfile {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Resolved executable, or `None` when it is not installed.
    fn resolve(&self) -> Option<PathBuf>;

    /// Whether the executable exists and passes the encoder's capability probe.
    fn is_available(&self) -> bool;

    /// Input arguments for raw frames streamed through stdin.
    fn pipe_input_args(
        &self,
        settings: &WriterSettings,
        frame_size: (u32, u32),
        format: FrameFormat,
    ) -> Vec<String>;

    /// Input arguments for numbered frame files.
    fn file_input_args(&self, settings: &WriterSettings, frames: &FrameFiles) -> Vec<String>;

    /// Output arguments, ending with the output file.
    fn output_args(&self, settings: &WriterSettings, outfile: &Path) -> Vec<String>;

    /// Pixel multiple both frame dimensions must have, if any.
    fn size_alignment(&self, _settings: &WriterSettings) -> Option<u32> {
        None
    }

    /// Formats accepted for numbered frame files.
    fn file_formats(&self) -> &[FrameFormat] {
        &FILE_FRAME_FORMATS
    }

    /// Format of frames streamed through stdin.
    fn pipe_format(&self) -> FrameFormat {
        FrameFormat::Rgba
    }
}

/// ffmpeg command-line dialect.
#[derive(Clone, Debug, PartialEq)]
pub struct FfmpegProfile {
    program: String,
    default_args: Vec<String>,
    quiet: bool,
}

impl FfmpegProfile {
    /// Profile for `program` with extra output arguments used when a session supplies none.
    pub fn new(program: impl Into<String>, default_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            default_args,
            quiet: !tracing::enabled!(tracing::Level::DEBUG),
        }
    }

    /// Profile from the configured executable and arguments.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.ffmpeg_path.clone(), cfg.ffmpeg_args.clone())
    }

    /// Keep ffmpeg's own log output (it is suppressed unless debug logging is enabled).
    pub fn verbose(mut self) -> Self {
        self.quiet = false;
        self
    }
}

impl CodecProfile for FfmpegProfile {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn resolve(&self) -> Option<PathBuf> {
        find_executable(&self.program)
    }

    fn is_available(&self) -> bool {
        let Some(path) = self.resolve() else {
            return false;
        };
        // The LibAv fork ships a binary under the same name but rejects our arguments.
        match probe_output(&path, &[]) {
            Some(out) => !String::from_utf8_lossy(&out.stderr).contains("LibAv"),
            None => false,
        }
    }

    fn pipe_input_args(
        &self,
        settings: &WriterSettings,
        frame_size: (u32, u32),
        format: FrameFormat,
    ) -> Vec<String> {
        let (w, h) = frame_size;
        let mut args = strings([
            "-f",
            "rawvideo",
            "-vcodec",
            "rawvideo",
            "-s",
            &format!("{w}x{h}"),
            "-pix_fmt",
            pix_fmt(format),
            "-r",
            &settings.fps.to_string(),
        ]);
        if self.quiet {
            args.extend(strings(["-loglevel", "error"]));
        }
        args.extend(strings(["-i", "pipe:"]));
        args
    }

    fn file_input_args(&self, settings: &WriterSettings, frames: &FrameFiles) -> Vec<String> {
        strings([
            "-r",
            &settings.fps.to_string(),
            "-i",
            &frames.printf_pattern(),
            "-vframes",
            &frames.count().to_string(),
        ])
    }

    fn output_args(&self, settings: &WriterSettings, outfile: &Path) -> Vec<String> {
        let extra = settings.extra_args.as_ref().unwrap_or(&self.default_args);
        let mut args = strings(["-vcodec", &settings.codec]);
        // Most players only decode 4:2:0 h264.
        if settings.codec == "h264" && !extra.iter().any(|a| a == "-pix_fmt") {
            args.extend(strings(["-pix_fmt", "yuv420p"]));
        }
        if settings.bitrate > 0 {
            args.extend(strings(["-b", &format!("{}k", settings.bitrate)]));
        }
        args.extend(extra.iter().cloned());
        for (k, v) in &settings.metadata {
            args.extend(strings(["-metadata", &format!("{k}={v}")]));
        }
        args.extend(strings(["-y", &outfile.to_string_lossy()]));
        args
    }

    fn size_alignment(&self, settings: &WriterSettings) -> Option<u32> {
        (settings.codec == "h264").then_some(2)
    }
}

/// ImageMagick command-line dialect (`convert`, or `magick` on version 7).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageMagickProfile {
    program: String,
    default_args: Vec<String>,
}

impl ImageMagickProfile {
    /// Profile for `program` with extra output arguments used when a session supplies none.
    pub fn new(program: impl Into<String>, default_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            default_args,
        }
    }

    /// Profile from the configured executable and arguments.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.convert_path.clone(), cfg.convert_args.clone())
    }

    fn delay(settings: &WriterSettings) -> String {
        // ImageMagick delays are in ticks of 1/100 s.
        (100.0 / settings.fps).to_string()
    }
}

impl CodecProfile for ImageMagickProfile {
    fn name(&self) -> &'static str {
        "imagemagick"
    }

    fn resolve(&self) -> Option<PathBuf> {
        find_executable(&self.program).or_else(|| {
            (self.program == "convert")
                .then(|| find_executable("magick"))
                .flatten()
        })
    }

    fn is_available(&self) -> bool {
        let Some(path) = self.resolve() else {
            return false;
        };
        // Windows ships an unrelated `convert.exe`; require the ImageMagick banner.
        match probe_output(&path, &["--version"]) {
            Some(out) => String::from_utf8_lossy(&out.stdout).contains("ImageMagick"),
            None => false,
        }
    }

    fn pipe_input_args(
        &self,
        settings: &WriterSettings,
        frame_size: (u32, u32),
        format: FrameFormat,
    ) -> Vec<String> {
        let (w, h) = frame_size;
        strings([
            "-size",
            &format!("{w}x{h}"),
            "-depth",
            "8",
            "-delay",
            &Self::delay(settings),
            "-loop",
            "0",
            &format!("{}:-", format.extension()),
        ])
    }

    fn file_input_args(&self, settings: &WriterSettings, frames: &FrameFiles) -> Vec<String> {
        strings([
            "-delay",
            &Self::delay(settings),
            "-loop",
            "0",
            &frames.glob_pattern(),
        ])
    }

    fn output_args(&self, settings: &WriterSettings, outfile: &Path) -> Vec<String> {
        let extra = settings.extra_args.as_ref().unwrap_or(&self.default_args);
        let mut args = extra.clone();
        args.push(outfile.to_string_lossy().into_owned());
        args
    }
}

fn pix_fmt(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::Rgba | FrameFormat::Raw => "rgba",
        _ => "rgb24",
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/encode/profile.rs"]
mod tests;
