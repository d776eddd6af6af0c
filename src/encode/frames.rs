use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::figure::Figure;
use crate::foundation::core::{FrameFormat, RenderOptions};
use crate::foundation::error::FlipbookResult;

/// Numbered frame files `{prefix}{index:07}.{ext}` written by file-buffered writers.
///
/// Without a caller-supplied prefix the files live in a private temporary directory that is
/// removed on [`FrameFiles::cleanup`] (or drop). With a prefix, the files are removed on cleanup
/// unless `keep` was requested.
#[derive(Debug)]
pub struct FrameFiles {
    prefix: PathBuf,
    format: FrameFormat,
    tempdir: Option<tempfile::TempDir>,
    keep: bool,
    paths: Vec<PathBuf>,
}

impl FrameFiles {
    /// Frames in a fresh temporary directory, named `<tmpdir>/tmp{index:07}.{ext}`.
    pub fn temporary(format: FrameFormat) -> FlipbookResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("flipbook-frames-")
            .tempdir()
            .context("create temporary frame directory")?;
        Ok(Self {
            prefix: dir.path().join("tmp"),
            format,
            tempdir: Some(dir),
            keep: false,
            paths: Vec::new(),
        })
    }

    /// Frames under a caller-supplied prefix. Parent directories are created as needed.
    pub fn with_prefix(
        prefix: impl Into<PathBuf>,
        format: FrameFormat,
        keep: bool,
    ) -> FlipbookResult<Self> {
        let prefix = prefix.into();
        if let Some(parent) = prefix.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create frame directory '{}'", parent.display()))?;
        }
        Ok(Self {
            prefix,
            format,
            tempdir: None,
            keep,
            paths: Vec::new(),
        })
    }

    /// Path of the frame with `index`.
    pub fn path_for(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.prefix.as_os_str());
        name.push(format!("{index:07}.{}", self.format.extension()));
        PathBuf::from(name)
    }

    /// Render `fig` into the next numbered file.
    pub fn write_frame(
        &mut self,
        fig: &mut dyn Figure,
        dpi: f64,
        opts: &RenderOptions,
    ) -> FlipbookResult<()> {
        let path = self.path_for(self.paths.len());
        let file = File::create(&path)
            .with_context(|| format!("create frame file '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        fig.render(&mut out, self.format, dpi, opts)?;
        out.flush()
            .with_context(|| format!("write frame file '{}'", path.display()))?;
        tracing::trace!(path = %path.display(), "frame written");
        self.paths.push(path);
        Ok(())
    }

    /// printf-style pattern matching every frame, e.g. `/tmp/x/tmp%07d.png`.
    pub fn printf_pattern(&self) -> String {
        format!(
            "{}%07d.{}",
            self.prefix.to_string_lossy(),
            self.format.extension()
        )
    }

    /// Shell glob matching every frame, e.g. `/tmp/x/tmp*.png`.
    pub fn glob_pattern(&self) -> String {
        format!("{}*.{}", self.prefix.to_string_lossy(), self.format.extension())
    }

    /// Common prefix of the frame files.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Format of the frame files.
    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Frames written so far.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Paths written so far, in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// `true` when the files live in a private temporary directory.
    pub fn is_temporary(&self) -> bool {
        self.tempdir.is_some()
    }

    /// Remove what this session created, unless the frames were asked to persist.
    ///
    /// Failures are logged, never returned: cleanup runs on error paths too.
    pub fn cleanup(self) {
        if let Some(dir) = self.tempdir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(
                    dir = %path.display(),
                    error = %e,
                    "failed to remove temporary frames"
                );
            }
            return;
        }
        if self.keep {
            tracing::debug!(
                count = self.paths.len(),
                prefix = %self.prefix.display(),
                "keeping frame files"
            );
            return;
        }
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove frame file");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/frames.rs"]
mod tests;
