use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use base64::Engine as _;

use crate::encode::frames::FrameFiles;
use crate::encode::writer::{MovieWriter, Session, SessionState, WriterSettings};
use crate::figure::Figure;
use crate::foundation::config::{Config, PlaybackMode};
use crate::foundation::core::{FrameFormat, RenderOptions};
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Frame formats a browser can display from the HTML player.
pub const HTML_FRAME_FORMATS: [FrameFormat; 4] = [
    FrameFormat::Png,
    FrameFormat::Jpeg,
    FrameFormat::Tiff,
    FrameFormat::Svg,
];

/// Options of an [`HtmlWriter`].
#[derive(Clone, Debug, PartialEq)]
pub struct HtmlOptions {
    /// Inline frames as base64 data URIs instead of referencing files next to the page.
    pub embed_frames: bool,
    /// Playback mode selected when the page loads.
    pub default_mode: PlaybackMode,
    /// Total size of embedded frame data; frames past it are dropped.
    pub embed_limit_bytes: u64,
    /// Directory for referenced frames; defaults to `<stem>_frames` next to the page.
    pub frame_dir: Option<PathBuf>,
    /// Frame format used when the writer settings request none.
    pub frame_format: FrameFormat,
}

impl HtmlOptions {
    /// Reference-mode options with the configured embed limit and frame format.
    ///
    /// A configured format the player cannot display falls back to png.
    pub fn from_config(cfg: &Config) -> Self {
        let frame_format = if HTML_FRAME_FORMATS.contains(&cfg.frame_format) {
            cfg.frame_format
        } else {
            tracing::debug!(
                format = %cfg.frame_format,
                fallback = %FrameFormat::Png,
                "configured frame format is not supported by the html writer"
            );
            FrameFormat::Png
        };
        Self {
            embed_frames: false,
            default_mode: PlaybackMode::default(),
            embed_limit_bytes: cfg.embed_limit_bytes(),
            frame_dir: None,
            frame_format,
        }
    }

    /// Inline frames into the page.
    pub fn embedded(mut self) -> Self {
        self.embed_frames = true;
        self
    }

    /// Select the initial playback mode.
    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.default_mode = mode;
        self
    }
}

enum Frames {
    Idle,
    Embedded(Vec<String>),
    Referenced(FrameFiles),
}

/// Writer producing a self-contained HTML page with a JavaScript frame player.
pub struct HtmlWriter {
    fps: f64,
    opts: HtmlOptions,
    requested_format: Option<FrameFormat>,
    session: Session,
    frames: Frames,
    total_bytes: u64,
    hit_limit: bool,
    dropped: usize,
    size_warnings: usize,
}

impl HtmlWriter {
    /// Writer at `settings.fps`. `settings.frame_format` must be one of [`HTML_FRAME_FORMATS`].
    pub fn new(settings: &WriterSettings, opts: HtmlOptions) -> FlipbookResult<Self> {
        settings.validate()?;
        Ok(Self {
            fps: settings.fps,
            opts,
            requested_format: settings.frame_format,
            session: Session::new(),
            frames: Frames::Idle,
            total_bytes: 0,
            hit_limit: false,
            dropped: 0,
            size_warnings: 0,
        })
    }

    /// Frames dropped because the embed limit was reached.
    pub fn dropped_frames(&self) -> usize {
        self.dropped
    }

    /// Size-limit warnings emitted (at most one per session).
    pub fn size_warnings(&self) -> usize {
        self.size_warnings
    }

    /// Base64 bytes embedded so far.
    pub fn embedded_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Frames kept so far (embedded or written next to the page).
    pub fn frame_count(&self) -> usize {
        match &self.frames {
            Frames::Idle => 0,
            Frames::Embedded(frames) => frames.len(),
            Frames::Referenced(files) => files.count(),
        }
    }

    fn frame_format(&self) -> FlipbookResult<FrameFormat> {
        let format = self.requested_format.unwrap_or(self.opts.frame_format);
        if HTML_FRAME_FORMATS.contains(&format) {
            Ok(format)
        } else {
            Err(FlipbookError::configuration(format!(
                "frame format '{format}' is not supported by the html writer \
                 (expected one of png, jpeg, tiff, svg)"
            )))
        }
    }

    fn embed(&mut self, encoded: String) {
        self.total_bytes += encoded.len() as u64;
        if self.total_bytes >= self.opts.embed_limit_bytes {
            tracing::warn!(
                total_bytes = self.total_bytes,
                limit_bytes = self.opts.embed_limit_bytes,
                "animation size reached the embed limit; this and further frames are dropped \
                 (raise embed_limit_mb to embed more)"
            );
            self.hit_limit = true;
            self.size_warnings += 1;
            self.dropped += 1;
            return;
        }
        if let Frames::Embedded(frames) = &mut self.frames {
            frames.push(encoded);
        }
    }

    fn fill_frames(&self, format: FrameFormat) -> String {
        match &self.frames {
            Frames::Idle => String::new(),
            Frames::Embedded(frames) => {
                let mut out = String::new();
                for (i, data) in frames.iter().enumerate() {
                    out.push_str(&format!(
                        "  frames[{i}] = \"data:image/{};base64,{data}\";\n",
                        mime_subtype(format)
                    ));
                }
                out
            }
            Frames::Referenced(files) => {
                let page_dir = self.session.outfile().parent().unwrap_or(Path::new(""));
                let prefix = files.prefix();
                let prefix = prefix.strip_prefix(page_dir).unwrap_or(prefix);
                format!(
                    "  for (var i = 0; i < frames.length; i++) {{\n    \
                     frames[i] = \"{}\" + (\"0000000\" + i).slice(-7) + \".{}\";\n  }}\n",
                    js_escape(&prefix.to_string_lossy().replace('\\', "/")),
                    format.extension()
                )
            }
        }
    }
}

impl MovieWriter for HtmlWriter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn setup(
        &mut self,
        fig: &mut dyn Figure,
        outfile: &Path,
        dpi: Option<f64>,
    ) -> FlipbookResult<()> {
        let ext = outfile
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some("html" | "htm")) {
            return Err(FlipbookError::configuration(format!(
                "html writer output '{}' must end in .html or .htm",
                outfile.display()
            )));
        }
        let format = self.frame_format()?;
        self.session.setup("html", fig, outfile, dpi, None)?;

        self.frames = if self.opts.embed_frames {
            Frames::Embedded(Vec::new())
        } else {
            let dir = match &self.opts.frame_dir {
                Some(dir) => dir.clone(),
                None => {
                    let stem = outfile
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    outfile.with_file_name(format!("{stem}_frames"))
                }
            };
            Frames::Referenced(FrameFiles::with_prefix(dir.join("frame"), format, true)?)
        };
        self.total_bytes = 0;
        self.hit_limit = false;
        Ok(())
    }

    fn grab_frame(&mut self, fig: &mut dyn Figure, opts: &RenderOptions) -> FlipbookResult<()> {
        self.session.begin_frame("html", fig)?;
        let format = self.frame_format()?;
        let dpi = self.session.dpi();
        match self.frames {
            Frames::Embedded(_) if self.hit_limit => self.dropped += 1,
            Frames::Embedded(_) => {
                let mut bytes = Vec::new();
                fig.render(&mut bytes, format, dpi, opts)?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                self.embed(encoded);
            }
            Frames::Referenced(ref mut files) => files.write_frame(fig, dpi, opts)?,
            Frames::Idle => {
                return Err(FlipbookError::state("html writer has no open output"));
            }
        }
        self.session.frame_grabbed();
        Ok(())
    }

    fn finish(&mut self) -> FlipbookResult<()> {
        self.session.close("html")?;
        let format = self.frame_format()?;
        let nframes = self.frame_count();
        let page = render_page(&PageParams {
            id: &unique_id(self.session.outfile()),
            nframes,
            fill_frames: &self.fill_frames(format),
            interval_ms: (1000.0 / self.fps).floor() as u64,
            mode: self.opts.default_mode,
        });
        let path = self.session.outfile();
        std::fs::write(path, page).with_context(|| format!("write '{}'", path.display()))?;
        if self.dropped > 0 {
            tracing::info!(kept = nframes, dropped = self.dropped, "html animation truncated");
        }
        tracing::info!(frames = nframes, outfile = %path.display(), "html animation written");
        // Referenced frames persist next to the page.
        self.frames = Frames::Idle;
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

impl std::fmt::Debug for HtmlWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlWriter")
            .field("fps", &self.fps)
            .field("opts", &self.opts)
            .field("state", &self.session.state())
            .field("frames", &self.frame_count())
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

fn mime_subtype(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::Svg => "svg+xml",
        other => other.extension(),
    }
}

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Hex id unique per page, so several players can share one document.
pub(crate) fn unique_id(outfile: &Path) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let mut seed = Vec::new();
    seed.extend_from_slice(outfile.to_string_lossy().as_bytes());
    seed.extend_from_slice(&nanos.to_le_bytes());
    seed.extend_from_slice(&std::process::id().to_le_bytes());
    seed.extend_from_slice(&COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    format!("{:032x}", xxhash_rust::xxh3::xxh3_128(&seed))
}

pub(crate) struct PageParams<'a> {
    pub(crate) id: &'a str,
    pub(crate) nframes: usize,
    pub(crate) fill_frames: &'a str,
    pub(crate) interval_ms: u64,
    pub(crate) mode: PlaybackMode,
}

pub(crate) fn render_page(p: &PageParams<'_>) -> String {
    let checked = |m: PlaybackMode| if m == p.mode { "checked" } else { "" };
    PAGE_TEMPLATE
        .replace("__ID__", p.id)
        .replace("__NFRAMES__", &p.nframes.to_string())
        .replace("__LAST__", &p.nframes.saturating_sub(1).to_string())
        .replace("__INTERVAL__", &p.interval_ms.to_string())
        .replace("__ONCE__", checked(PlaybackMode::Once))
        .replace("__LOOP__", checked(PlaybackMode::Loop))
        .replace("__REFLECT__", checked(PlaybackMode::Reflect))
        .replace("__FRAMES__", p.fill_frames)
}

const PAGE_TEMPLATE: &str = r#"<style>
.flipbook-player { display: inline-block; font-family: sans-serif; }
.flipbook-player img { display: block; }
.flipbook-player input[type=range] { width: 100%; }
.flipbook-controls button { min-width: 2.4em; margin: 0 1px; }
.flipbook-modes { font-size: 0.9em; }
</style>
<div class="flipbook-player" id="flipbook___ID__">
  <img id="flipbook_img___ID__" alt="animation frame">
  <input type="range" id="flipbook_slider___ID__" min="0" max="__LAST__" step="1" value="0">
  <div class="flipbook-controls">
    <button data-action="first" title="First frame">|&lt;</button>
    <button data-action="prev" title="Previous frame">&lt;</button>
    <button data-action="reverse" title="Play backwards">&#9664;</button>
    <button data-action="pause" title="Pause">||</button>
    <button data-action="play" title="Play">&#9654;</button>
    <button data-action="next" title="Next frame">&gt;</button>
    <button data-action="last" title="Last frame">&gt;|</button>
    <button data-action="slower" title="Slower">&minus;</button>
    <button data-action="faster" title="Faster">+</button>
  </div>
  <form class="flipbook-modes" id="flipbook_modes___ID__">
    <label><input type="radio" name="mode" value="once" __ONCE__> Once</label>
    <label><input type="radio" name="mode" value="loop" __LOOP__> Loop</label>
    <label><input type="radio" name="mode" value="reflect" __REFLECT__> Reflect</label>
  </form>
</div>
<script>
(function() {
  var frames = new Array(__NFRAMES__);
__FRAMES__
  var root = document.getElementById("flipbook___ID__");
  var img = document.getElementById("flipbook_img___ID__");
  var slider = document.getElementById("flipbook_slider___ID__");
  var modes = document.getElementById("flipbook_modes___ID__");
  var index = 0, direction = 0, interval = __INTERVAL__, timer = null;

  function mode() {
    var checked = modes.querySelector("input:checked");
    return checked ? checked.value : "loop";
  }
  function show(i) {
    if (frames.length === 0) { return; }
    index = Math.max(0, Math.min(frames.length - 1, i));
    img.src = frames[index];
    slider.value = index;
  }
  function pause() {
    if (timer !== null) { clearInterval(timer); timer = null; }
    direction = 0;
  }
  function advance() {
    var next = index + direction;
    if (next >= 0 && next < frames.length) { show(next); return; }
    var m = mode();
    if (m === "loop") {
      show(direction > 0 ? 0 : frames.length - 1);
    } else if (m === "reflect") {
      direction = -direction;
      show(index + direction);
    } else {
      pause();
    }
  }
  function play(dir) {
    pause();
    direction = dir;
    timer = setInterval(advance, interval);
  }
  var actions = {
    first: function() { pause(); show(0); },
    prev: function() { pause(); show(index - 1); },
    reverse: function() { play(-1); },
    pause: pause,
    play: function() { play(1); },
    next: function() { pause(); show(index + 1); },
    last: function() { pause(); show(frames.length - 1); },
    slower: function() { interval *= 1.25; if (timer !== null) { play(direction); } },
    faster: function() { interval /= 1.25; if (timer !== null) { play(direction); } }
  };
  var buttons = root.querySelectorAll("button");
  for (var b = 0; b < buttons.length; b++) {
    buttons[b].onclick = actions[buttons[b].getAttribute("data-action")];
  }
  slider.oninput = function() { pause(); show(parseInt(slider.value, 10)); };
  show(0);
})();
</script>
"#;

#[cfg(test)]
#[path = "../../tests/unit/encode/html.rs"]
mod tests;
