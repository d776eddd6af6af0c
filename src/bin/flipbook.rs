use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flipbook::{
    Animation, AnimationOptions, ArtistFrames, ArtistId, ArtistShape, CanvasEvent, Config,
    FrameSource, HtmlOptions, HtmlWriter, ManualTimer, Point, RasterFigure, Rect, SaveOptions,
    ViewSignature, WriterKind, WriterRegistry, WriterSettings,
};

#[derive(Parser, Debug)]
#[command(name = "flipbook", version, about = "Render figure animations to movies")]
struct Cli {
    /// JSON configuration file (writer defaults, encoder paths, embed limit).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every movie writer and whether it is available.
    Writers,
    /// Render a demo animation (a dot tracing a sine wave) to a movie.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Output file; the extension should match the writer.
    #[arg(long)]
    out: PathBuf,

    /// Writer to use (ffmpeg, ffmpeg_file, imagemagick, imagemagick_file, gif, html).
    #[arg(long)]
    writer: Option<WriterKind>,

    /// Output frame rate; defaults to the animation rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Number of frames.
    #[arg(long, default_value_t = 30)]
    frames: usize,

    /// Output resolution.
    #[arg(long)]
    dpi: Option<f64>,

    /// Video codec for ffmpeg-style writers.
    #[arg(long)]
    codec: Option<String>,

    /// Bitrate in kbit/s.
    #[arg(long)]
    bitrate: Option<i64>,

    /// Frame interval of the animation, in milliseconds.
    #[arg(long, default_value_t = 40)]
    interval: u64,

    /// Delay before the animation repeats, in milliseconds.
    #[arg(long, default_value_t = 0)]
    repeat_delay: u64,

    /// Inline frames into the page (html writer only).
    #[arg(long, default_value_t = false)]
    embed: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let registry = WriterRegistry::new(config);
    match cli.cmd {
        Command::Writers => cmd_writers(&registry),
        Command::Render(args) => cmd_render(&registry, args),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init();
}

fn cmd_writers(registry: &WriterRegistry) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for kind in WriterKind::ALL {
        let status = if registry.is_available(kind) {
            "available"
        } else {
            "missing"
        };
        writeln!(out, "{:<18}{status}", kind.name()).context("write writer list")?;
    }
    Ok(())
}

/// One hidden marker per frame; each frame shows its own.
fn sine_figure(frames: usize) -> (RasterFigure, Vec<Vec<ArtistId>>) {
    let mut fig = RasterFigure::new(4.0, 3.0, 80.0);
    let ax = fig.add_axes(
        Rect::new(0.1, 0.1, 0.9, 0.9),
        ViewSignature::new([0.0, 1.0], [-1.2, 1.2]),
    );
    let steps = frames.max(1) as f64;
    let payloads = (0..frames)
        .map(|i| {
            let x = i as f64 / steps;
            let y = (x * std::f64::consts::TAU).sin();
            let dot = fig.add_artist(
                ax,
                ArtistShape::Marker {
                    center: Point::new(x, y),
                    radius: 6.0,
                },
                [31, 119, 180, 255],
            );
            vec![dot]
        })
        .collect();
    (fig, payloads)
}

fn cmd_render(registry: &WriterRegistry, args: RenderArgs) -> anyhow::Result<()> {
    let (mut fig, payloads) = sine_figure(args.frames);
    let opts = AnimationOptions {
        interval_ms: args.interval,
        repeat_delay_ms: args.repeat_delay,
        ..AnimationOptions::default()
    };
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::from_items(payloads),
        ArtistFrames,
        Box::new(ManualTimer::new(args.interval)),
        opts,
    );
    // The host's first draw would start the timer; saving never needs it.
    anim.handle_event(&mut fig, CanvasEvent::Close)?;

    if args.embed && args.writer == Some(WriterKind::Html) {
        let cfg = registry.config();
        let fps = args.fps.unwrap_or_else(|| anim.fps());
        let mut writer = HtmlWriter::new(
            &WriterSettings::from_config(cfg, Some(fps)),
            HtmlOptions::from_config(cfg).embedded(),
        )?;
        anim.save_with(&mut fig, &args.out, &mut writer, args.dpi.or(cfg.savefig_dpi))?;
        if writer.dropped_frames() > 0 {
            eprintln!(
                "embed limit reached: dropped {} frame(s)",
                writer.dropped_frames()
            );
        }
    } else {
        let mut report = |frame: usize, total: Option<usize>| match total {
            Some(total) => eprint!("\rframe {}/{total}", frame + 1),
            None => eprint!("\rframe {}", frame + 1),
        };
        let save = SaveOptions {
            writer: args.writer,
            fps: args.fps,
            dpi: args.dpi,
            codec: args.codec,
            bitrate: args.bitrate,
            progress: Some(&mut report),
            ..SaveOptions::default()
        };
        let result = anim.save(&mut fig, &args.out, registry, save);
        eprintln!();
        result?;
    }

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
