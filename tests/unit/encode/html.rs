use super::*;
use base64::Engine as _;
use crate::figure::raster::RasterFigure;

fn settings() -> WriterSettings {
    WriterSettings::from_config(&Config::default(), Some(8.0))
}

fn grab(writer: &mut HtmlWriter, fig: &mut RasterFigure, n: usize) {
    for _ in 0..n {
        writer.grab_frame(fig, &RenderOptions::default()).unwrap();
    }
}

fn png_base64_len(fig: &mut RasterFigure) -> u64 {
    let mut bytes = Vec::new();
    fig.render(&mut bytes, FrameFormat::Png, fig.dpi(), &RenderOptions::default())
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(&bytes).len() as u64
}

#[test]
fn embedded_page_inlines_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("anim.html");
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let opts = HtmlOptions::from_config(&Config::default())
        .embedded()
        .with_mode(PlaybackMode::Reflect);
    let mut writer = HtmlWriter::new(&settings(), opts).unwrap();

    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 3);
    writer.finish().unwrap();

    let page = std::fs::read_to_string(&out).unwrap();
    assert_eq!(page.matches("data:image/png;base64,").count(), 3);
    assert!(page.contains("frames[2] = \"data:image/png;base64,"));
    assert!(page.contains("new Array(3)"));
    assert!(page.contains("interval = 125"));
    assert!(page.contains(r#"value="reflect" checked"#));
    assert!(!page.contains(r#"value="loop" checked"#));
    assert!(!page.contains("__ID__"));
    assert!(!dir.path().join("anim_frames").exists());
}

#[test]
fn embed_limit_drops_the_overflowing_frame_and_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let per_frame = png_base64_len(&mut fig);
    let opts = HtmlOptions {
        embed_limit_bytes: 2 * per_frame + 1,
        ..HtmlOptions::from_config(&Config::default()).embedded()
    };
    let mut writer = HtmlWriter::new(&settings(), opts).unwrap();

    writer
        .setup(&mut fig, &dir.path().join("big.htm"), None)
        .unwrap();
    grab(&mut writer, &mut fig, 4);
    assert_eq!(writer.frame_count(), 2);
    assert_eq!(writer.dropped_frames(), 2);
    assert_eq!(writer.size_warnings(), 1);
    assert_eq!(writer.embedded_bytes(), 3 * per_frame);
    writer.finish().unwrap();

    let page = std::fs::read_to_string(dir.path().join("big.htm")).unwrap();
    assert_eq!(page.matches("data:image/png;base64,").count(), 2);
}

#[test]
fn referenced_frames_are_written_next_to_the_page_and_kept() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("walk.html");
    let mut fig = RasterFigure::new(1.0, 0.5, 10.0);
    let s = settings().with_frame_format(FrameFormat::Jpeg);
    let mut writer = HtmlWriter::new(&s, HtmlOptions::from_config(&Config::default())).unwrap();

    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 2);
    writer.finish().unwrap();

    let frames = dir.path().join("walk_frames");
    assert!(frames.join("frame0000000.jpeg").is_file());
    assert!(frames.join("frame0000001.jpeg").is_file());
    let page = std::fs::read_to_string(&out).unwrap();
    assert!(page.contains(
        r#"frames[i] = "walk_frames/frame" + ("0000000" + i).slice(-7) + ".jpeg";"#
    ));
    assert!(page.contains(r#"value="loop" checked"#));
}

#[test]
fn svg_frames_use_the_svg_mime_type() {
    let dir = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let s = settings().with_frame_format(FrameFormat::Svg);
    let opts = HtmlOptions::from_config(&Config::default()).embedded();
    let mut writer = HtmlWriter::new(&s, opts).unwrap();
    let out = dir.path().join("vec.html");
    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 1);
    writer.finish().unwrap();
    let page = std::fs::read_to_string(&out).unwrap();
    assert!(page.contains("data:image/svg+xml;base64,"));
}

#[test]
fn rejects_non_html_outputs_and_unsupported_formats() {
    let dir = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let opts = HtmlOptions::from_config(&Config::default());

    let mut writer = HtmlWriter::new(&settings(), opts.clone()).unwrap();
    let err = writer
        .setup(&mut fig, &dir.path().join("anim.mp4"), None)
        .unwrap_err();
    assert!(matches!(err, FlipbookError::Configuration(_)));
    assert_eq!(writer.state(), SessionState::Created);

    let s = settings().with_frame_format(FrameFormat::Rgba);
    let mut writer = HtmlWriter::new(&s, opts).unwrap();
    let err = writer
        .setup(&mut fig, &dir.path().join("anim.html"), None)
        .unwrap_err();
    assert!(matches!(err, FlipbookError::Configuration(_)));
}

#[test]
fn unique_ids_differ_between_pages() {
    let a = unique_id(Path::new("a.html"));
    let b = unique_id(Path::new("a.html"));
    assert_eq!(a.len(), 32);
    assert_ne!(a, b);
}

#[test]
fn page_marks_exactly_one_mode_checked() {
    for mode in PlaybackMode::ALL {
        let page = render_page(&PageParams {
            id: "abc",
            nframes: 0,
            fill_frames: "",
            interval_ms: 200,
            mode,
        });
        assert_eq!(page.matches(" checked>").count(), 1);
        assert!(page.contains(&format!(r#"value="{}" checked"#, mode.as_str())));
        assert!(page.contains(r#"max="0""#));
    }
}

#[test]
fn configured_frame_format_reaches_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let cfg = Config {
        frame_format: FrameFormat::Jpeg,
        ..Config::default()
    };

    let out = dir.path().join("ref.html");
    let mut writer = HtmlWriter::new(&settings(), HtmlOptions::from_config(&cfg)).unwrap();
    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 1);
    writer.finish().unwrap();
    assert!(dir.path().join("ref_frames").join("frame0000000.jpeg").is_file());
    assert!(!dir.path().join("ref_frames").join("frame0000000.png").exists());

    let out = dir.path().join("inline.html");
    let opts = HtmlOptions::from_config(&cfg).embedded();
    let mut writer = HtmlWriter::new(&settings(), opts).unwrap();
    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 1);
    writer.finish().unwrap();
    let page = std::fs::read_to_string(&out).unwrap();
    assert!(page.contains("data:image/jpeg;base64,"));
}

#[test]
fn unsupported_configured_format_falls_back_to_png() {
    let cfg = Config {
        frame_format: FrameFormat::Ppm,
        ..Config::default()
    };
    assert_eq!(HtmlOptions::from_config(&cfg).frame_format, FrameFormat::Png);

    let dir = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 10.0);
    let out = dir.path().join("fallback.html");
    let mut writer = HtmlWriter::new(&settings(), HtmlOptions::from_config(&cfg)).unwrap();
    writer.setup(&mut fig, &out, None).unwrap();
    grab(&mut writer, &mut fig, 1);
    writer.finish().unwrap();
    assert!(dir.path().join("fallback_frames").join("frame0000000.png").is_file());
}
