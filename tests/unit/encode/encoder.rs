use super::*;

struct Missing;

impl CodecProfile for Missing {
    fn name(&self) -> &'static str {
        "missing"
    }

    fn resolve(&self) -> Option<PathBuf> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }

    fn pipe_input_args(&self, _: &WriterSettings, _: (u32, u32), _: FrameFormat) -> Vec<String> {
        Vec::new()
    }

    fn file_input_args(&self, _: &WriterSettings, _: &FrameFiles) -> Vec<String> {
        Vec::new()
    }

    fn output_args(&self, _: &WriterSettings, _: &Path) -> Vec<String> {
        Vec::new()
    }
}

fn settings() -> WriterSettings {
    WriterSettings::from_config(&Config::default(), Some(10.0))
}

#[test]
fn unavailable_profile_is_rejected_at_construction() {
    let err = Encoder::new(Box::new(Missing), Strategy::Pipe, settings()).unwrap_err();
    assert!(matches!(err, FlipbookError::EncoderUnavailable(_)));
}

#[test]
fn invalid_fps_is_rejected_at_construction() {
    let bad = WriterSettings::from_config(&Config::default(), Some(-1.0));
    let err = Encoder::new(Box::new(Missing), Strategy::Pipe, bad).unwrap_err();
    assert!(matches!(err, FlipbookError::Configuration(_)));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use crate::encode::process::find_executable;
    use crate::figure::raster::RasterFigure;

    /// `sh -c <script> sh <input...> <outfile>`.
    struct Script {
        pipe: &'static str,
        file: &'static str,
    }

    impl CodecProfile for Script {
        fn name(&self) -> &'static str {
            "script"
        }

        fn resolve(&self) -> Option<PathBuf> {
            find_executable("sh")
        }

        fn is_available(&self) -> bool {
            self.resolve().is_some()
        }

        fn pipe_input_args(
            &self,
            _: &WriterSettings,
            _: (u32, u32),
            _: FrameFormat,
        ) -> Vec<String> {
            vec!["-c".into(), self.pipe.into(), "sh".into()]
        }

        fn file_input_args(&self, _: &WriterSettings, frames: &FrameFiles) -> Vec<String> {
            vec![
                "-c".into(),
                self.file.into(),
                "sh".into(),
                frames.glob_pattern(),
            ]
        }

        fn output_args(&self, _: &WriterSettings, outfile: &Path) -> Vec<String> {
            vec![outfile.to_string_lossy().into_owned()]
        }

        fn size_alignment(&self, _: &WriterSettings) -> Option<u32> {
            Some(2)
        }
    }

    fn concat() -> Box<Script> {
        Box::new(Script {
            pipe: r#"cat > "$1""#,
            file: r#"cat $1 > "$2""#,
        })
    }

    fn grab(enc: &mut Encoder, fig: &mut RasterFigure, n: usize) {
        for _ in 0..n {
            enc.grab_frame(fig, &RenderOptions::default()).unwrap();
        }
    }

    #[test]
    fn pipe_streams_raw_frames_and_aligns_size() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("movie.raw");
        let mut fig = RasterFigure::new(1.05, 0.5, 10.0);
        let mut enc = Encoder::new(concat(), Strategy::Pipe, settings()).unwrap();

        enc.setup(&mut fig, &out, None).unwrap();
        assert_eq!(enc.frame_size(), Some((10, 4)));
        assert_eq!(enc.state(), SessionState::Setup);
        grab(&mut enc, &mut fig, 3);
        assert_eq!(enc.state(), SessionState::Grabbing);
        enc.finish().unwrap();
        assert_eq!(enc.state(), SessionState::Closed);

        assert_eq!(std::fs::metadata(&out).unwrap().len(), 3 * 10 * 4 * 4);
    }

    #[test]
    fn file_strategy_removes_temporary_frames() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("movie.raw");
        let mut fig = RasterFigure::new(1.0, 0.5, 8.0);
        let s = settings().with_frame_format(FrameFormat::Rgba);
        let mut enc = Encoder::new(concat(), Strategy::file(), s).unwrap();

        enc.setup(&mut fig, &out, None).unwrap();
        grab(&mut enc, &mut fig, 2);
        let files = enc.frame_files().unwrap();
        assert!(files.is_temporary());
        assert_eq!(files.count(), 2);
        let tmp = files.prefix().parent().unwrap().to_path_buf();

        enc.finish().unwrap();
        assert!(!tmp.exists());
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 2 * 8 * 4 * 4);
    }

    #[test]
    fn file_strategy_rejects_unsupported_formats_at_setup() {
        let dir = tempfile::tempdir().unwrap();
        let mut fig = RasterFigure::new(1.0, 0.5, 8.0);
        let s = settings().with_frame_format(FrameFormat::Svg);
        let mut enc = Encoder::new(concat(), Strategy::file(), s).unwrap();
        let err = enc
            .setup(&mut fig, &dir.path().join("x.mp4"), None)
            .unwrap_err();
        assert!(matches!(err, FlipbookError::Configuration(_)));
    }

    #[test]
    fn misuse_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut fig = RasterFigure::new(1.0, 0.5, 8.0);
        let mut enc = Encoder::new(concat(), Strategy::Pipe, settings()).unwrap();
        assert!(matches!(
            enc.grab_frame(&mut fig, &RenderOptions::default()),
            Err(FlipbookError::State(_))
        ));
        enc.setup(&mut fig, &dir.path().join("a.raw"), None).unwrap();
        enc.finish().unwrap();
        assert!(matches!(enc.finish(), Err(FlipbookError::State(_))));
        assert!(matches!(
            enc.setup(&mut fig, &dir.path().join("b.raw"), None),
            Err(FlipbookError::State(_))
        ));
    }

    #[test]
    fn failing_encoder_surfaces_exit_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mut fig = RasterFigure::new(1.0, 0.5, 8.0);
        let profile = Box::new(Script {
            pipe: "cat >/dev/null; echo 'Unknown encoder' >&2; exit 1",
            file: "echo 'no frames matched' >&2; exit 2",
        });
        let mut enc = Encoder::new(profile, Strategy::Pipe, settings()).unwrap();
        enc.setup(&mut fig, &dir.path().join("a.mp4"), None).unwrap();
        grab(&mut enc, &mut fig, 1);
        let err = enc.finish().unwrap_err();
        let failure = err.process_failure().unwrap();
        assert_eq!(failure.code, Some(1));
        assert!(failure.stderr.contains("Unknown encoder"));
        assert_eq!(enc.state(), SessionState::Closed);
    }

    #[test]
    fn missing_frame_at_cleanup_does_not_fail_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("movie.raw");
        let mut fig = RasterFigure::new(1.0, 0.5, 8.0);
        let s = settings().with_frame_format(FrameFormat::Rgba);
        let strategy = Strategy::File {
            frame_prefix: Some(dir.path().join("frames").join("shot")),
            keep_frames: false,
        };
        let mut enc = Encoder::new(concat(), strategy, s).unwrap();

        enc.setup(&mut fig, &out, None).unwrap();
        grab(&mut enc, &mut fig, 3);
        let paths = enc.frame_files().unwrap().paths().to_vec();
        std::fs::remove_file(&paths[0]).unwrap();

        enc.finish().unwrap();
        assert_eq!(enc.state(), SessionState::Closed);
        assert!(paths.iter().all(|p| !p.exists()));
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 2 * 8 * 4 * 4);
    }
}
