use super::*;

#[test]
fn command_line_quotes_arguments_with_spaces() {
    let args = vec!["-i".to_owned(), "a b.png".to_owned(), String::new()];
    assert_eq!(command_line("ffmpeg", &args), "ffmpeg -i 'a b.png' ''");
}

#[test]
fn missing_programs_do_not_resolve() {
    assert!(find_executable("flipbook-no-such-encoder-7f3a").is_none());
    assert!(find_executable("/nonexistent/dir/encoder").is_none());
}

#[cfg(unix)]
mod unix {
    use std::io::Write as _;

    use super::*;

    fn sh() -> PathBuf {
        find_executable("sh").expect("sh on PATH")
    }

    fn script(s: &str) -> Vec<String> {
        vec!["-c".to_owned(), s.to_owned()]
    }

    #[test]
    fn resolves_programs_on_path_and_by_path() {
        let sh = sh();
        assert!(sh.is_absolute());
        assert_eq!(find_executable(sh.to_str().unwrap()), Some(sh.clone()));
    }

    #[test]
    fn successful_process_returns_captured_output() {
        let mut p = EncoderProcess::spawn(&sh(), &script("wc -c; echo note >&2")).unwrap();
        p.stdin().unwrap().write_all(b"hello").unwrap();
        let out = p.finish().unwrap();
        assert_eq!(out.stdout.trim(), "5");
        assert_eq!(out.stderr.trim(), "note");
    }

    #[test]
    fn failing_process_reports_code_and_streams() {
        let p = EncoderProcess::spawn(
            &sh(),
            &script("cat >/dev/null; echo partial; echo 'bad codec' >&2; exit 3"),
        )
        .unwrap();
        let err = p.finish().unwrap_err();
        let failure = err.process_failure().expect("process failure");
        assert_eq!(failure.code, Some(3));
        assert_eq!(failure.stdout.trim(), "partial");
        assert_eq!(failure.stderr.trim(), "bad codec");
        assert!(failure.program.ends_with("sh"));
        assert_eq!(failure.args[0], "-c");
        assert!(err.to_string().contains("bad codec"));
    }

    #[test]
    fn probe_captures_output() {
        let out = probe_output(&sh(), &["-c", "echo probe"]).unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "probe");
        assert!(probe_output(Path::new("/nonexistent/encoder"), &[]).is_none());
    }

    #[test]
    fn dropping_a_running_process_kills_it() {
        let p = EncoderProcess::spawn(&sh(), &script("sleep 30")).unwrap();
        let started = std::time::Instant::now();
        drop(p);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
