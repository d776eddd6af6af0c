use super::*;
use crate::figure::raster::RasterFigure;

#[test]
fn temporary_frames_are_numbered_and_removed() {
    let mut fig = RasterFigure::new(1.0, 1.0, 8.0);
    let mut files = FrameFiles::temporary(FrameFormat::Png).unwrap();
    assert!(files.is_temporary());
    for _ in 0..3 {
        files
            .write_frame(&mut fig, 8.0, &RenderOptions::default())
            .unwrap();
    }
    assert_eq!(files.count(), 3);
    let names: Vec<String> = files
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["tmp0000000.png", "tmp0000001.png", "tmp0000002.png"]);
    assert!(files.printf_pattern().ends_with("tmp%07d.png"));
    assert!(files.glob_pattern().ends_with("tmp*.png"));

    let dir = files.prefix().parent().unwrap().to_path_buf();
    assert!(dir.is_dir());
    files.cleanup();
    assert!(!dir.exists());
}

#[test]
fn prefixed_frames_are_removed_unless_kept() {
    let root = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 8.0);

    let mut dropped =
        FrameFiles::with_prefix(root.path().join("a/frame"), FrameFormat::Ppm, false).unwrap();
    dropped
        .write_frame(&mut fig, 8.0, &RenderOptions::default())
        .unwrap();
    let first = dropped.paths()[0].clone();
    assert!(first.ends_with("frame0000000.ppm"));
    assert!(first.is_file());
    dropped.cleanup();
    assert!(!first.exists());

    let mut kept =
        FrameFiles::with_prefix(root.path().join("b/frame"), FrameFormat::Rgba, true).unwrap();
    for _ in 0..2 {
        kept.write_frame(&mut fig, 8.0, &RenderOptions::default())
            .unwrap();
    }
    let paths = kept.paths().to_vec();
    kept.cleanup();
    assert!(paths.iter().all(|p| p.is_file()));
    assert_eq!(std::fs::metadata(&paths[0]).unwrap().len(), 8 * 8 * 4);
}

#[test]
fn cleanup_skips_frames_that_are_already_gone() {
    let root = tempfile::tempdir().unwrap();
    let mut fig = RasterFigure::new(1.0, 1.0, 8.0);
    let mut files =
        FrameFiles::with_prefix(root.path().join("f/frame"), FrameFormat::Png, false).unwrap();
    for _ in 0..3 {
        files
            .write_frame(&mut fig, 8.0, &RenderOptions::default())
            .unwrap();
    }
    let paths = files.paths().to_vec();
    std::fs::remove_file(&paths[1]).unwrap();

    files.cleanup();
    assert!(paths.iter().all(|p| !p.exists()));
}
