use super::*;

#[test]
fn count_restarts_on_every_pass() {
    let src = FrameSource::count(3);
    assert_eq!(src.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(src.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(src.len(), Some(3));
}

#[test]
fn unbounded_has_no_length() {
    let src = FrameSource::unbounded();
    assert_eq!(src.len(), None);
    assert_eq!(src.iter().take(4).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn items_are_cloned_per_pass() {
    let src = FrameSource::from_items(vec!["a".to_owned(), "b".to_owned()]);
    let first: Vec<String> = src.iter().collect();
    let second: Vec<String> = src.iter().collect();
    assert_eq!(first, second);
    assert_eq!(src.len(), Some(2));
    assert!(!src.is_empty());
    assert!(FrameSource::<u8>::from_items(Vec::new()).is_empty());
}

#[test]
fn generator_length_is_unknown() {
    let src = FrameSource::from_fn(|| (0..5).map(|i| i * 10));
    assert_eq!(src.len(), None);
    assert_eq!(src.iter().last(), Some(40));
}
