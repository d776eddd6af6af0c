use std::rc::Rc;

/// Fallback save count for frame sources of unknown length.
pub const DEFAULT_SAVE_COUNT: usize = 100;

type IterFactory<T> = Rc<dyn Fn() -> Box<dyn Iterator<Item = T>>>;

/// Lazily produced, re-creatable sequence of per-frame payloads.
///
/// Each call to [`FrameSource::iter`] starts a fresh pass. Sources may be infinite.
#[derive(Clone)]
pub struct FrameSource<T> {
    factory: IterFactory<T>,
    len: Option<usize>,
}

impl<T> std::fmt::Debug for FrameSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource").field("len", &self.len).finish()
    }
}

impl FrameSource<u64> {
    /// Frames `0..n`.
    pub fn count(n: u64) -> Self {
        Self {
            factory: Rc::new(move || Box::new(0..n)),
            len: usize::try_from(n).ok(),
        }
    }

    /// Frames `0, 1, 2, ...` without end.
    pub fn unbounded() -> Self {
        Self {
            factory: Rc::new(|| Box::new(0u64..)),
            len: None,
        }
    }
}

impl<T: Clone + 'static> FrameSource<T> {
    /// A fixed list of payloads.
    pub fn from_items(items: Vec<T>) -> Self {
        let len = items.len();
        let items = Rc::new(items);
        Self {
            factory: Rc::new(move || {
                let items = Rc::clone(&items);
                Box::new((0..items.len()).map(move |i| items[i].clone()))
            }),
            len: Some(len),
        }
    }
}

impl<T: 'static> FrameSource<T> {
    /// A generator function producing a new iterator per pass. The length is unknown.
    pub fn from_fn<I, F>(generator: F) -> Self
    where
        F: Fn() -> I + 'static,
        I: Iterator<Item = T> + 'static,
    {
        Self {
            factory: Rc::new(move || Box::new(generator())),
            len: None,
        }
    }

    /// Start a fresh pass over the sequence.
    pub fn iter(&self) -> Box<dyn Iterator<Item = T>> {
        (self.factory)()
    }

    /// Number of frames per pass, when known.
    pub fn len(&self) -> Option<usize> {
        self.len
    }

    /// `true` when the source is known to produce no frames.
    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/frames.rs"]
mod tests;
