use std::collections::HashMap;

use crate::figure::Canvas;
use crate::foundation::core::{AxesId, Snapshot, ViewSignature};

/// Outcome of [`BlitCache::restore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The cached background was written back.
    Restored,
    /// The axes view changed since the snapshot; the entry was dropped.
    Dropped,
    /// Nothing was cached for the axes.
    Missing,
}

/// Per-axes background snapshots keyed by the view they were taken in.
#[derive(Debug, Default)]
pub struct BlitCache {
    entries: HashMap<AxesId, (ViewSignature, Snapshot)>,
}

impl BlitCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the background of `axes` unless a snapshot for its current view is cached.
    ///
    /// Returns `true` when a new snapshot was taken.
    pub fn get_or_refresh(&mut self, canvas: &mut dyn Canvas, axes: AxesId) -> bool {
        let view = canvas.view_signature(axes);
        if let Some((cached, _)) = self.entries.get(&axes)
            && *cached == view
        {
            return false;
        }
        let bbox = canvas.axes_bbox(axes);
        let snapshot = canvas.copy_from_bbox(bbox);
        self.entries.insert(axes, (view, snapshot));
        true
    }

    /// Write the cached background of `axes` back if its view is unchanged.
    ///
    /// A stale entry is dropped silently; the next full draw repopulates it.
    pub fn restore(&mut self, canvas: &mut dyn Canvas, axes: AxesId) -> RestoreOutcome {
        let Some((view, snapshot)) = self.entries.get(&axes) else {
            return RestoreOutcome::Missing;
        };
        if *view == canvas.view_signature(axes) {
            canvas.restore_region(snapshot);
            RestoreOutcome::Restored
        } else {
            self.entries.remove(&axes);
            RestoreOutcome::Dropped
        }
    }

    /// Cached snapshot for `axes`, if any.
    pub fn get(&self, axes: AxesId) -> Option<&Snapshot> {
        self.entries.get(&axes).map(|(_, snapshot)| snapshot)
    }

    /// Whether `axes` has a cached entry.
    pub fn contains(&self, axes: AxesId) -> bool {
        self.entries.contains_key(&axes)
    }

    /// Number of cached axes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/blit.rs"]
mod tests;
