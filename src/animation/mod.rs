//! Timer-driven animation with optional blitting, and saving animations through writers.

/// The animation state machine and frame drawers.
pub mod anim;
/// Per-axes background snapshots.
pub mod blit;
/// Lazy, re-creatable frame sequences.
pub mod frames;
/// Saving and embedding animations.
pub mod save;
/// Host-independent timer seam.
pub mod timer;
