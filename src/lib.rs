//! Flipbook animates figures frame by frame and saves them as movies.
//!
//! - Build an [`Animation`] over a [`FrameSource`] with a [`FrameDrawer`] and a [`Timer`]
//! - Drive it from the host: route canvas events to [`Animation::handle_event`] and timer
//!   expiries to [`Animation::tick`]
//! - Save it through a [`MovieWriter`] picked from the [`WriterRegistry`] (ffmpeg and
//!   ImageMagick in pipe or file mode, GIF, HTML), or embed it as an HTML5 video or a
//!   JavaScript player
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Animation state machine, blitting and saving.
pub mod animation;
/// Movie writers and encoder processes.
pub mod encode;
/// Figure and canvas seams, plus an in-memory reference canvas.
pub mod figure;

pub use crate::foundation::config::{Config, PlaybackMode};
pub use crate::foundation::core::{
    ArtistId, AxesId, Circle, FrameFormat, Point, Rect, RenderOptions, Snapshot, ViewSignature,
    pixel_size,
};
pub use crate::foundation::error::{FlipbookError, FlipbookResult, ProcessFailure};

pub use crate::animation::anim::{
    Animation, AnimationOptions, AnimationPhase, ArtistFrames, CanvasEvent, FrameDrawer,
    FuncDrawer, StepOutcome,
};
pub use crate::animation::blit::{BlitCache, RestoreOutcome};
pub use crate::animation::frames::{DEFAULT_SAVE_COUNT, FrameSource};
pub use crate::animation::save::{
    ProgressFn, SaveOptions, Saveable, VIDEO_TOO_LARGE, save_animations, save_with_writer,
};
pub use crate::animation::timer::{ManualTimer, TickHandler, Timer};
pub use crate::encode::encoder::{Encoder, Strategy};
pub use crate::encode::gif::GifWriter;
pub use crate::encode::html::{HTML_FRAME_FORMATS, HtmlOptions, HtmlWriter};
pub use crate::encode::registry::{WriterKind, WriterRegistry};
pub use crate::encode::writer::{
    MovieWriter, SessionState, WriterSettings, adjusted_figsize, saving,
};
pub use crate::figure::raster::{ArtistShape, RasterFigure};
pub use crate::figure::{Canvas, Figure};
