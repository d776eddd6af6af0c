//! Movie writers.
//!
//! Every writer follows the same session lifecycle (`setup`, any number of `grab_frame`,
//! exactly one `finish`). Process-backed writers pair a [`profile::CodecProfile`] with a
//! [`encoder::Strategy`]; GIF and HTML output is produced in-process.

/// `Encoder`: codec profile plus pipe or file strategy.
pub mod encoder;
/// Numbered frame files for buffered sessions.
pub mod frames;
/// In-memory animated GIF writer.
pub mod gif;
/// HTML page writer with a JavaScript player.
pub mod html;
/// Encoder process spawning, draining and executable lookup.
pub mod process;
/// ffmpeg and ImageMagick argument builders.
pub mod profile;
/// Writer names, availability probes and construction.
pub mod registry;
/// Writer contract and shared session bookkeeping.
pub mod writer;
