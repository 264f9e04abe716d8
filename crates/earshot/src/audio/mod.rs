//! Audio subsystem
//!
//! Handles decoding into blocks of frames and playback through an output
//! device or a headless drain.

pub mod decoder;
pub mod output;
pub mod source;
pub mod types;

pub use decoder::SymphoniaSource;
pub use output::{BlockPlayback, Completion, DeviceSink, HeadlessSink, PlaybackSink};
pub use source::{BlockSource, FrameBuffer};
pub use types::{CodecInfo, Frame, Pull};
