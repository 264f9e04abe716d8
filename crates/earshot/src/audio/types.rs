//! Shared audio types
//!
//! Pure data types used across the audio subsystem.

use std::fmt;

/// One sample instant: left and right amplitude in `[-1.0, 1.0]`
pub type Frame = [f32; 2];

/// Result of pulling one block from a [`BlockSource`](super::source::BlockSource)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pull {
    /// Frames written to the front of the block
    pub frames: usize,
    /// `false` once the source is drained; `frames` is then 0
    pub has_more: bool,
}

impl Pull {
    /// `frames` were written and more may follow
    pub fn more(frames: usize) -> Self {
        Self {
            frames,
            has_more: true,
        }
    }

    /// The source is drained
    pub fn end() -> Self {
        Self {
            frames: 0,
            has_more: false,
        }
    }
}

/// Codec information for the current track
#[derive(Debug, Clone, PartialEq)]
pub struct CodecInfo {
    pub codec_name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: Option<u32>,
}

impl fmt::Display for CodecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel_str = if self.channels == 1 { "Mono" } else { "Stereo" };
        write!(f, "{}", self.codec_name)?;
        write!(f, " · {} Hz", self.sample_rate)?;
        if let Some(bits) = self.bits_per_sample {
            write!(f, " · {}-bit", bits)?;
        }
        write!(f, " · {}", channel_str)
    }
}
