//! Block-oriented audio sources
//!
//! A [`BlockSource`] hands out decoded audio one block of [`Frame`]s at a time.
//! Decoders implement it, the analyzer decorates it, and playback sinks drain it.

use super::types::{Frame, Pull};

/// A stream of decoded stereo frames at a fixed sample rate
pub trait BlockSource: Send {
    /// Fill the front of `block` with up to `block.len()` frames.
    ///
    /// Once the stream is drained this returns [`Pull::end()`]; a pull never
    /// reports more frames than `block.len()`.
    fn pull(&mut self, block: &mut [Frame]) -> Pull;

    /// Sample rate of the frames in Hz
    fn sample_rate(&self) -> u32;

    /// Channel count of the underlying media (frames are always stereo)
    fn channels(&self) -> u16;

    /// Error that ended the stream early, if any (clean EOF reports `None`)
    fn last_error(&self) -> Option<String> {
        None
    }
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn pull(&mut self, block: &mut [Frame]) -> Pull {
        (**self).pull(block)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}

/// In-memory source over a vector of frames
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
    position: usize,
    sample_rate: u32,
    channels: u16,
}

impl FrameBuffer {
    /// Stereo buffer
    pub fn new(sample_rate: u32, frames: Vec<Frame>) -> Self {
        Self {
            frames,
            position: 0,
            sample_rate,
            channels: 2,
        }
    }

    /// Mono samples, duplicated into both slots of each frame
    pub fn from_mono(sample_rate: u32, samples: &[f32]) -> Self {
        Self {
            frames: samples.iter().map(|&s| [s, s]).collect(),
            position: 0,
            sample_rate,
            channels: 1,
        }
    }

    /// Frames not yet pulled
    pub fn remaining(&self) -> usize {
        self.frames.len() - self.position
    }
}

impl BlockSource for FrameBuffer {
    fn pull(&mut self, block: &mut [Frame]) -> Pull {
        let n = self.remaining().min(block.len());
        if n == 0 {
            return Pull::end();
        }
        block[..n].copy_from_slice(&self.frames[self.position..self.position + n]);
        self.position += n;
        Pull::more(n)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}
