//! Audio output
//!
//! A [`PlaybackSink`] takes ownership of a block source, drains it at playback
//! pace, and signals completion exactly once on a one-shot channel.
//! `DeviceSink` plays through the default rodio output device; `HeadlessSink`
//! drains on a background thread without touching audio hardware.

use std::num::NonZero;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use rodio::{DeviceSinkBuilder, Player, Source};

use crate::config::audio::{BLOCK_FRAMES, DEFAULT_SAMPLE_RATE};
use crate::error::{PlayerError, Result};

use super::source::BlockSource;
use super::types::Frame;

const STEREO: NonZero<u16> = match NonZero::new(2) {
    Some(c) => c,
    None => unreachable!(),
};

const FALLBACK_RATE: NonZero<u32> = match NonZero::new(DEFAULT_SAMPLE_RATE) {
    Some(r) => r,
    None => unreachable!(),
};

/// How a playing source finished
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Frames handed to the output before the source finished
    pub frames: u64,
    /// Error that ended the stream early (never set when stopped)
    pub error: Option<String>,
    /// True when playback was cut short by `stop()` rather than exhaustion
    pub stopped: bool,
}

/// Something that can play a block source and report when it is done
pub trait PlaybackSink {
    /// Start playing `source`, replacing whatever was playing.
    ///
    /// The returned receiver gets exactly one [`Completion`].
    fn play(&mut self, source: Box<dyn BlockSource>) -> Result<Receiver<Completion>>;

    /// Stop the current source, if any
    fn stop(&mut self);
}

/// Adapts a [`BlockSource`] into an interleaved stereo `rodio::Source`.
///
/// Pulls one block at a time and sends a [`Completion`] when the source is
/// exhausted, or when the adapter is dropped before that (stop/skip).
pub struct BlockPlayback {
    source: Box<dyn BlockSource>,
    block: Vec<Frame>,
    filled: usize,
    cursor: usize,
    sample_rate: NonZero<u32>,
    frames_played: u64,
    done: Option<Sender<Completion>>,
}

impl BlockPlayback {
    /// Wrap `source`, returning the adapter and its completion receiver
    pub fn new(source: Box<dyn BlockSource>, block_frames: usize) -> (Self, Receiver<Completion>) {
        let (tx, rx) = bounded(1);
        let sample_rate = NonZero::new(source.sample_rate()).unwrap_or(FALLBACK_RATE);
        let playback = Self {
            source,
            block: vec![[0.0; 2]; block_frames.max(1)],
            filled: 0,
            cursor: 0,
            sample_rate,
            frames_played: 0,
            done: Some(tx),
        };
        (playback, rx)
    }

    /// Pull the next block from the source, bypassing sample iteration.
    ///
    /// Returns `None` once the source is exhausted.
    pub fn next_block(&mut self) -> Option<&[Frame]> {
        if !self.refill() {
            return None;
        }
        // Whole block consumed by the caller
        self.cursor = self.filled * 2;
        Some(&self.block[..self.filled])
    }

    /// Frames pulled from the source so far
    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }

    /// True once completion has been signalled
    pub fn is_finished(&self) -> bool {
        self.done.is_none()
    }

    fn refill(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        loop {
            let pull = self.source.pull(&mut self.block);
            if !pull.has_more {
                self.finish(false);
                return false;
            }
            if pull.frames > 0 {
                self.filled = pull.frames;
                self.cursor = 0;
                self.frames_played += pull.frames as u64;
                return true;
            }
        }
    }

    fn finish(&mut self, stopped: bool) {
        if let Some(tx) = self.done.take() {
            let error = if stopped {
                None
            } else {
                self.source.last_error()
            };
            let _ = tx.send(Completion {
                frames: self.frames_played,
                error,
                stopped,
            });
        }
    }
}

impl Drop for BlockPlayback {
    fn drop(&mut self) {
        self.finish(true);
    }
}

impl Iterator for BlockPlayback {
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        if self.cursor >= self.filled * 2 && !self.refill() {
            return None;
        }
        let frame = self.block[self.cursor / 2];
        let sample = frame[self.cursor % 2];
        self.cursor += 1;
        Some(sample)
    }
}

impl Source for BlockPlayback {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> NonZero<u16> {
        STEREO
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Plays through the default output device.
///
/// The rodio output stream lives on a dedicated `"audio-output"` thread for
/// as long as the sink exists; playback control goes through the `Player`.
pub struct DeviceSink {
    player: Player,
    block_frames: usize,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceSink {
    /// Open the default output device.
    ///
    /// Blocks until the output stream is initialized (or fails).
    pub fn open(block_frames: usize) -> Result<Self> {
        let (init_tx, init_rx) = bounded::<std::result::Result<Player, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                // Create audio output on this thread (cpal streams may be !Send)
                let mut stream = match DeviceSinkBuilder::open_default_sink() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(format!("Failed to open audio output: {}", e)));
                        return;
                    }
                };
                stream.log_on_drop(false);

                let player = Player::connect_new(stream.mixer());
                if init_tx.send(Ok(player)).is_err() {
                    return;
                }

                // Keep the stream alive until the sink is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| PlayerError::Audio(format!("Failed to spawn audio thread: {}", e)))?;

        match init_rx.recv() {
            Ok(Ok(player)) => {
                log::debug!("Audio output opened");
                Ok(Self {
                    player,
                    block_frames,
                    shutdown_tx: Some(shutdown_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(msg)) => {
                let _ = thread.join();
                Err(PlayerError::Audio(msg))
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlayerError::Audio(
                    "Audio thread exited during initialization".to_string(),
                ))
            }
        }
    }

    /// Open with the default block size
    pub fn open_default() -> Result<Self> {
        Self::open(BLOCK_FRAMES)
    }
}

impl PlaybackSink for DeviceSink {
    fn play(&mut self, source: Box<dyn BlockSource>) -> Result<Receiver<Completion>> {
        self.player.stop();
        let (playback, done) = BlockPlayback::new(source, self.block_frames);
        self.player.append(playback);
        self.player.play();
        Ok(done)
    }

    fn stop(&mut self) {
        self.player.stop();
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.player.stop();
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

struct HeadlessWorker {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drains sources on a background thread without an output device.
///
/// With `realtime` set, each block is held for its playback duration so the
/// analysis advances at the same pace it would through a speaker.
pub struct HeadlessSink {
    block_frames: usize,
    realtime: bool,
    worker: Option<HeadlessWorker>,
}

impl HeadlessSink {
    pub fn new(block_frames: usize, realtime: bool) -> Self {
        Self {
            block_frames,
            realtime,
            worker: None,
        }
    }

    fn drain(mut playback: BlockPlayback, stop_flag: Arc<AtomicBool>, realtime: bool) {
        let rate = playback.sample_rate.get() as f64;
        let started = Instant::now();
        while !stop_flag.load(Ordering::Acquire) {
            if playback.next_block().is_none() {
                return;
            }
            if realtime {
                let due = Duration::from_secs_f64(playback.frames_played() as f64 / rate);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    thread::sleep(wait);
                }
            }
        }
        // Dropping `playback` reports the stop
    }
}

impl PlaybackSink for HeadlessSink {
    fn play(&mut self, source: Box<dyn BlockSource>) -> Result<Receiver<Completion>> {
        self.stop();

        let (playback, done) = BlockPlayback::new(source, self.block_frames);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let realtime = self.realtime;

        let handle = thread::Builder::new()
            .name("headless-playback".to_string())
            .spawn(move || Self::drain(playback, flag, realtime))
            .map_err(|e| PlayerError::Audio(format!("Failed to spawn playback thread: {}", e)))?;

        self.worker = Some(HeadlessWorker { stop_flag, handle });
        Ok(done)
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop_flag.store(true, Ordering::Release);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for HeadlessSink {
    fn drop(&mut self) {
        self.stop();
    }
}
