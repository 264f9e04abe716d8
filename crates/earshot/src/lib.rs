//! Earshot: live audio analysis for local music
//!
//! Plays a directory of audio files and, while each block is on its way to
//! the speaker, computes its RMS amplitude, dominant frequency and a banded
//! log spectrum for display.
//!
//! ## Quick start
//!
//! ```no_run
//! use earshot::audio::DeviceSink;
//! use earshot::config::Config;
//! use earshot::player::{discover, FileOpener, PlaybackDriver};
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod player;
