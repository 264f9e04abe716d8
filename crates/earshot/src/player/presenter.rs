//! Presentation seam
//!
//! The driver hands a [`View`] to a [`Presenter`] on every tick and reports
//! track lifecycle changes as [`PlayerEvent`]s. Presenters are the only place
//! output gets formatted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::FeatureSnapshot;
use crate::audio::types::CodecInfo;
use crate::error::Result;

/// Per-track lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Opening,
    Streaming,
    /// Stop requested, waiting for the sink to let go of the source
    Draining,
    Done,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackState::Opening => write!(f, "Opening"),
            TrackState::Streaming => write!(f, "Streaming"),
            TrackState::Draining => write!(f, "Draining"),
            TrackState::Done => write!(f, "Done"),
        }
    }
}

/// Lifecycle notifications from the driver
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A track opened and is now playing
    TrackStarted {
        index: usize,
        label: String,
        codec: Option<CodecInfo>,
    },
    /// A track finished (ran out, or was skipped)
    TrackFinished {
        index: usize,
        label: String,
        skipped: bool,
    },
    /// A track could not be opened, or its stream broke mid-way
    TrackFailed {
        index: usize,
        label: String,
        error: String,
    },
    /// Every entry has been visited
    PlaylistFinished,
}

/// What the presenter sees on each tick
#[derive(Debug, Clone)]
pub struct View<'a> {
    /// Label of the current track
    pub track: &'a str,
    /// Zero-based playlist position
    pub position: usize,
    /// Playlist length
    pub total: usize,
    /// Time since the track started
    pub elapsed: Duration,
    pub state: TrackState,
    pub codec: Option<&'a CodecInfo>,
    /// Latest published features
    pub snapshot: Arc<FeatureSnapshot>,
}

/// What the driver should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterAction {
    Continue,
    SkipTrack,
    Quit,
}

/// Presentation layer
pub trait Presenter {
    /// Track lifecycle notification
    fn on_event(&mut self, event: &PlayerEvent);

    /// Render one tick; an error aborts the run
    fn present(&mut self, view: &View<'_>) -> Result<PresenterAction>;
}
