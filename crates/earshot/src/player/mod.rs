//! Playlist playback
//!
//! Discovers tracks, opens them, and drives them through the analyzer to a
//! playback sink while a presenter renders the latest snapshot.

pub mod driver;
pub mod opener;
pub mod playlist;
pub mod presenter;

pub use driver::{PlaybackDriver, PlaybackSession, RunSummary};
pub use opener::{FileOpener, OpenedTrack, TrackOpener};
pub use playlist::{discover, Playlist, Track};
pub use presenter::{PlayerEvent, Presenter, PresenterAction, TrackState, View};
