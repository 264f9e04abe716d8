//! Opening tracks for playback

use std::time::Duration;

use crate::audio::decoder::SymphoniaSource;
use crate::audio::source::BlockSource;
use crate::audio::types::CodecInfo;
use crate::config::audio::DEFAULT_SAMPLE_RATE;
use crate::config::timeouts::PROBE_TIMEOUT_SECS;
use crate::error::Result;

use super::playlist::Track;

/// A freshly opened track, ready for playback
pub struct OpenedTrack {
    pub source: Box<dyn BlockSource>,
    pub codec: Option<CodecInfo>,
}

/// Turns playlist entries into block sources
pub trait TrackOpener {
    fn open(&self, track: &Track) -> Result<OpenedTrack>;
}

/// Opens files from disk with [`SymphoniaSource`], using the extension as
/// the format hint
#[derive(Debug, Clone)]
pub struct FileOpener {
    default_sample_rate: u32,
    probe_timeout: Duration,
}

impl Default for FileOpener {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl FileOpener {
    pub fn new(default_sample_rate: u32) -> Self {
        Self {
            default_sample_rate,
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }
}

impl TrackOpener for FileOpener {
    fn open(&self, track: &Track) -> Result<OpenedTrack> {
        let source =
            SymphoniaSource::open_with(&track.path, self.default_sample_rate, self.probe_timeout)?;
        let codec = Some(source.codec_info());
        Ok(OpenedTrack {
            source: Box::new(source),
            codec,
        })
    }
}
