//! Latest-result publishing
//!
//! The analyzer runs on the audio output thread and the presentation loop
//! reads from another. `SnapshotPublisher` keeps the most recent
//! [`FeatureSnapshot`] behind an `ArcSwap` so a read is a pointer load and a
//! publish is a pointer swap; neither side ever waits on the other.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Features computed from one block
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSnapshot {
    /// Root-mean-square amplitude of the analysis channel
    pub rms: f32,
    /// Frequency of the strongest bin in Hz, 0 when there is no energy
    pub dominant_hz: f32,
    /// Log-compressed, smoothed band magnitudes, all `>= 0`
    pub bands: Vec<f32>,
    /// Frames the transform actually used
    pub frames: usize,
    /// Blocks analyzed so far for the current track; 0 means nothing yet
    pub sequence: u64,
}

impl FeatureSnapshot {
    /// The "nothing analyzed yet" value
    pub fn silent(bands: usize) -> Self {
        Self {
            rms: 0.0,
            dominant_hz: 0.0,
            bands: vec![0.0; bands],
            frames: 0,
            sequence: 0,
        }
    }

    /// True until the first block of a track has been analyzed
    pub fn is_empty(&self) -> bool {
        self.sequence == 0
    }
}

/// Single-writer, many-reader slot for the latest snapshot
pub struct SnapshotPublisher {
    slot: ArcSwap<FeatureSnapshot>,
    bands: usize,
}

/// Thread-safe handle to the publisher
pub type SharedPublisher = Arc<SnapshotPublisher>;

impl SnapshotPublisher {
    /// Publisher holding the silent snapshot for `bands` bands
    pub fn new(bands: usize) -> Self {
        Self {
            slot: ArcSwap::from_pointee(FeatureSnapshot::silent(bands)),
            bands,
        }
    }

    /// Create a new shared publisher
    pub fn shared(bands: usize) -> SharedPublisher {
        Arc::new(Self::new(bands))
    }

    /// Replace the current snapshot
    pub fn publish(&self, snapshot: impl Into<Arc<FeatureSnapshot>>) {
        self.slot.store(snapshot.into());
    }

    /// Latest complete snapshot
    pub fn read(&self) -> Arc<FeatureSnapshot> {
        self.slot.load_full()
    }

    /// Go back to the silent snapshot (used between tracks)
    pub fn reset(&self) {
        self.slot
            .store(Arc::new(FeatureSnapshot::silent(self.bands)));
    }

    /// Band count of the silent snapshot
    pub fn bands(&self) -> usize {
        self.bands
    }
}
