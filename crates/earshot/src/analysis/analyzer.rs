//! Audio analysis source
//!
//! `AnalyzingSource` wraps any [`BlockSource`] and computes RMS, dominant
//! frequency and band spectrum for every block that passes through, writing
//! the results to a shared [`SnapshotPublisher`].

use std::sync::Arc;

use crate::audio::source::BlockSource;
use crate::audio::types::{Frame, Pull};
use crate::config::AnalysisConfig;

use super::snapshot::{FeatureSnapshot, SharedPublisher};
use super::transform::BlockTransform;

/// Wrapper source that analyzes each block on its way to playback
pub struct AnalyzingSource<S> {
    inner: S,
    transform: BlockTransform,
    publisher: SharedPublisher,
    previous: Option<Arc<FeatureSnapshot>>,
}

impl<S> AnalyzingSource<S>
where
    S: BlockSource,
{
    /// Create a new analyzing wrapper around the given source
    pub fn new(source: S, config: AnalysisConfig, publisher: SharedPublisher) -> Self {
        Self {
            inner: source,
            transform: BlockTransform::new(config),
            publisher,
            previous: None,
        }
    }

    /// Blocks analyzed so far
    pub fn blocks_analyzed(&self) -> u64 {
        self.previous.as_ref().map_or(0, |p| p.sequence)
    }

    /// Unwrap the inner source
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn process_block(&mut self, block: &[Frame]) {
        let snapshot = Arc::new(self.transform.analyze(
            block,
            self.inner.sample_rate(),
            self.previous.as_deref(),
        ));
        self.publisher.publish(snapshot.clone());
        self.previous = Some(snapshot);
    }
}

impl<S> BlockSource for AnalyzingSource<S>
where
    S: BlockSource,
{
    fn pull(&mut self, block: &mut [Frame]) -> Pull {
        let pull = self.inner.pull(block);
        if pull.has_more && pull.frames > 0 {
            self.process_block(&block[..pull.frames]);
        }
        pull
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}
