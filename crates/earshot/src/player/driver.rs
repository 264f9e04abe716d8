//! Playback driver
//!
//! Plays a playlist one track at a time: opens each entry, wraps it in the
//! analyzer, hands it to the sink, and ticks the presenter until the sink
//! reports completion. A track that fails to open or breaks mid-stream is
//! reported and skipped; only setup and presenter errors end the run.

use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick};

use crate::analysis::{AnalyzingSource, SharedPublisher, SnapshotPublisher};
use crate::audio::output::{Completion, PlaybackSink};
use crate::audio::types::CodecInfo;
use crate::config::{AnalysisConfig, Config};
use crate::error::{PlayerError, Result};

use super::opener::TrackOpener;
use super::playlist::{Playlist, Track};
use super::presenter::{PlayerEvent, Presenter, PresenterAction, TrackState, View};

/// Totals for one run over a playlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tracks that played to the end
    pub played: usize,
    /// Tracks cut short with `SkipTrack`
    pub skipped: usize,
    /// Tracks that could not be opened or broke mid-stream
    pub failed: usize,
    /// The presenter asked to quit
    pub quit: bool,
}

/// State for the track currently playing
pub struct PlaybackSession<'a> {
    index: usize,
    track: &'a Track,
    codec: Option<CodecInfo>,
    started: Instant,
    state: TrackState,
}

impl<'a> PlaybackSession<'a> {
    fn new(index: usize, track: &'a Track, codec: Option<CodecInfo>) -> Self {
        Self {
            index,
            track,
            codec,
            started: Instant::now(),
            state: TrackState::Opening,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    fn set_state(&mut self, state: TrackState) {
        log::debug!("{}: {} -> {}", self.track.label, self.state, state);
        self.state = state;
    }

    fn view(&self, total: usize, publisher: &SnapshotPublisher) -> View<'_> {
        View {
            track: &self.track.label,
            position: self.index,
            total,
            elapsed: self.started.elapsed(),
            state: self.state,
            codec: self.codec.as_ref(),
            snapshot: publisher.read(),
        }
    }
}

enum TrackOutcome {
    Finished,
    Skipped,
    Failed,
    Quit,
}

/// Sequences a playlist through an opener, the analyzer and a sink
pub struct PlaybackDriver<O, K> {
    opener: O,
    sink: K,
    publisher: SharedPublisher,
    analysis: AnalysisConfig,
    tick_interval: Duration,
}

impl<O, K> PlaybackDriver<O, K>
where
    O: TrackOpener,
    K: PlaybackSink,
{
    pub fn new(opener: O, sink: K, analysis: AnalysisConfig, tick_interval: Duration) -> Self {
        Self {
            opener,
            sink,
            publisher: SnapshotPublisher::shared(analysis.bands),
            analysis,
            tick_interval,
        }
    }

    pub fn from_config(opener: O, sink: K, config: &Config) -> Self {
        Self::new(
            opener,
            sink,
            config.analysis.clone(),
            config.tick_interval(),
        )
    }

    /// Handle to the snapshot the analyzer publishes into
    pub fn publisher(&self) -> SharedPublisher {
        self.publisher.clone()
    }

    /// Play every track in order.
    ///
    /// Per-track failures are counted in the summary; a fatal error (output
    /// device, presenter I/O) stops playback and is returned.
    pub fn run(
        &mut self,
        playlist: &Playlist,
        presenter: &mut dyn Presenter,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let total = playlist.len();

        for (index, track) in playlist.iter().enumerate() {
            match self.play_track(index, track, total, presenter)? {
                TrackOutcome::Finished => summary.played += 1,
                TrackOutcome::Skipped => summary.skipped += 1,
                TrackOutcome::Failed => summary.failed += 1,
                TrackOutcome::Quit => {
                    summary.quit = true;
                    break;
                }
            }
        }

        if !summary.quit {
            presenter.on_event(&PlayerEvent::PlaylistFinished);
        }
        log::info!(
            "Run finished: {} played, {} skipped, {} failed",
            summary.played,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn play_track(
        &mut self,
        index: usize,
        track: &Track,
        total: usize,
        presenter: &mut dyn Presenter,
    ) -> Result<TrackOutcome> {
        log::debug!("Opening [{}/{}] {}", index + 1, total, track.path.display());

        let opened = match self.opener.open(track) {
            Ok(opened) => opened,
            Err(e) => return Self::track_failed(index, track, e, presenter),
        };

        // Neutral snapshot before the new source can publish, so the new
        // label is never shown next to the previous track's features
        self.publisher.reset();

        let mut session = PlaybackSession::new(index, track, opened.codec);
        let analyzing = AnalyzingSource::new(
            opened.source,
            self.analysis.clone(),
            self.publisher.clone(),
        );
        let done = match self.sink.play(Box::new(analyzing)) {
            Ok(done) => done,
            Err(e) => return Self::track_failed(index, track, e, presenter),
        };
        session.set_state(TrackState::Streaming);

        match &session.codec {
            Some(codec) => log::info!("Playing {} ({})", track.label, codec),
            None => log::info!("Playing {}", track.label),
        }
        presenter.on_event(&PlayerEvent::TrackStarted {
            index,
            label: track.label.clone(),
            codec: session.codec.clone(),
        });

        let ticker = tick(self.tick_interval);
        let completion = loop {
            select! {
                recv(ticker) -> _ => {
                    if session.state() != TrackState::Streaming {
                        continue;
                    }
                    let action = match presenter.present(&session.view(total, &self.publisher)) {
                        Ok(action) => action,
                        Err(e) => {
                            self.sink.stop();
                            return Err(e);
                        }
                    };
                    match action {
                        PresenterAction::Continue => {}
                        PresenterAction::SkipTrack => {
                            log::info!("Skipping {}", track.label);
                            session.set_state(TrackState::Draining);
                            self.sink.stop();
                        }
                        PresenterAction::Quit => {
                            log::info!("Quit requested during {}", track.label);
                            self.sink.stop();
                            session.set_state(TrackState::Done);
                            return Ok(TrackOutcome::Quit);
                        }
                    }
                }
                recv(done) -> msg => break msg.ok(),
            }
        };

        let skipped = session.state() == TrackState::Draining;
        session.set_state(TrackState::Done);
        Ok(Self::track_done(index, track, completion, skipped, presenter))
    }

    fn track_done(
        index: usize,
        track: &Track,
        completion: Option<Completion>,
        skipped: bool,
        presenter: &mut dyn Presenter,
    ) -> TrackOutcome {
        let error = completion.as_ref().and_then(|c| c.error.clone());
        if let Some(error) = error {
            log::warn!("Stream error in {}: {}", track.label, error);
            presenter.on_event(&PlayerEvent::TrackFailed {
                index,
                label: track.label.clone(),
                error,
            });
            return TrackOutcome::Failed;
        }

        let frames = completion.map_or(0, |c| c.frames);
        log::info!("Finished {} ({} frames)", track.label, frames);
        presenter.on_event(&PlayerEvent::TrackFinished {
            index,
            label: track.label.clone(),
            skipped,
        });
        if skipped {
            TrackOutcome::Skipped
        } else {
            TrackOutcome::Finished
        }
    }

    fn track_failed(
        index: usize,
        track: &Track,
        error: PlayerError,
        presenter: &mut dyn Presenter,
    ) -> Result<TrackOutcome> {
        if error.is_fatal() {
            return Err(error);
        }
        log::warn!("Skipping {}: {}", track.path.display(), error);
        presenter.on_event(&PlayerEvent::TrackFailed {
            index,
            label: track.label.clone(),
            error: error.to_string(),
        });
        Ok(TrackOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FeatureSnapshot;
    use crate::audio::output::HeadlessSink;
    use crate::audio::source::{BlockSource, FrameBuffer};
    use crate::audio::types::{Frame, Pull};
    use crate::player::opener::OpenedTrack;
    use std::collections::HashMap;
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(5);

    /// Opener serving in-memory tracks keyed by label
    struct MemoryOpener {
        tracks: HashMap<String, Vec<Frame>>,
        sample_rate: u32,
    }

    impl MemoryOpener {
        fn new(sample_rate: u32) -> Self {
            Self {
                tracks: HashMap::new(),
                sample_rate,
            }
        }

        fn with(mut self, label: &str, frames: Vec<Frame>) -> Self {
            self.tracks.insert(label.to_string(), frames);
            self
        }
    }

    impl TrackOpener for MemoryOpener {
        fn open(&self, track: &Track) -> Result<OpenedTrack> {
            match self.tracks.get(&track.label) {
                Some(frames) => Ok(OpenedTrack {
                    source: Box::new(FrameBuffer::new(self.sample_rate, frames.clone())),
                    codec: None,
                }),
                None => Err(PlayerError::Decode(format!("cannot decode {}", track.label))),
            }
        }
    }

    /// Opener whose sources break after a few blocks
    struct BrokenOpener;

    struct BrokenSource {
        blocks_left: usize,
    }

    impl BlockSource for BrokenSource {
        fn pull(&mut self, block: &mut [Frame]) -> Pull {
            if self.blocks_left == 0 {
                return Pull::end();
            }
            self.blocks_left -= 1;
            block.fill([0.4, 0.4]);
            Pull::more(block.len())
        }

        fn sample_rate(&self) -> u32 {
            44100
        }

        fn channels(&self) -> u16 {
            2
        }

        fn last_error(&self) -> Option<String> {
            (self.blocks_left == 0).then(|| "corrupt packet".to_string())
        }
    }

    impl TrackOpener for BrokenOpener {
        fn open(&self, _track: &Track) -> Result<OpenedTrack> {
            Ok(OpenedTrack {
                source: Box::new(BrokenSource { blocks_left: 3 }),
                codec: None,
            })
        }
    }

    /// Opener that fails fatally
    struct NoDeviceOpener;

    impl TrackOpener for NoDeviceOpener {
        fn open(&self, _track: &Track) -> Result<OpenedTrack> {
            Err(PlayerError::Audio("device vanished".to_string()))
        }
    }

    /// Presenter that records everything and follows a script of actions
    #[derive(Default)]
    struct Recorder {
        events: Vec<PlayerEvent>,
        views: Vec<(String, Arc<FeatureSnapshot>)>,
        script: Vec<(usize, PresenterAction)>,
        presents: usize,
        fail_on_present: bool,
    }

    impl Presenter for Recorder {
        fn on_event(&mut self, event: &PlayerEvent) {
            self.events.push(event.clone());
        }

        fn present(&mut self, view: &View<'_>) -> Result<PresenterAction> {
            if self.fail_on_present {
                return Err(PlayerError::Io(std::io::Error::other("terminal gone")));
            }
            self.presents += 1;
            self.views.push((view.track.to_string(), view.snapshot.clone()));
            let action = self
                .script
                .iter()
                .find(|(at, _)| *at == self.presents)
                .map_or(PresenterAction::Continue, |(_, a)| *a);
            Ok(action)
        }
    }

    fn playlist(labels: &[&str]) -> Playlist {
        Playlist::new(
            "/music",
            labels.iter().map(|l| Track::new(format!("/music/{}", l))).collect(),
        )
    }

    fn driver<O: TrackOpener>(opener: O, realtime: bool) -> PlaybackDriver<O, HeadlessSink> {
        PlaybackDriver::new(
            opener,
            HeadlessSink::new(512, realtime),
            AnalysisConfig::default(),
            TICK,
        )
    }

    fn tone(value: f32, frames: usize) -> Vec<Frame> {
        vec![[value, value]; frames]
    }

    fn started_labels(events: &[PlayerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::TrackStarted { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    // --- Sequencing ---

    #[test]
    fn plays_every_track_in_order() {
        let opener = MemoryOpener::new(44100)
            .with("a.wav", tone(0.1, 2048))
            .with("b.wav", tone(0.2, 2048));
        let mut recorder = Recorder::default();

        let summary = driver(opener, false)
            .run(&playlist(&["a.wav", "b.wav"]), &mut recorder)
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                played: 2,
                ..RunSummary::default()
            }
        );
        assert_eq!(started_labels(&recorder.events), vec!["a.wav", "b.wav"]);
        assert_eq!(recorder.events.last(), Some(&PlayerEvent::PlaylistFinished));
    }

    #[test]
    fn decode_failure_on_second_of_three_still_plays_others() {
        let opener = MemoryOpener::new(44100)
            .with("1.mp3", tone(0.1, 1024))
            .with("3.mp3", tone(0.3, 1024));
        let mut recorder = Recorder::default();

        let summary = driver(opener, false)
            .run(&playlist(&["1.mp3", "2.mp3", "3.mp3"]), &mut recorder)
            .unwrap();

        assert_eq!(summary.played, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.quit);
        assert_eq!(started_labels(&recorder.events), vec!["1.mp3", "3.mp3"]);
        assert!(recorder.events.iter().any(|e| matches!(
            e,
            PlayerEvent::TrackFailed { index: 1, label, .. } if label == "2.mp3"
        )));
    }

    #[test]
    fn mid_stream_error_counts_as_failure() {
        let mut recorder = Recorder::default();
        let summary = driver(BrokenOpener, false)
            .run(&playlist(&["x.ogg"]), &mut recorder)
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.played, 0);
        assert!(recorder.events.iter().any(|e| matches!(
            e,
            PlayerEvent::TrackFailed { error, .. } if error == "corrupt packet"
        )));
    }

    #[test]
    fn fatal_open_error_aborts_run() {
        let mut recorder = Recorder::default();
        let result =
            driver(NoDeviceOpener, false).run(&playlist(&["a.mp3", "b.mp3"]), &mut recorder);
        assert!(matches!(result, Err(PlayerError::Audio(_))));
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn empty_playlist_finishes_immediately() {
        let mut recorder = Recorder::default();
        let summary = driver(MemoryOpener::new(44100), false)
            .run(&playlist(&[]), &mut recorder)
            .unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(recorder.events, vec![PlayerEvent::PlaylistFinished]);
    }

    // --- Presenter actions ---

    #[test]
    fn skip_moves_to_next_track() {
        // 10 s of audio paced in real time; the first tick skips it
        let opener = MemoryOpener::new(8000)
            .with("long.wav", tone(0.5, 80_000))
            .with("short.wav", tone(0.5, 400));
        let mut recorder = Recorder {
            script: vec![(1, PresenterAction::SkipTrack)],
            ..Recorder::default()
        };

        let started = Instant::now();
        let summary = driver(opener, true)
            .run(&playlist(&["long.wav", "short.wav"]), &mut recorder)
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.played, 1);
        assert!(recorder.events.contains(&PlayerEvent::TrackFinished {
            index: 0,
            label: "long.wav".to_string(),
            skipped: true,
        }));
    }

    #[test]
    fn quit_ends_run_without_further_tracks() {
        let opener = MemoryOpener::new(8000)
            .with("a.wav", tone(0.5, 80_000))
            .with("b.wav", tone(0.5, 80_000));
        let mut recorder = Recorder {
            script: vec![(2, PresenterAction::Quit)],
            ..Recorder::default()
        };

        let summary = driver(opener, true)
            .run(&playlist(&["a.wav", "b.wav"]), &mut recorder)
            .unwrap();

        assert!(summary.quit);
        assert_eq!(summary.played, 0);
        assert_eq!(started_labels(&recorder.events), vec!["a.wav"]);
        assert!(!recorder.events.contains(&PlayerEvent::PlaylistFinished));
    }

    #[test]
    fn presenter_error_is_fatal() {
        let opener = MemoryOpener::new(8000).with("a.wav", tone(0.5, 80_000));
        let mut recorder = Recorder {
            fail_on_present: true,
            ..Recorder::default()
        };

        let result = driver(opener, true).run(&playlist(&["a.wav"]), &mut recorder);
        assert!(matches!(result, Err(PlayerError::Io(_))));
    }

    // --- Snapshot and label ---

    #[test]
    fn views_carry_live_snapshot() {
        // 1 s of a constant 0.5 signal at 8 kHz, paced in real time
        let opener = MemoryOpener::new(8000).with("half.wav", tone(0.5, 8000));
        let mut recorder = Recorder::default();

        driver(opener, true)
            .run(&playlist(&["half.wav"]), &mut recorder)
            .unwrap();

        let analyzed: Vec<_> = recorder.views.iter().filter(|(_, s)| !s.is_empty()).collect();
        assert!(!analyzed.is_empty());
        for (label, snap) in analyzed {
            assert_eq!(label, "half.wav");
            assert!((snap.rms - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn label_never_paired_with_previous_track_snapshot() {
        let opener = MemoryOpener::new(8000)
            .with("loud.wav", tone(0.9, 2000))
            .with("quiet.wav", tone(0.1, 2000));
        let mut recorder = Recorder::default();

        driver(opener, true)
            .run(&playlist(&["loud.wav", "quiet.wav"]), &mut recorder)
            .unwrap();

        for (label, snap) in &recorder.views {
            if snap.is_empty() {
                continue;
            }
            let expected = if label == "loud.wav" { 0.9 } else { 0.1 };
            assert!(
                (snap.rms - expected).abs() < 1e-6,
                "{} shown with rms {}",
                label,
                snap.rms
            );
        }
    }

    #[test]
    fn publisher_reset_between_tracks() {
        let opener = MemoryOpener::new(44100).with("a.wav", tone(0.7, 1024));
        let mut driver = driver(opener, false);
        let publisher = driver.publisher();

        driver
            .run(&playlist(&["a.wav"]), &mut Recorder::default())
            .unwrap();
        assert_eq!(publisher.read().sequence, 2);

        // A failing track leaves the last snapshot alone
        driver
            .run(&playlist(&["missing.wav"]), &mut Recorder::default())
            .unwrap();
        assert_eq!(publisher.read().sequence, 2);
    }
}
