//! Plain text readout
//!
//! Clears the screen and prints RMS, dominant frequency and a fixed-width
//! amplitude bar on every tick.

use std::io::Write;

use earshot::error::Result;
use earshot::player::{PlayerEvent, Presenter, PresenterAction, View};

const BAR_WIDTH: usize = 50;

pub struct PlainPresenter<W> {
    out: W,
}

impl<W: Write> PlainPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

/// `=` for each fiftieth of full scale, padded with spaces
pub fn amplitude_bar(rms: f32) -> String {
    let len = ((rms.max(0.0) * BAR_WIDTH as f32) as usize).min(BAR_WIDTH);
    format!("[{}{}]", "=".repeat(len), " ".repeat(BAR_WIDTH - len))
}

pub fn render(view: &View<'_>) -> String {
    format!(
        "Playing: {} ({}/{})\nRMS Amplitude: {:.4}\nDominant Frequency: {:.2} Hz\nAmplitude: {}\n",
        view.track,
        view.position + 1,
        view.total,
        view.snapshot.rms,
        view.snapshot.dominant_hz,
        amplitude_bar(view.snapshot.rms)
    )
}

impl<W: Write> Presenter for PlainPresenter<W> {
    fn on_event(&mut self, event: &PlayerEvent) {
        let line = match event {
            PlayerEvent::TrackStarted { label, .. } => format!("\nPlaying: {}", label),
            PlayerEvent::TrackFailed { label, error, .. } => {
                format!("Error playing {}: {}", label, error)
            }
            PlayerEvent::TrackFinished { .. } => return,
            PlayerEvent::PlaylistFinished => "Playlist finished".to_string(),
        };
        let _ = writeln!(self.out, "{}", line);
    }

    fn present(&mut self, view: &View<'_>) -> Result<PresenterAction> {
        write!(self.out, "\x1b[H\x1b[2J{}", render(view))?;
        self.out.flush()?;
        Ok(PresenterAction::Continue)
    }
}
