//! Full-screen display
//!
//! Draws the current track, an RMS gauge, the dominant frequency and the
//! band spectrum with ratatui, and turns key presses into driver actions.

use std::fs::{File, OpenOptions};
use std::io::{self, Stdout};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;

use earshot::error::Result;
use earshot::player::{PlayerEvent, Presenter, PresenterAction, View};

/// Points stderr somewhere else until dropped
pub struct StderrRedirect {
    saved: i32,
}

impl StderrRedirect {
    /// Redirect to `log_file` (appending), or to `/dev/null` when `None`
    pub fn to(log_file: Option<&Path>) -> io::Result<Self> {
        let target: File = match log_file {
            Some(path) => OpenOptions::new().create(true).append(true).open(path)?,
            None => OpenOptions::new().write(true).open("/dev/null")?,
        };
        let saved = unsafe { libc::dup(2) };
        unsafe { libc::dup2(target.as_raw_fd(), 2) };
        Ok(Self { saved })
    }
}

impl Drop for StderrRedirect {
    fn drop(&mut self) {
        if self.saved >= 0 {
            unsafe {
                libc::dup2(self.saved, 2);
                libc::close(self.saved);
            }
        }
    }
}

/// What the display remembers between ticks
#[derive(Default)]
struct Screen {
    status: String,
    last_failure: Option<String>,
    played: usize,
    failed: usize,
}

impl Screen {
    fn apply(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::TrackStarted { label, .. } => {
                self.status = format!("Playing {}", label);
            }
            PlayerEvent::TrackFinished { skipped, .. } => {
                self.played += 1;
                if *skipped {
                    self.status = "Skipped".to_string();
                }
            }
            PlayerEvent::TrackFailed { label, error, .. } => {
                self.failed += 1;
                self.last_failure = Some(format!("{}: {}", label, error));
            }
            PlayerEvent::PlaylistFinished => {
                self.status = "Playlist finished".to_string();
            }
        }
    }
}

pub struct TuiPresenter {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    screen: Screen,
    active: bool,
}

impl TuiPresenter {
    /// Switch the terminal to raw mode and the alternate screen
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            screen: Screen::default(),
            active: true,
        })
    }

    /// Give the terminal back; safe to call more than once
    pub fn restore(&mut self) -> io::Result<()> {
        if self.active {
            self.active = false;
            terminal::disable_raw_mode()?;
            io::stdout().execute(LeaveAlternateScreen)?;
        }
        Ok(())
    }

    /// Drain pending key presses without blocking
    fn poll_keys(&self) -> io::Result<PresenterAction> {
        let mut action = PresenterAction::Continue;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(PresenterAction::Quit),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(PresenterAction::Quit);
                    }
                    KeyCode::Char('n') => action = PresenterAction::SkipTrack,
                    _ => {}
                }
            }
        }
        Ok(action)
    }
}

impl Drop for TuiPresenter {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

impl Presenter for TuiPresenter {
    fn on_event(&mut self, event: &PlayerEvent) {
        self.screen.apply(event);
    }

    fn present(&mut self, view: &View<'_>) -> Result<PresenterAction> {
        let screen = &self.screen;
        self.terminal.draw(|f| draw_ui(f, screen, view))?;
        Ok(self.poll_keys()?)
    }
}

fn draw_ui(f: &mut Frame, screen: &Screen, view: &View<'_>) {
    let area = f.area();

    let outer = Block::default()
        .title(format!(" Earshot v{} ", env!("CARGO_PKG_VERSION")))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::vertical([
        Constraint::Length(3), // track info
        Constraint::Length(3), // RMS gauge
        Constraint::Min(6),    // spectrum
        Constraint::Length(1), // status
        Constraint::Length(1), // help bar
    ])
    .split(inner);

    draw_track(f, view, chunks[0]);
    draw_level(f, view, chunks[1]);
    draw_spectrum(f, view, chunks[2]);
    draw_status(f, screen, chunks[3]);
    draw_help(f, chunks[4]);
}

fn draw_track(f: &mut Frame, view: &View<'_>, area: Rect) {
    let codec = view
        .codec
        .map(|c| c.to_string())
        .unwrap_or_else(|| "---".to_string());
    let max_label = area.width.saturating_sub(20) as usize;
    let text = vec![
        Line::from(vec![
            Span::styled("  Track: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                truncate_str(view.track, max_label),
                Style::default().fg(Color::White).bold(),
            ),
            Span::styled(
                format!("  [{}/{}]", view.position + 1, view.total),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::styled("  Codec: ", Style::default().fg(Color::DarkGray)),
            Span::styled(codec, Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Elapsed: ", Style::default().fg(Color::DarkGray)),
            Span::styled(format_elapsed(view.elapsed), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("State: ", Style::default().fg(Color::DarkGray)),
            Span::styled(view.state.to_string(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("  Dominant: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:.2} Hz", view.snapshot.dominant_hz),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(text), area);
}

fn draw_level(f: &mut Frame, view: &View<'_>, area: Rect) {
    let rms = view.snapshot.rms;
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(" RMS ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(rms.clamp(0.0, 1.0) as f64)
        .label(format!("{:.4}", rms));
    f.render_widget(gauge, area);
}

fn draw_spectrum(f: &mut Frame, view: &View<'_>, area: Rect) {
    let block = Block::default()
        .title(" Spectrum ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    let values = spectrum_values(&view.snapshot.bands);
    let bars: Vec<Bar> = values
        .iter()
        .map(|&v| Bar::default().value(v).text_value(String::new()))
        .collect();
    let count = values.len().max(1) as u16;
    let bar_width = (area.width.saturating_sub(2) / count).saturating_sub(1).max(1);

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn draw_status(f: &mut Frame, screen: &Screen, area: Rect) {
    let mut spans = vec![
        Span::styled("  ", Style::default()),
        Span::styled(&screen.status, Style::default().fg(Color::Green)),
        Span::raw(format!("  played {}  failed {}", screen.played, screen.failed)),
    ];
    if let Some(ref failure) = screen.last_failure {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Skipped {}", failure),
            Style::default().fg(Color::Red),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Line::from(vec![
        Span::styled("  'q' ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  |  "),
        Span::styled("'n' ", Style::default().fg(Color::Yellow)),
        Span::raw("next track"),
    ]);
    f.render_widget(Paragraph::new(help).alignment(Alignment::Left), area);
}

/// Band magnitudes scaled to integers for the bar chart (which auto-scales)
fn spectrum_values(bands: &[f32]) -> Vec<u64> {
    bands
        .iter()
        .map(|&b| (b.max(0.0) * 1000.0).round() as u64)
        .collect()
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max > 3 {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.chars().take(max).collect()
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
