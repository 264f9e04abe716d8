//! Earshot CLI: terminal music player with live analysis

mod plain;
mod tui;

use std::io;
use std::path::PathBuf;

use clap::Parser;

use earshot::audio::{DeviceSink, HeadlessSink, PlaybackSink};
use earshot::config::Config;
use earshot::error::PlayerError;
use earshot::player::{discover, FileOpener, PlaybackDriver, Playlist, RunSummary};

use plain::PlainPresenter;
use tui::{StderrRedirect, TuiPresenter};

#[derive(Parser)]
#[command(
    name = "earshot",
    about = "Terminal music player with live amplitude and spectrum display",
    version
)]
struct Cli {
    /// Directory to scan for music (default: ./music)
    dir: Option<PathBuf>,

    /// Config file (default: ./earshot.toml, then the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of spectrum bands
    #[arg(long)]
    bands: Option<usize>,

    /// Display refresh interval in milliseconds
    #[arg(long = "tick-ms")]
    tick_ms: Option<u64>,

    /// Frames per analysis block
    #[arg(long)]
    block: Option<usize>,

    /// Print a plain text readout instead of the full-screen display
    #[arg(long)]
    plain: bool,

    /// Analyze at playback speed without opening an audio device
    #[arg(long)]
    no_audio: bool,

    /// Send log output to this file while the display is active
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Resolve the config file and apply command-line overrides
    fn load_config(&self) -> earshot::error::Result<Config> {
        let path = self.config.clone().or_else(Config::locate);
        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Config::load(&path)?
            }
            None => Config::default(),
        };

        if let Some(ref dir) = self.dir {
            config.music_dir = dir.clone();
        }
        if let Some(bands) = self.bands {
            config.analysis.bands = bands;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
        if let Some(block) = self.block {
            config.block_frames = block;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Setup errors are reported before the display takes over the terminal
    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let playlist = match discover(&config.music_dir, &config.extensions) {
        Ok(p) if p.is_empty() => {
            eprintln!("Error: {}", PlayerError::EmptyPlaylist(config.music_dir.clone()));
            std::process::exit(1);
        }
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let summary = if cli.no_audio {
        let sink = HeadlessSink::new(config.block_frames, true);
        play(&cli, &config, &playlist, sink)?
    } else {
        let sink = match DeviceSink::open(config.block_frames) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        play(&cli, &config, &playlist, sink)?
    };

    println!(
        "Played {} of {} tracks ({} skipped, {} failed){}",
        summary.played,
        playlist.len(),
        summary.skipped,
        summary.failed,
        if summary.quit { ", stopped early" } else { "" }
    );
    Ok(())
}

fn play<K: PlaybackSink>(
    cli: &Cli,
    config: &Config,
    playlist: &Playlist,
    sink: K,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let opener = FileOpener::new(config.default_sample_rate);
    let mut driver = PlaybackDriver::from_config(opener, sink, config);

    if cli.plain {
        let mut presenter = PlainPresenter::new(io::stdout());
        return Ok(driver.run(playlist, &mut presenter)?);
    }

    // Audio backends and the logger write to stderr, which would corrupt
    // the display; send it to /dev/null or the log file instead.
    let _stderr = StderrRedirect::to(cli.log_file.as_deref())?;
    let mut presenter = TuiPresenter::enter()?;
    let result = driver.run(playlist, &mut presenter);

    // Drop the sink while stderr is still redirected
    drop(driver);
    presenter.restore()?;

    Ok(result?)
}
