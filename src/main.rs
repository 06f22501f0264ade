mod app;
mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod player;
mod playlist;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;

use cli::Cli;
use config::{Config, VisualizerConfig};

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger.format_timestamp_millis();
    if !cli.headless {
        // The terminal UI owns stdout/stderr while it runs
        let log_file = File::create(&cli.log_file)
            .with_context(|| format!("Failed to create log file {}", cli.log_file.display()))?;
        logger.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    logger.init();

    // Load config: explicit --config path, or auto-detect bgmbox.toml / global config
    let mut cfg = Config::default();
    if let Some(ref path) = config::discover(cli.config.as_deref()) {
        if let Some(loaded) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Merge: config values apply only when CLI is at its default
    if cli.width == 110 { cli.width = cfg.visualizer.width; }
    if cli.height == 28 { cli.height = cfg.visualizer.height; }
    if cli.fps == 60 { cli.fps = cfg.visualizer.fps; }
    if cli.volume == 1.0 { cli.volume = cfg.player.volume; }
    let autoplay = !cli.no_autoplay && cfg.player.autoplay;

    let visualizer = VisualizerConfig {
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        ..cfg.visualizer
    }
    .bounded();

    let playlist = playlist::resolve(&cli.tracks, cli.playlist.as_deref(), cfg.tracks)
        .context("No tracks to play: pass audio files, --playlist, or [[tracks]] in the config")?;

    log::info!("bgmbox - homepage BGM player");
    log::info!("Surface: {}x{} @ {}fps", visualizer.width, visualizer.height, visualizer.fps);

    app::run(
        playlist,
        app::SessionOptions {
            visualizer,
            analyser: cfg.analyser,
            autoplay,
            volume: cli.volume.clamp(0.0, 1.0),
            headless: cli.headless,
            frame_limit: cli.frames,
            record: cli.record,
        },
    )
}
