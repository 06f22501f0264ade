use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bgmbox", about = "Homepage-style BGM player with a live spectrum visualizer")]
pub struct Cli {
    /// Audio files to play, in order (WAV, MP3, FLAC, OGG)
    pub tracks: Vec<PathBuf>,

    /// JSON playlist: [{"title", "artist", "source"}]
    #[arg(short, long)]
    pub playlist: Option<PathBuf>,

    /// Config file (defaults to bgmbox.toml or ~/.config/bgmbox/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Visualizer surface width in pixels
    #[arg(long, default_value_t = 110, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub width: u32,

    /// Visualizer surface height in pixels
    #[arg(long, default_value_t = 28, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub height: u32,

    /// Frames per second of the render loop
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Do not attempt playback at startup
    #[arg(long)]
    pub no_autoplay: bool,

    /// Output volume (0.0-1.0)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Run without the terminal UI
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    /// Record the visualizer to a video file through ffmpeg
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Log file used while the terminal UI owns the screen
    #[arg(long, default_value = "bgmbox.log")]
    pub log_file: PathBuf,
}
