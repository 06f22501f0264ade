use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::playlist::Track;
use crate::render::surface::MAX_DIMENSION;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub visualizer: VisualizerConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VisualizerConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,
    /// RGBA
    #[serde(default = "default_bar_color")]
    pub bar_color: [u8; 4],
    #[serde(default = "default_glow_color")]
    pub glow_color: [u8; 4],
    #[serde(default = "default_glow_radius")]
    pub glow_radius: u32,
    /// Backdrop the transparent surface is composited over when presented.
    #[serde(default = "default_background")]
    pub background: [u8; 3],
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyserConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerConfig {
    /// Attempt playback of the first track at startup.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            bar_count: default_bar_count(),
            bar_color: default_bar_color(),
            glow_color: default_glow_color(),
            glow_radius: default_glow_radius(),
            background: default_background(),
        }
    }
}

impl VisualizerConfig {
    /// Clamp size and rate into what the renderer accepts.
    pub fn bounded(mut self) -> Self {
        self.width = self.width.clamp(1, MAX_DIMENSION);
        self.height = self.height.clamp(1, MAX_DIMENSION);
        self.fps = self.fps.max(1);
        self
    }
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: default_autoplay(),
            volume: default_volume(),
        }
    }
}

fn default_width() -> u32 { 110 }
fn default_height() -> u32 { 28 }
fn default_fps() -> u32 { 60 }
fn default_bar_count() -> usize { 12 }
fn default_bar_color() -> [u8; 4] { [255, 90, 160, 230] }
fn default_glow_color() -> [u8; 4] { [255, 140, 200, 255] }
fn default_glow_radius() -> u32 { 6 }
fn default_background() -> [u8; 3] { [253, 226, 238] }
fn default_fft_size() -> usize { 128 }
fn default_smoothing() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_autoplay() -> bool { true }
fn default_volume() -> f32 { 1.0 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, else `bgmbox.toml` in the working directory, else the
/// per-user config locations.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("bgmbox.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("bgmbox").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("bgmbox").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
