use crate::audio::graph::AudioGraph;
use crate::audio::media::{AudioHost, ContextState, MediaElement, MediaEvent};
use crate::error::AudioError;
use crate::playlist::{Playlist, Track};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Paused,
    Playing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub play_state: PlayState,
    /// Always within `[0, 100]`.
    pub progress_percent: f32,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_index: 0,
            play_state: PlayState::Paused,
            progress_percent: 0.0,
        }
    }
}

/// Icon the play/pause button should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayIcon {
    Play,
    Pause,
}

impl PlayIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            PlayIcon::Play => "▶",
            PlayIcon::Pause => "⏸",
        }
    }
}

/// Signals for whatever UI surrounds the player.
#[derive(Clone, Debug, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub icon: PlayIcon,
    pub progress_percent: f32,
}

/// Sole owner of playback state. Every transition goes through here.
pub struct PlaybackController<M: MediaElement, H: AudioHost> {
    playlist: Playlist,
    media: M,
    context: Option<H>,
    state: PlaybackState,
    last_error: Option<AudioError>,
}

impl<M: MediaElement, H: AudioHost> PlaybackController<M, H> {
    /// `context` is `None` when the host has no audio output; the
    /// controller then stays paused and only tracks the playlist.
    pub fn new(playlist: Playlist, media: M, context: Option<H>) -> Self {
        Self {
            playlist,
            media,
            context,
            state: PlaybackState::default(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_track(&self) -> &Track {
        self.playlist.track(self.state.current_index)
    }

    pub fn context(&self) -> Option<&H> {
        self.context.as_ref()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Most recent play/resume failure, cleared by the next successful play.
    pub fn last_error(&self) -> Option<&AudioError> {
        self.last_error.as_ref()
    }

    pub fn now_playing(&self) -> NowPlaying {
        let track = self.current_track();
        NowPlaying {
            title: track.title.clone(),
            artist: track.artist.clone(),
            icon: if self.state.is_playing() {
                PlayIcon::Pause
            } else {
                PlayIcon::Play
            },
            progress_percent: self.state.progress_percent,
        }
    }

    /// First track-bearing render: load the current track, tap it into the
    /// graph and optionally attempt autoplay.
    pub fn start(&mut self, graph: Option<&mut AudioGraph>, autoplay: bool) {
        self.load_current(graph);
        if autoplay {
            self.autoplay();
        }
    }

    pub fn toggle(&mut self) -> PlayState {
        match self.state.play_state {
            PlayState::Playing => {
                self.media.pause();
                self.state.play_state = PlayState::Paused;
            }
            PlayState::Paused => match self.context.as_mut() {
                None => {
                    log::warn!("No audio output; play request ignored");
                    self.last_error = Some(AudioError::UnsupportedEnvironment(
                        "no audio output".into(),
                    ));
                }
                Some(context) => match start_playback(context, &mut self.media) {
                    Ok(()) => {
                        self.state.play_state = PlayState::Playing;
                        self.last_error = None;
                    }
                    Err(err) => {
                        log::warn!("Playback failed: {}", err);
                        self.last_error = Some(err);
                    }
                },
            },
        }
        self.state.play_state
    }

    /// Advance to the following track, wrapping, and attempt autoplay.
    pub fn next(&mut self, graph: Option<&mut AudioGraph>) -> PlayState {
        self.state.current_index = self.playlist.next_index(self.state.current_index);
        self.load_current(graph);
        self.autoplay();
        self.state.play_state
    }

    pub fn on_time_update(&mut self, current_time: f64, duration: Option<f64>) {
        let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            return;
        };
        if !current_time.is_finite() {
            return;
        }
        self.state.progress_percent = (current_time / duration * 100.0).clamp(0.0, 100.0) as f32;
    }

    pub fn on_ended(&mut self, graph: Option<&mut AudioGraph>) {
        log::debug!("Track ended: {}", self.current_track().title);
        self.next(graph);
    }

    /// Drain and apply every pending media event.
    pub fn pump_events(&mut self, mut graph: Option<&mut AudioGraph>) {
        while let Some(event) = self.media.poll_event() {
            match event {
                MediaEvent::TimeUpdate {
                    current_time,
                    duration,
                } => self.on_time_update(current_time, duration),
                MediaEvent::Ended => self.on_ended(graph.as_deref_mut()),
                MediaEvent::Error(err) => self.on_media_error(err),
            }
        }
    }

    /// A play request was dropped by the media element (the track never
    /// loaded). The player falls back to paused and shows why.
    pub fn on_media_error(&mut self, err: AudioError) {
        log::warn!("Playback of '{}' failed: {}", self.current_track().title, err);
        self.state.play_state = PlayState::Paused;
        self.last_error = Some(err);
    }

    fn load_current(&mut self, graph: Option<&mut AudioGraph>) {
        let track = self.current_track().clone();
        log::info!(
            "Track [{}/{}]: {} - {}",
            self.state.current_index + 1,
            self.playlist.len(),
            track.title,
            track.artist
        );
        self.media.load(&track);
        self.state.progress_percent = 0.0;

        if let Some(graph) = graph {
            if let Err(err) = graph.connect(&mut self.media) {
                log::warn!("Could not connect analyser: {}", err);
            }
        }
    }

    /// Muted start satisfies autoplay restrictions; unmute once running.
    /// Failure leaves the player paused and is not reported further.
    fn autoplay(&mut self) {
        let Some(context) = self.context.as_mut() else {
            self.state.play_state = PlayState::Paused;
            return;
        };

        let was_muted = self.media.is_muted();
        self.media.set_muted(true);
        let result = start_playback(context, &mut self.media);
        self.media.set_muted(was_muted);

        match result {
            Ok(()) => {
                self.state.play_state = PlayState::Playing;
                self.last_error = None;
            }
            Err(err) => {
                log::debug!("Autoplay blocked: {}", err);
                self.state.play_state = PlayState::Paused;
            }
        }
    }
}

fn start_playback<H: AudioHost, M: MediaElement>(context: &mut H, media: &mut M) -> Result<(), AudioError> {
    if context.state() == ContextState::Suspended {
        context.resume()?;
    }
    media.play()
}
