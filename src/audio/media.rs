use crate::audio::analysis::AnalyserTap;
use crate::error::AudioError;
use crate::playlist::Track;

/// Run state of the audio-processing context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
}

/// The audio-processing context: owns the output device.
pub trait AudioHost {
    fn state(&self) -> ContextState;
    fn resume(&mut self) -> Result<(), AudioError>;
    fn sample_rate(&self) -> u32;
}

/// Timing and completion notifications from a media element.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    TimeUpdate { current_time: f64, duration: Option<f64> },
    Ended,
    /// A requested play could not start because the source failed to load.
    Error(AudioError),
}

/// A playable element holding one loaded track at a time.
pub trait MediaElement {
    /// Replace the current source and return immediately. Playback stops;
    /// a later `play` starts the new source from the beginning.
    fn load(&mut self, track: &Track);
    /// Start playback. While a load is still in flight the request is
    /// remembered and honoured once the source is ready.
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    fn current_time(&self) -> f64;
    /// `None` until a source with a known length is loaded.
    fn duration(&self) -> Option<f64>;
    fn poll_event(&mut self) -> Option<MediaEvent>;
    /// Route this element's output through `tap`. Valid once per element;
    /// a second call fails with `GraphAlreadyBuilt`.
    fn connect_source(&mut self, tap: AnalyserTap) -> Result<(), AudioError>;
}
