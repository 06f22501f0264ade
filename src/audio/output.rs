use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::analysis::AnalyserTap;
use crate::audio::decode::{self, AudioData};
use crate::audio::media::{AudioHost, ContextState, MediaElement, MediaEvent};
use crate::error::AudioError;
use crate::playlist::Track;

const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Playhead shared between the UI thread and the device callback.
struct Playhead {
    audio: Option<Arc<AudioData>>,
    /// Position in source samples; fractional when resampling.
    cursor: f64,
    playing: bool,
    muted: bool,
    volume: f32,
    ended: bool,
    /// Device rate; 0 until an output context attaches.
    output_rate: u32,
    tap: Option<AnalyserTap>,
}

impl Playhead {
    fn next_sample(&mut self) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let Some(audio) = self.audio.as_ref() else {
            return 0.0;
        };

        let samples = &audio.samples;
        let idx = self.cursor as usize;
        if idx >= samples.len() {
            self.playing = false;
            self.ended = true;
            return 0.0;
        }

        // Linear interpolation between neighbouring source samples
        let a = samples[idx];
        let b = samples.get(idx + 1).copied().unwrap_or(a);
        let frac = (self.cursor - idx as f64) as f32;

        let step = if self.output_rate == 0 {
            1.0
        } else {
            audio.sample_rate as f64 / self.output_rate as f64
        };
        self.cursor += step;

        a + (b - a) * frac
    }

    fn current_time(&self) -> f64 {
        match &self.audio {
            Some(audio) if audio.sample_rate > 0 => {
                (self.cursor / audio.sample_rate as f64).min(audio.duration())
            }
            _ => 0.0,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.audio.as_ref().map(|a| a.duration()).filter(|d| *d > 0.0)
    }
}

/// Fill one device buffer from the playhead and feed the analyser tap.
fn render_into<T>(shared: &Mutex<Playhead>, data: &mut [T], channels: usize, tap_buf: &mut Vec<f32>)
where
    T: SizedSample + FromSample<f32>,
{
    let channels = channels.max(1);
    tap_buf.clear();

    let tap = {
        let Ok(mut head) = shared.lock() else {
            for out in data.iter_mut() {
                *out = T::from_sample(0.0);
            }
            return;
        };
        let gain = if head.muted { 0.0 } else { head.volume };
        for frame in data.chunks_mut(channels) {
            let value = head.next_sample() * gain;
            for out in frame.iter_mut() {
                *out = T::from_sample(value);
            }
            tap_buf.push(value);
        }
        head.tap.clone()
    };

    if let Some(tap) = tap {
        tap.push(tap_buf);
    }
}

type LoadResult = Result<AudioData, String>;

/// Media element backed by fully decoded PCM, played through an
/// [`OutputContext`]. Fetching and decoding run on a worker thread.
pub struct StreamMedia {
    shared: Arc<Mutex<Playhead>>,
    /// In-flight load; replacing it abandons the previous worker's result.
    pending: Option<Receiver<LoadResult>>,
    play_requested: bool,
    load_error: Option<String>,
    last_update: Option<Instant>,
}

impl StreamMedia {
    pub fn new(volume: f32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Playhead {
                audio: None,
                cursor: 0.0,
                playing: false,
                muted: false,
                volume: volume.clamp(0.0, 1.0),
                ended: false,
                output_rate: 0,
                tap: None,
            })),
            pending: None,
            play_requested: false,
            load_error: None,
            last_update: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn with_head<R>(&self, f: impl FnOnce(&mut Playhead) -> R) -> Option<R> {
        self.shared.lock().ok().map(|mut head| f(&mut head))
    }

    fn set_audio(&mut self, audio: Option<AudioData>) {
        let audio = audio.map(Arc::new);
        self.with_head(|head| {
            head.audio = audio;
            head.cursor = 0.0;
            head.playing = false;
            head.ended = false;
        });
        self.last_update = None;
    }

    fn attach_output(&self, sample_rate: u32) {
        self.with_head(|head| head.output_rate = sample_rate);
    }

    /// Apply a finished load, if any. Yields an error event only when a
    /// play request was waiting on a load that failed.
    fn poll_load(&mut self) -> Option<MediaEvent> {
        let result = match self.pending.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err("decoder thread exited".to_string()),
        };
        self.pending = None;
        let play = std::mem::take(&mut self.play_requested);

        match result {
            Ok(audio) => {
                self.load_error = None;
                self.set_audio(Some(audio));
                if play {
                    self.with_head(|head| head.playing = true);
                }
                None
            }
            Err(message) => {
                log::warn!("Could not load track: {}", message);
                self.load_error = Some(message.clone());
                play.then(|| MediaEvent::Error(AudioError::PlaybackRejected(message)))
            }
        }
    }
}

impl MediaElement for StreamMedia {
    fn load(&mut self, track: &Track) {
        self.pause();
        self.set_audio(None);
        self.load_error = None;

        let (tx, rx) = mpsc::channel();
        let source = track.source.clone();
        let spawned = thread::Builder::new()
            .name("bgmbox-decode".into())
            .spawn(move || {
                let result = decode::decode_source(&source).map_err(|err| format!("{:#}", err));
                // Receiver is gone when another track was loaded meanwhile
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => {
                log::debug!("Loading '{}' in the background", track.title);
                self.pending = Some(rx);
            }
            Err(err) => {
                log::warn!("Could not start decoder for '{}': {}", track.title, err);
                self.pending = None;
                self.load_error = Some(err.to_string());
            }
        }
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.is_loading() {
            if self.with_head(|head| head.output_rate).unwrap_or(0) == 0 {
                return Err(AudioError::PlaybackRejected("no audio output attached".into()));
            }
            self.play_requested = true;
            return Ok(());
        }
        let load_error = self.load_error.clone();
        let result = self.with_head(|head| {
            if head.output_rate == 0 {
                return Err(AudioError::PlaybackRejected("no audio output attached".into()));
            }
            let Some(audio) = head.audio.as_ref() else {
                return Err(AudioError::PlaybackRejected(
                    load_error.unwrap_or_else(|| "no source loaded".into()),
                ));
            };
            if head.cursor as usize >= audio.samples.len() {
                head.cursor = 0.0;
            }
            head.playing = true;
            head.ended = false;
            Ok(())
        });
        result.unwrap_or_else(|| Err(AudioError::PlaybackRejected("playhead poisoned".into())))
    }

    fn pause(&mut self) {
        self.play_requested = false;
        self.with_head(|head| head.playing = false);
    }

    fn set_muted(&mut self, muted: bool) {
        self.with_head(|head| head.muted = muted);
    }

    fn is_muted(&self) -> bool {
        self.with_head(|head| head.muted).unwrap_or(false)
    }

    fn current_time(&self) -> f64 {
        self.with_head(|head| head.current_time()).unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.with_head(|head| head.duration()).flatten()
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if let Some(event) = self.poll_load() {
            return Some(event);
        }
        let (ended, playing, current_time, duration) = self.with_head(|head| {
            let ended = std::mem::take(&mut head.ended);
            (ended, head.playing, head.current_time(), head.duration())
        })?;

        if ended {
            self.last_update = None;
            return Some(MediaEvent::Ended);
        }
        if !playing {
            return None;
        }

        let due = self
            .last_update
            .map_or(true, |at| at.elapsed() >= TIME_UPDATE_INTERVAL);
        if !due {
            return None;
        }
        self.last_update = Some(Instant::now());
        Some(MediaEvent::TimeUpdate { current_time, duration })
    }

    fn connect_source(&mut self, tap: AnalyserTap) -> Result<(), AudioError> {
        self.with_head(|head| {
            if head.tap.is_some() {
                return Err(AudioError::GraphAlreadyBuilt);
            }
            head.tap = Some(tap);
            Ok(())
        })
        .unwrap_or_else(|| Err(AudioError::PlaybackRejected("playhead poisoned".into())))
    }
}

/// The native audio-processing context: the default output device
/// streaming whatever the attached [`StreamMedia`] produces.
pub struct OutputContext {
    stream: cpal::Stream,
    state: ContextState,
    sample_rate: u32,
}

impl OutputContext {
    pub fn new(media: &StreamMedia) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::UnsupportedEnvironment("no default output device".into()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::UnsupportedEnvironment(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let sample_rate = config.sample_rate;

        let shared = media.shared.clone();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, shared),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, shared),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, shared),
            other => {
                return Err(AudioError::UnsupportedEnvironment(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| AudioError::UnsupportedEnvironment(e.to_string()))?;

        media.attach_output(sample_rate);

        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown device".into());
        log::info!(
            "Audio output: {} ({} Hz, {} channels, {:?})",
            name,
            sample_rate,
            config.channels,
            sample_format
        );

        let mut context = Self {
            stream,
            state: ContextState::Suspended,
            sample_rate,
        };
        if let Err(err) = context.resume() {
            log::warn!("Audio context starts suspended: {}", err);
        }
        Ok(context)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Mutex<Playhead>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut tap_buf = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            render_into(&shared, data, channels, &mut tap_buf);
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )
}

impl AudioHost for OutputContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.state == ContextState::Running {
            return Ok(());
        }
        self.stream
            .play()
            .map_err(|e| AudioError::PlaybackRejected(e.to_string()))?;
        self.state = ContextState::Running;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
