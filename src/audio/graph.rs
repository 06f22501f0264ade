use crate::audio::analysis::Analyser;
use crate::audio::media::{AudioHost, MediaElement};
use crate::config::AnalyserConfig;
use crate::error::AudioError;

/// The session's single analysis graph: media source → analyser → output.
///
/// Created once by the session host and lent to the controller (for the
/// one-time connect) and to the sampler (every frame). The source tap is
/// created at most once; later track changes reuse it.
pub struct AudioGraph {
    analyser: Analyser,
    connected: bool,
}

impl AudioGraph {
    pub fn new(host: &dyn AudioHost, config: &AnalyserConfig) -> Result<Self, AudioError> {
        let analyser = Analyser::new(config)?;
        log::info!(
            "Analyser: fft_size={}, {} bins of {:.1} Hz",
            analyser.fft_size(),
            analyser.frequency_bin_count(),
            host.sample_rate() as f32 / analyser.fft_size() as f32
        );
        Ok(Self {
            analyser,
            connected: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Tap `media` into the analyser unless that already happened.
    /// Returns `true` when this call made the connection.
    pub fn connect<M: MediaElement + ?Sized>(&mut self, media: &mut M) -> Result<bool, AudioError> {
        if self.connected {
            return Ok(false);
        }
        media.connect_source(self.analyser.tap())?;
        self.connected = true;
        log::debug!("Media source connected to analyser");
        Ok(true)
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    pub fn analyser_mut(&mut self) -> &mut Analyser {
        &mut self.analyser
    }
}
