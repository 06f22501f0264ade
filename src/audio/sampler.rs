use crate::audio::graph::AudioGraph;

/// Byte magnitudes for one animation frame, one per analyser bin.
pub type FrequencySample = [u8];

/// Pulls the analyser's current spectrum into a reusable buffer once per
/// frame.
#[derive(Default)]
pub struct FrequencySampler {
    buffer: Vec<u8>,
}

impl FrequencySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refill the buffer from `graph`. Without a graph the tick does
    /// nothing and returns `None`.
    pub fn tick(&mut self, graph: Option<&mut AudioGraph>) -> Option<&FrequencySample> {
        let graph = graph?;
        let analyser = graph.analyser_mut();
        let bins = analyser.frequency_bin_count();
        if self.buffer.len() != bins {
            self.buffer.resize(bins, 0);
        }
        analyser.get_byte_frequency_data(&mut self.buffer);
        Some(&self.buffer)
    }
}
