use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::AnalyserConfig;
use crate::error::AudioError;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Time-domain ring shared between the audio callback (writer) and the
/// analyser (reader). Holds the most recent `capacity` samples.
#[derive(Clone)]
pub struct AnalyserTap {
    ring: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl AnalyserTap {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(VecDeque::from(vec![0.0; capacity]))),
            capacity,
        }
    }

    /// Called from the audio thread with the samples just sent to output.
    pub fn push(&self, samples: &[f32]) {
        let Ok(mut ring) = self.ring.lock() else {
            return;
        };
        let skip = samples.len().saturating_sub(self.capacity);
        for &s in &samples[skip..] {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(s);
        }
    }

    fn snapshot(&self, out: &mut [f32]) {
        match self.ring.lock() {
            Ok(ring) => {
                for (dst, src) in out.iter_mut().zip(ring.iter()) {
                    *dst = *src;
                }
            }
            Err(_) => out.fill(0.0),
        }
    }
}

/// Frequency-domain analysis node producing byte magnitudes the way a
/// browser analyser node does: Blackman window, FFT, temporal smoothing,
/// decibel mapping onto `[0, 255]`.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    tap: AnalyserTap,
    input: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(config: &AnalyserConfig) -> Result<Self, AudioError> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AudioError::InvalidAnalyser(format!(
                "fft_size must be a power of two in {}..={}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, fft_size
            )));
        }
        if !(0.0..=1.0).contains(&config.smoothing) {
            return Err(AudioError::InvalidAnalyser(format!(
                "smoothing must be within 0.0..=1.0, got {}",
                config.smoothing
            )));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(AudioError::InvalidAnalyser(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                config.min_decibels, config.max_decibels
            )));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window: blackman_window(fft_size),
            tap: AnalyserTap::new(fft_size),
            input: vec![0.0; fft_size],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Handle for the producer side of the analysis node.
    pub fn tap(&self) -> AnalyserTap {
        self.tap.clone()
    }

    /// Fill `out` with the current byte magnitudes. Writes at most
    /// `frequency_bin_count()` values.
    pub fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        self.tap.snapshot(&mut self.input);
        self.update_spectrum();

        let range = self.max_decibels - self.min_decibels;
        for (dst, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *dst = to_byte(magnitude, self.min_decibels, range);
        }
    }

    fn update_spectrum(&mut self) {
        for ((dst, &s), &w) in self.scratch.iter_mut().zip(&self.input).zip(&self.window) {
            *dst = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (prev, c) in self.smoothed.iter_mut().zip(&self.scratch) {
            let magnitude = c.norm() * scale;
            let next = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if next.is_finite() { next } else { 0.0 };
        }
    }
}

fn to_byte(magnitude: f32, min_decibels: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / range) * (db - min_decibels);
    scaled.floor().clamp(0.0, 255.0) as u8
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a = 0.16f32;
    let a0 = 0.5 * (1.0 - a);
    let a1 = 0.5;
    let a2 = 0.5 * a;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser(smoothing: f32) -> Analyser {
        Analyser::new(&AnalyserConfig {
            smoothing,
            ..AnalyserConfig::default()
        })
        .unwrap()
    }

    /// Quiet sine centred on `bin`, well inside the decibel range.
    fn sine(bin: usize, fft_size: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                0.001 * (2.0 * std::f32::consts::PI * bin as f32 * n as f32 / fft_size as f32).sin()
            })
            .collect()
    }

    #[test]
    fn default_resolution_is_64_bins() {
        let a = analyser(0.8);
        assert_eq!(a.fft_size(), 128);
        assert_eq!(a.frequency_bin_count(), 64);
    }

    #[test]
    fn rejects_bad_configuration() {
        for config in [
            AnalyserConfig { fft_size: 100, ..AnalyserConfig::default() },
            AnalyserConfig { fft_size: 16, ..AnalyserConfig::default() },
            AnalyserConfig { smoothing: 1.5, ..AnalyserConfig::default() },
            AnalyserConfig { min_decibels: -20.0, ..AnalyserConfig::default() },
        ] {
            assert!(matches!(Analyser::new(&config), Err(AudioError::InvalidAnalyser(_))));
        }
    }

    #[test]
    fn silence_reads_zero() {
        let mut a = analyser(0.8);
        let mut out = vec![7u8; 64];
        a.get_byte_frequency_data(&mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut a = analyser(0.0);
        a.tap().push(&sine(10, 128, 128));

        let mut out = vec![0u8; 64];
        a.get_byte_frequency_data(&mut out);

        let peak = out
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 10);
        assert!(out[10] > out[9]);
        assert!(out[9] > out[8]);
        assert!(out[40] < 10);
    }

    #[test]
    fn smoothing_rises_gradually() {
        let mut a = analyser(0.8);
        a.tap().push(&sine(8, 128, 128));

        let mut first = vec![0u8; 64];
        a.get_byte_frequency_data(&mut first);
        let mut second = vec![0u8; 64];
        a.get_byte_frequency_data(&mut second);

        assert!(second[8] > first[8]);
    }

    #[test]
    fn tap_keeps_most_recent_samples() {
        let tap = AnalyserTap::new(4);
        tap.push(&[1.0, 2.0, 3.0]);
        tap.push(&[4.0, 5.0, 6.0, 7.0, 8.0]);

        let mut out = [0.0f32; 4];
        tap.snapshot(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn short_output_buffer_is_filled_partially() {
        let mut a = analyser(0.0);
        a.tap().push(&sine(2, 128, 128));
        let mut out = vec![0u8; 4];
        a.get_byte_frequency_data(&mut out);
        assert!(out[2] > 0);
    }
}
