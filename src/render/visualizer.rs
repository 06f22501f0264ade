use crate::audio::sampler::FrequencySample;
use crate::config::VisualizerConfig;

use super::surface::Surface;

const MAX_MAGNITUDE: f32 = 255.0;
/// Bars overlap their slot by this factor.
const BAR_SPREAD: f32 = 1.4;
/// Horizontal inset applied on each side of a bar.
const BAR_INSET: f32 = 2.0;

/// Geometry of one drawn bar, in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub magnitude: u8,
}

/// Bar-graph renderer: one bar per even-indexed bin, anchored at the bottom.
pub struct Visualizer {
    bar_count: usize,
    bar_color: [u8; 4],
    glow_color: [u8; 4],
    glow_radius: u32,
}

impl Visualizer {
    pub fn new(config: &VisualizerConfig) -> Self {
        Self {
            bar_count: config.bar_count,
            bar_color: config.bar_color,
            glow_color: config.glow_color,
            glow_radius: config.glow_radius,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Bar layout for `sample` on a surface of the given size.
    /// Bin `2 * i` drives bar `i`; bins past the end read as silence.
    pub fn layout(&self, sample: &FrequencySample, width: u32, height: u32) -> Vec<Bar> {
        if self.bar_count == 0 {
            return Vec::new();
        }
        let slot = width as f32 / self.bar_count as f32 * BAR_SPREAD;
        (0..self.bar_count)
            .map(|i| {
                let magnitude = sample.get(i * 2).copied().unwrap_or(0);
                Bar {
                    x: i as f32 * slot + BAR_INSET,
                    width: (slot - 2.0 * BAR_INSET).max(0.0),
                    height: magnitude as f32 / MAX_MAGNITUDE * height as f32,
                    magnitude,
                }
            })
            .collect()
    }

    /// Clear `surface` and paint one frame. Skips the frame entirely (no
    /// clear) when either the surface or the sample is missing.
    pub fn draw(&self, surface: Option<&mut Surface>, sample: Option<&FrequencySample>) -> Option<Vec<Bar>> {
        let (surface, sample) = (surface?, sample?);
        let height = surface.height() as f32;
        let bars = self.layout(sample, surface.width(), surface.height());

        surface.clear();
        for bar in &bars {
            if bar.height <= 0.0 {
                continue;
            }
            let top = height - bar.height;
            surface.fill_glow(bar.x, top, bar.width, bar.height, self.glow_radius, self.glow_color);
        }
        for bar in &bars {
            surface.fill_rect(bar.x, height - bar.height, bar.width, bar.height, self.bar_color);
        }

        Some(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visualizer() -> Visualizer {
        Visualizer::new(&VisualizerConfig::default())
    }

    #[test]
    fn draws_twelve_bars_from_even_bins() {
        let mut sample = vec![0u8; 64];
        for i in 0..12 {
            sample[i * 2] = (i * 20) as u8;
            sample[i * 2 + 1] = 255;
        }
        let mut surface = Surface::new(110, 28);

        let bars = visualizer().draw(Some(&mut surface), Some(&sample[..])).unwrap();
        assert_eq!(bars.len(), 12);
        for (i, bar) in bars.iter().enumerate() {
            assert_eq!(bar.magnitude, (i * 20) as u8);
            assert!(bar.height >= 0.0 && bar.height <= 28.0);
            assert!((bar.height - (i * 20) as f32 / 255.0 * 28.0).abs() < 1e-4);
        }
    }

    #[test]
    fn bar_geometry_matches_reference() {
        let sample = vec![255u8; 64];
        let bars = visualizer().layout(&sample, 110, 28);

        let slot = 110.0 / 12.0 * 1.4;
        assert!((bars[0].x - 2.0).abs() < 1e-4);
        assert!((bars[3].x - (3.0 * slot + 2.0)).abs() < 1e-4);
        assert!((bars[0].width - (slot - 4.0)).abs() < 1e-4);
        assert!(bars.iter().all(|b| b.height == 28.0));
    }

    #[test]
    fn full_bar_reaches_the_top() {
        let mut sample = vec![0u8; 64];
        sample[0] = 255;
        let mut surface = Surface::new(110, 28);
        visualizer().draw(Some(&mut surface), Some(&sample[..]));

        assert!(surface.pixel(5, 0)[3] > 200);
        assert!(surface.pixel(5, 27)[3] > 200);
        // Second bar is silent; its column stays clear of fill
        assert!(surface.pixel(20, 0)[3] < 200);
    }

    #[test]
    fn silence_leaves_cleared_surface() {
        let sample = vec![0u8; 64];
        let mut surface = Surface::new(110, 28);
        surface.fill_rect(0.0, 0.0, 110.0, 28.0, [1, 1, 1, 255]);

        let bars = visualizer().draw(Some(&mut surface), Some(&sample[..])).unwrap();
        assert!(bars.iter().all(|b| b.height == 0.0));
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn short_sample_reads_missing_bins_as_zero() {
        let sample = vec![200u8; 5];
        let bars = visualizer().layout(&sample, 110, 28);
        assert_eq!(bars.len(), 12);
        assert_eq!(bars[2].magnitude, 200);
        assert_eq!(bars[3].magnitude, 0);
    }

    #[test]
    fn missing_inputs_skip_the_frame() {
        let mut surface = Surface::new(10, 10);
        surface.fill_rect(0.0, 0.0, 10.0, 10.0, [9, 9, 9, 255]);

        assert!(visualizer().draw(Some(&mut surface), None).is_none());
        assert!(visualizer().draw(None, Some(&[1u8, 2, 3][..])).is_none());
        assert_eq!(surface.pixel(0, 0), [9, 9, 9, 255]);
    }
}
