/// Largest accepted surface edge, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

/// Byte length of one RGBA8 frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Pixel offset into an RGBA8 buffer of the given width.
fn offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

/// Fixed-size RGBA8 drawing surface, row-major, starting fully transparent.
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Edges are clamped to `1..=MAX_DIMENSION`.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.clamp(1, MAX_DIMENSION);
        let height = height.clamp(1, MAX_DIMENSION);
        Self {
            width,
            height,
            pixels: vec![0; frame_len(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, `width * height * 4` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let idx = offset(self.width, x, y);
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Opaque RGBA copy of the surface composited over `background`.
    pub fn flatten(&self, background: [u8; 3]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len());
        for px in self.pixels().chunks_exact(4) {
            let rgb = over([px[0], px[1], px[2], px[3]], background);
            out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        out
    }

    /// Source-over fill of a rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, color[3] as f32 / 255.0);
            }
        }
    }

    /// Soft halo around a rectangle, fading out over `radius` pixels.
    /// The rectangle interior itself is left untouched.
    pub fn fill_glow(&mut self, x: f32, y: f32, w: f32, h: f32, radius: u32, color: [u8; 4]) {
        if radius == 0 || w <= 0.0 || h <= 0.0 {
            return;
        }
        let r = radius as f32;
        let Some((x0, y0, x1, y1)) = self.clip(x - r, y - r, w + 2.0 * r, h + 2.0 * r) else {
            return;
        };
        let base = color[3] as f32 / 255.0 * 0.5;

        for py in y0..y1 {
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                let dx = (x - cx).max(cx - (x + w)).max(0.0);
                let dy = (y - cy).max(cy - (y + h)).max(0.0);
                let dist = (dx * dx + dy * dy).sqrt();
                if dist <= 0.0 || dist > r {
                    continue;
                }
                let falloff = 1.0 - dist / (r + 1.0);
                self.blend(px, py, color, base * falloff * falloff);
            }
        }
    }

    fn clip(&self, x: f32, y: f32, w: f32, h: f32) -> Option<(u32, u32, u32, u32)> {
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        let x0 = x.round().max(0.0) as u32;
        let y0 = y.round().max(0.0) as u32;
        let x1 = ((x + w).round().max(0.0) as u32).min(self.width);
        let y1 = ((y + h).round().max(0.0) as u32).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    fn blend(&mut self, px: u32, py: u32, color: [u8; 4], alpha: f32) {
        let idx = offset(self.width, px, py);
        let dst_a = self.pixels[idx + 3] as f32 / 255.0;
        let out_a = alpha + dst_a * (1.0 - alpha);
        if out_a <= 0.0 {
            return;
        }
        for c in 0..3 {
            let src = color[c] as f32;
            let dst = self.pixels[idx + c] as f32;
            let v = (src * alpha + dst * dst_a * (1.0 - alpha)) / out_a;
            self.pixels[idx + c] = v.round().clamp(0.0, 255.0) as u8;
        }
        self.pixels[idx + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Composite an RGBA pixel over an opaque backdrop.
pub fn over(pixel: [u8; 4], background: [u8; 3]) -> [u8; 3] {
    let a = pixel[3] as f32 / 255.0;
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = (pixel[c] as f32 * a + background[c] as f32 * (1.0 - a)).round() as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_transparent() {
        let s = Surface::new(4, 3);
        assert_eq!(s.pixels().len(), 48);
        assert!(s.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn opaque_fill_is_exact() {
        let mut s = Surface::new(4, 4);
        s.fill_rect(1.0, 1.0, 2.0, 2.0, [10, 20, 30, 255]);
        assert_eq!(s.pixel(1, 1), [10, 20, 30, 255]);
        assert_eq!(s.pixel(2, 2), [10, 20, 30, 255]);
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(s.pixel(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn fill_is_clipped() {
        let mut s = Surface::new(4, 4);
        s.fill_rect(2.0, -5.0, 100.0, 7.0, [255, 0, 0, 255]);
        assert_eq!(s.pixel(3, 1), [255, 0, 0, 255]);
        assert_eq!(s.pixel(3, 2), [0, 0, 0, 0]);
        assert_eq!(s.pixel(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn translucent_fill_over_transparent_keeps_color() {
        let mut s = Surface::new(1, 1);
        s.fill_rect(0.0, 0.0, 1.0, 1.0, [255, 90, 160, 230]);
        assert_eq!(s.pixel(0, 0), [255, 90, 160, 230]);
    }

    #[test]
    fn glow_fades_with_distance() {
        let mut s = Surface::new(20, 5);
        s.fill_glow(8.0, 0.0, 4.0, 5.0, 6, [255, 140, 200, 255]);
        let near = s.pixel(7, 2)[3];
        let far = s.pixel(3, 2)[3];
        assert!(near > far);
        assert!(far > 0);
        assert_eq!(s.pixel(9, 2)[3], 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut s = Surface::new(3, 3);
        s.fill_rect(0.0, 0.0, 3.0, 3.0, [1, 2, 3, 255]);
        s.clear();
        assert!(s.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn flatten_is_opaque() {
        let mut s = Surface::new(2, 1);
        s.fill_rect(0.0, 0.0, 1.0, 1.0, [200, 100, 0, 255]);
        let flat = s.flatten([10, 20, 30]);
        assert_eq!(flat, vec![200, 100, 0, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn oversized_surface_is_clamped() {
        let s = Surface::new(100_000, 0);
        assert_eq!((s.width(), s.height()), (MAX_DIMENSION, 1));
        assert_eq!(s.pixels().len(), frame_len(MAX_DIMENSION, 1));
    }

    #[test]
    fn frame_len_does_not_wrap() {
        assert_eq!(frame_len(u32::MAX, 1), u32::MAX as usize * 4);
    }
}
