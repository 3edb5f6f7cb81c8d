// -----------------------------------------------------------------------------
// Colors and background heuristics
// -----------------------------------------------------------------------------

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::raster::Raster;

/// 8-bit RGBA, straight (non-premultiplied) alpha. Channels are kept as i32
/// so the selector math can accumulate signed differences without casts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

impl Color {
    pub fn new(r: i32, g: i32, b: i32, a: i32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    /// Alpha defaults to 255 when absent.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        let nibble = |i: usize| -> Option<i32> {
            i32::from_str_radix(s.get(i..i + 1)?, 16).ok()
        };
        let byte = |i: usize| -> Option<i32> {
            i32::from_str_radix(s.get(i..i + 2)?, 16).ok()
        };
        match s.len() {
            3 | 4 => {
                let r = nibble(0)?;
                let g = nibble(1)?;
                let b = nibble(2)?;
                let a = if s.len() == 4 { nibble(3)? } else { 0xf };
                Some(Self::new(r << 4 | r, g << 4 | g, b << 4 | b, a << 4 | a))
            }
            6 | 8 => {
                let a = if s.len() == 8 { byte(6)? } else { 255 };
                Some(Self::new(byte(0)?, byte(2)?, byte(4)?, a))
            }
            _ => None,
        }
    }

    /// Per-channel absolute difference, clamped to [0,255].
    pub fn delta(&self, other: &Color) -> Color {
        Color::new(
            (self.r - other.r).abs().clamp(0, 255),
            (self.g - other.g).abs().clamp(0, 255),
            (self.b - other.b).abs().clamp(0, 255),
            (self.a - other.a).abs().clamp(0, 255),
        )
    }

    /// Alpha-premultiplied 16-bit channels, the form the span compositor
    /// consumes: each channel widened as `v | v<<8`, scaled by alpha over
    /// 255.
    pub(crate) fn premul16(&self) -> (u32, u32, u32, u32) {
        let widen = |v: i32| -> u32 {
            let v = v.clamp(0, 255) as u32;
            v | v << 8
        };
        let a = self.a.clamp(0, 255) as u32;
        (
            widen(self.r) * a / 0xff,
            widen(self.g) * a / 0xff,
            widen(self.b) * a / 0xff,
            a | a << 8,
        )
    }

    pub fn rgba8(&self) -> [u8; 4] {
        [
            self.r.clamp(0, 255) as u8,
            self.g.clamp(0, 255) as u8,
            self.b.clamp(0, 255) as u8,
            self.a.clamp(0, 255) as u8,
        ]
    }
}

/// Average color of the image, opaque alpha.
pub fn average_color(im: &Raster) -> Color {
    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for px in im.pix().chunks_exact(4) {
        r += px[0] as u64;
        g += px[1] as u64;
        b += px[2] as u64;
    }
    let n = (im.w() as u64 * im.h() as u64).max(1);
    Color::new((r / n) as i32, (g / n) as i32, (b / n) as i32, 255)
}

/// Most frequently used color, with the low-order bits masked off so near
/// duplicates pool into one bucket. Opaque alpha.
pub fn most_frequent_color(im: &Raster) -> Color {
    const MASK: u8 = 0xff - 0x03;
    let mut frequency: HashMap<[u8; 3], u32> = HashMap::new();
    for px in im.pix().chunks_exact(4) {
        let key = [px[0] & MASK, px[1] & MASK, px[2] & MASK];
        *frequency.entry(key).or_insert(0) += 1;
    }
    let mut best = [0u8; 3];
    let mut m = 0;
    for (k, v) in frequency {
        if v > m || (v == m && m > 0 && k < best) {
            best = k;
            m = v;
        }
    }
    Color::new(best[0] as i32, best[1] as i32, best[2] as i32, 255)
}

/// Color at a point, opaque alpha. Out-of-range coordinates fall back to the
/// origin.
pub fn color_at_point(im: &Raster, x: i32, y: i32) -> Color {
    let x = if x < 0 || x >= im.w() { 0 } else { x };
    let y = if y < 0 || y >= im.h() { 0 } else { y };
    let i = im.pix_offset(x, y);
    let px = &im.pix()[i..i + 4];
    Color::new(px[0] as i32, px[1] as i32, px[2] as i32, 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_six_digits() {
        assert_eq!(Color::from_hex("#12c4f6"), Some(Color::new(0x12, 0xc4, 0xf6, 255)));
    }

    #[test]
    fn hex_three_digits_doubles_nibbles() {
        assert_eq!(Color::from_hex("fa0"), Some(Color::new(0xff, 0xaa, 0x00, 255)));
    }

    #[test]
    fn hex_eight_digits_carries_alpha() {
        assert_eq!(Color::from_hex("00ff0080"), Some(Color::new(0, 255, 0, 0x80)));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("zzzzzz"), None);
    }

    #[test]
    fn average_of_uniform_image_is_that_color() {
        let im = Raster::uniform(7, 5, Color::new(10, 20, 30, 255));
        assert_eq!(average_color(&im), Color::new(10, 20, 30, 255));
    }

    #[test]
    fn most_frequent_finds_majority() {
        let mut im = Raster::uniform(4, 4, Color::new(200, 0, 0, 255));
        let i = im.pix_offset(0, 0);
        im.pix_mut()[i..i + 4].copy_from_slice(&[0, 0, 200, 255]);
        let c = most_frequent_color(&im);
        assert_eq!((c.r, c.g), (200, 0));
    }
}
