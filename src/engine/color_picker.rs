// -----------------------------------------------------------------------------
// Color selection: closed-form best fill color for a span list
// -----------------------------------------------------------------------------
//
// For a requested alpha, the color minimizing the squared error over the
// covered pixels is the per-pixel blend inverse averaged over those pixels:
// `(target - current) * 255/alpha + current`. The solve runs in 8.8 fixed
// point: scale by `0x101 * 255 / alpha`, accumulate, divide by the pixel
// count, shift right by 8, clamp. Anti-alias span coverage is NOT weighted
// into the solve; the compositor applies it when the winner is drawn.

use super::color::Color;
use super::raster::{Raster, Scanline};

/// 144-entry house palette for `"palette1"`.
pub const PALETTE1: &str = "#8b3336,#c83940,#e3acbb,#01afa4,#1ab7ad,#8cd1cc,#d1c0db,#dbc6de,#e6dbe6,#cae1a3,#cfe4a8,#e2edcb,#a59256,#94814c,#c8c7c1,#a5472e,#ac4d33,#e7ac8c,#543b34,#573c33,#aba190,#f0583d,#f26f4e,#f9bdb7,#b33835,#cd3434,#e47294,#f0553b,#f15b39,#f8a78a,#ee422e,#ef4a38,#f58d81,#faa720,#fbc017,#fdde39,#f5eb57,#f3eb5c,#f1efab,#fdbf30,#fdc01d,#fcdf76,#0875b8,#0375bb,#19c0ed,#325eab,#3363ae,#55b4e5,#e99c62,#ee9a5f,#eacebf,#603b4a,#793854,#d1a0c8,#383230,#383439,#8582bc,#e7c058,#ecd37d,#f1ebde,#135341,#076a42,#0eb69d,#039e4e,#0ea54f,#84c991,#35483b,#2e4636,#96c291,#343c3b,#494c46,#929698,#3dabc7,#43acc8,#99c9d9,#adcbea,#b6d0e9,#d2e0ef,#f8c8a3,#f8cea8,#f8e1c9,#363636,#323231,#666f74,#f284ae,#f288b1,#f7bcd4,#fcef9e,#f7ed9d,#f6f2ca,#b4babf,#b6bbc0,#dadddc,#393a3c,#373e4b,#a6b5c0,#31395c,#1869b0,#13b3e9,#0f5c4c,#0f5a48,#0db7a8,#1e4279,#2569b0,#26bcea,#d54344,#e34446,#f4aac3,#fdd220,#fcda22,#fbea8d,#805e9e,#b688bb,#ceb9d7,#a8335b,#d14b7e,#ea97c1,#a36f43,#b27647,#e1c5a3,#463d30,#5e4835,#b3ab9f,#b94a30,#c24b2f,#e99b90,#343836,#334536,#8ec0a1,#c1c9ca,#bfc4c3,#dce5e7,#e3e5e3,#e1e3e2,#e0e3e2,#2f3971,#34549e,#98bce3,#e1d5af,#e4d3ab,#eae2cd,#e2a530,#e9a636,#f0d6a8";

/// Strategy for resolving a candidate's fill color.
#[derive(Clone, Debug)]
pub enum ColorPicker {
    /// Independent per-channel solve.
    Best,
    /// Pooled single-channel solve, emitted as grey.
    Greyscale,
    /// Accepted as a distinct config value for callers that search alpha;
    /// resolves the same per-channel solve as `Best`.
    Alpha,
    /// Per-channel solve snapped to the nearest palette entry.
    Palette(Vec<Color>),
}

impl ColorPicker {
    /// Map an opaque config string to a selector: "" → Best, "greyscale",
    /// "alpha", a named palette, or a comma-separated hex list. Unparseable
    /// hex entries are skipped; an empty list falls back to Best.
    pub fn from_config(config: &str) -> Self {
        match config {
            "" => ColorPicker::Best,
            "greyscale" => ColorPicker::Greyscale,
            "alpha" => ColorPicker::Alpha,
            other => {
                let list = if other == "palette1" { PALETTE1 } else { other };
                let colors: Vec<Color> =
                    list.split(',').filter_map(Color::from_hex).collect();
                if colors.is_empty() {
                    ColorPicker::Best
                } else {
                    ColorPicker::Palette(colors)
                }
            }
        }
    }

    /// Pick the best fill color for the covered pixels at the given alpha.
    /// An empty span list yields the zero color.
    pub fn select(
        &self,
        target: &Raster,
        current: &Raster,
        lines: &[Scanline],
        alpha: i32,
    ) -> Color {
        match self {
            ColorPicker::Best | ColorPicker::Alpha => best_color(target, current, lines, alpha),
            ColorPicker::Greyscale => best_greyscale(target, current, lines, alpha),
            ColorPicker::Palette(colors) => {
                if colors.len() == 1 {
                    return colors[0];
                }
                let best = best_color(target, current, lines, alpha);
                colors[closest_color_idx(colors, &best)]
            }
        }
    }
}

fn best_color(target: &Raster, current: &Raster, lines: &[Scanline], alpha: i32) -> Color {
    let alpha = alpha.clamp(1, 255);
    let a = 0x101 * 255 / alpha as i64;
    let (mut rsum, mut gsum, mut bsum) = (0i64, 0i64, 0i64);
    let mut count = 0i64;
    for line in lines {
        let mut i = target.pix_offset(line.x1, line.y);
        for _ in line.x1..=line.x2 {
            let tr = target.pix()[i] as i64;
            let tg = target.pix()[i + 1] as i64;
            let tb = target.pix()[i + 2] as i64;
            let cr = current.pix()[i] as i64;
            let cg = current.pix()[i + 1] as i64;
            let cb = current.pix()[i + 2] as i64;
            i += 4;
            rsum += (tr - cr) * a + cr * 0x101;
            gsum += (tg - cg) * a + cg * 0x101;
            bsum += (tb - cb) * a + cb * 0x101;
            count += 1;
        }
    }
    if count == 0 {
        return Color::default();
    }
    Color::new(
        (((rsum / count) >> 8) as i32).clamp(0, 255),
        (((gsum / count) >> 8) as i32).clamp(0, 255),
        (((bsum / count) >> 8) as i32).clamp(0, 255),
        alpha,
    )
}

fn best_greyscale(target: &Raster, current: &Raster, lines: &[Scanline], alpha: i32) -> Color {
    let alpha = alpha.clamp(1, 255);
    let a = 0x101 * 255 / alpha as i64;
    let mut sum = 0i64;
    let mut count = 0i64;
    for line in lines {
        let mut i = target.pix_offset(line.x1, line.y);
        for _ in line.x1..=line.x2 {
            for c in 0..3 {
                let t = target.pix()[i + c] as i64;
                let cur = current.pix()[i + c] as i64;
                sum += (t - cur) * a + cur * 0x101;
            }
            i += 4;
            count += 3;
        }
    }
    if count == 0 {
        return Color::default();
    }
    let v = (((sum / count) >> 8) as i32).clamp(0, 255);
    Color::new(v, v, v, alpha)
}

/// Index of the palette entry with the smallest Euclidean RGB distance.
fn closest_color_idx(colors: &[Color], c: &Color) -> usize {
    let mut selected = 0;
    let mut score = f64::INFINITY;
    for (i, cmp) in colors.iter().enumerate() {
        let d = c.delta(cmp);
        let x = ((d.r * d.r + d.g * d.g + d.b * d.b) as f64).sqrt();
        if x < score {
            selected = i;
            score = x;
        }
    }
    selected
}
