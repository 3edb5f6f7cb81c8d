// -----------------------------------------------------------------------------
// Pixelwise difference: full image and span-restricted incremental update
// -----------------------------------------------------------------------------

use rayon::prelude::*;

use super::raster::{Raster, Scanline};

#[inline]
fn row_sse(a: &[u8], b: &[u8]) -> u64 {
    let mut sse: u64 = 0;
    for (pa, pb) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        let dr = pa[0] as i32 - pb[0] as i32;
        let dg = pa[1] as i32 - pb[1] as i32;
        let db = pa[2] as i32 - pb[2] as i32;
        let da = pa[3] as i32 - pb[3] as i32;
        sse += (dr * dr + dg * dg + db * db + da * da) as u64;
    }
    sse
}

/// Normalized root-mean-square difference over all pixels and all four
/// channels. Result in [0,1].
pub fn diff_full(a: &Raster, b: &Raster) -> f64 {
    debug_assert_eq!((a.w(), a.h()), (b.w(), b.h()));
    let row = (a.w() * 4) as usize;
    let total: u64 = a
        .pix()
        .par_chunks(row)
        .zip(b.pix().par_chunks(row))
        .map(|(ra, rb)| row_sse(ra, rb))
        .sum();
    let count = (a.w() * a.h() * 4) as f64;
    (total as f64 / count).sqrt() / 255.0
}

/// Incremental difference: starting from `score = diff_full(target, before)`,
/// replace the contribution of the pixels covered by `lines` with their
/// contribution under `after`. Cost is proportional to total span length.
pub fn diff_partial(
    target: &Raster,
    before: &Raster,
    after: &Raster,
    score: f64,
    lines: &[Scanline],
) -> f64 {
    debug_assert_eq!((target.w(), target.h()), (before.w(), before.h()));
    debug_assert_eq!((target.w(), target.h()), (after.w(), after.h()));
    let count = (target.w() * target.h() * 4) as f64;
    let mut total = (score * 255.0).powi(2) * count;
    for line in lines {
        let mut i = target.pix_offset(line.x1, line.y);
        for _ in line.x1..=line.x2 {
            let (tp, bp, ap) = (&target.pix()[i..], &before.pix()[i..], &after.pix()[i..]);
            let mut sub = 0i64;
            let mut add = 0i64;
            for c in 0..4 {
                let d1 = tp[c] as i32 - bp[c] as i32;
                let d2 = tp[c] as i32 - ap[c] as i32;
                sub += (d1 * d1) as i64;
                add += (d2 * d2) as i64;
            }
            total += (add - sub) as f64;
            i += 4;
        }
    }
    (total.max(0.0) / count).sqrt() / 255.0
}
