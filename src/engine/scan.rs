// -----------------------------------------------------------------------------
// Scanline production: winding fill and round-capped stroking
// -----------------------------------------------------------------------------
//
// Shapes turn into spans here. Filled outlines go through a non-zero winding
// scanline walk sampled at pixel-row centers; stroked polylines are treated
// as a union of per-segment capsules (a capsule is a segment dilated by
// half the stroke width, which is exactly a round-capped, round-joined
// stroke). Both emit fractional 16-bit coverage on edge pixels and clip to
// the raster bounds as they go, so every span leaves here satisfying
// `0 <= x1 <= x2 < W` and `0 <= y < H`.

use super::raster::Scanline;

/// Per-worker rasterization scratch. The scanline vector is truncated at the
/// start of every rasterize and the returned span slice borrows it, so a
/// RasterContext must never be shared between threads and a span slice is
/// invalidated by the next rasterize on the same context.
pub struct RasterContext {
    pub w: i32,
    pub h: i32,
    lines: Vec<Scanline>,
    crossings: Vec<(f64, i32)>,
    intervals: Vec<(f64, f64)>,
}

impl RasterContext {
    pub fn new(w: i32, h: i32) -> Self {
        Self {
            w,
            h,
            lines: Vec::with_capacity(4096),
            crossings: Vec::with_capacity(32),
            intervals: Vec::with_capacity(32),
        }
    }

    /// Clear and hand out the span buffer for shapes that emit their spans
    /// directly (axis-aligned rectangles, ellipses).
    pub(crate) fn reset_lines(&mut self) -> &mut Vec<Scanline> {
        self.lines.clear();
        &mut self.lines
    }

    pub(crate) fn lines(&self) -> &[Scanline] {
        &self.lines
    }

    /// Fill the closed polygon `pts` (implicitly closed back to the first
    /// point) with the non-zero winding rule.
    pub fn fill_path<'a>(&'a mut self, pts: &[(f64, f64)]) -> &'a [Scanline] {
        self.lines.clear();
        if pts.len() < 3 {
            return &self.lines;
        }

        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for &(_, y) in pts {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        let y0 = (y_min.floor() as i32).max(0);
        let y1 = (y_max.ceil() as i32).min(self.h - 1);

        for y in y0..=y1 {
            let sy = y as f64 + 0.5;
            self.crossings.clear();
            for i in 0..pts.len() {
                let (ax, ay) = pts[i];
                let (bx, by) = pts[(i + 1) % pts.len()];
                if (ay <= sy) != (by <= sy) {
                    let t = (sy - ay) / (by - ay);
                    let x = ax + t * (bx - ax);
                    self.crossings.push((x, if by > ay { 1 } else { -1 }));
                }
            }
            self.crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            let mut start = 0.0;
            for &(x, dir) in &self.crossings {
                if winding == 0 {
                    start = x;
                }
                winding += dir;
                if winding == 0 {
                    push_interval(&mut self.lines, y, start, x, self.w);
                }
            }
        }
        &self.lines
    }

    /// Stroke the open polyline `pts` at the given width, round caps and
    /// round joins. Coverage comes from the distance of each pixel center to
    /// the nearest segment.
    pub fn stroke_path<'a>(&'a mut self, pts: &[(f64, f64)], width: f64) -> &'a [Scanline] {
        self.lines.clear();
        if pts.len() < 2 {
            return &self.lines;
        }
        let r = (width / 2.0).max(0.05);
        let reach = r + 0.5;

        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for &(_, y) in pts {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        let y0 = ((y_min - reach).floor() as i32).max(0);
        let y1 = ((y_max + reach).ceil() as i32).min(self.h - 1);

        for y in y0..=y1 {
            let sy = y as f64 + 0.5;

            self.intervals.clear();
            for seg in pts.windows(2) {
                let (ax, ay) = seg[0];
                let (bx, by) = seg[1];
                if let Some(iv) = segment_row_interval(ax, ay, bx, by, sy, reach) {
                    self.intervals.push(iv);
                }
            }
            if self.intervals.is_empty() {
                continue;
            }
            self.intervals.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Merge intervals closer than two pixels so no pixel is visited
            // (or emitted) twice across neighboring intervals.
            let mut merged_end = 0usize;
            for i in 1..self.intervals.len() {
                let (lo, hi) = self.intervals[i];
                let cur = &mut self.intervals[merged_end];
                if lo <= cur.1 + 2.0 {
                    cur.1 = cur.1.max(hi);
                } else {
                    merged_end += 1;
                    self.intervals[merged_end] = (lo, hi);
                }
            }
            self.intervals.truncate(merged_end + 1);

            for &(lo, hi) in &self.intervals {
                let px0 = ((lo - 0.5).floor() as i32).max(0);
                let px1 = ((hi - 0.5).ceil() as i32).min(self.w - 1);
                let mut run_start = -1i32;
                for x in px0..=px1 {
                    let cx = x as f64 + 0.5;
                    let mut d = f64::INFINITY;
                    for seg in pts.windows(2) {
                        d = d.min(segment_distance(cx, sy, seg[0], seg[1]));
                        if d <= reach - 1.0 {
                            break;
                        }
                    }
                    let cov = (reach - d).clamp(0.0, 1.0);
                    if cov >= 1.0 {
                        if run_start < 0 {
                            run_start = x;
                        }
                        continue;
                    }
                    if run_start >= 0 {
                        self.lines.push(Scanline { y, x1: run_start, x2: x - 1, alpha: 0xffff });
                        run_start = -1;
                    }
                    let a16 = (cov * 65535.0) as u32;
                    if a16 > 0 {
                        self.lines.push(Scanline { y, x1: x, x2: x, alpha: a16 });
                    }
                }
                if run_start >= 0 {
                    self.lines.push(Scanline { y, x1: run_start, x2: px1, alpha: 0xffff });
                }
            }
        }
        &self.lines
    }
}

/// Convert one inside interval `[x0, x1)` of a row into spans: a fully
/// covered middle run plus fractional single-pixel spans at each end.
fn push_interval(lines: &mut Vec<Scanline>, y: i32, x0: f64, x1: f64, w: i32) {
    let x0 = x0.max(0.0);
    let x1 = x1.min(w as f64);
    if x1 <= x0 {
        return;
    }
    let ix0 = x0.floor() as i32;
    let ix1 = ((x1.ceil() as i32) - 1).min(w - 1);
    if ix0 == ix1 {
        push_edge_pixel(lines, y, ix0, ((x1 - x0) * 65535.0) as u32);
        return;
    }
    let left = (((ix0 + 1) as f64 - x0) * 65535.0) as u32;
    let right = ((x1 - ix1 as f64) * 65535.0) as u32;
    let mut mid1 = ix0 + 1;
    let mut mid2 = ix1 - 1;
    if left >= 0xffff {
        mid1 = ix0;
    } else {
        push_edge_pixel(lines, y, ix0, left);
    }
    if right >= 0xffff {
        mid2 = ix1;
    }
    if mid1 <= mid2 {
        lines.push(Scanline { y, x1: mid1, x2: mid2, alpha: 0xffff });
    }
    if right < 0xffff {
        push_edge_pixel(lines, y, ix1, right);
    }
}

/// Push a fractional edge pixel, coalescing with a preceding fractional span
/// on the same pixel (two winding intervals can end and start inside one
/// pixel; pixels must not be emitted twice or the partial-difference update
/// double-counts them).
fn push_edge_pixel(lines: &mut Vec<Scanline>, y: i32, x: i32, alpha: u32) {
    let alpha = alpha.min(0xffff);
    if alpha == 0 {
        return;
    }
    if let Some(last) = lines.last_mut() {
        if last.y == y && last.x2 == x {
            last.alpha = (last.alpha + alpha).min(0xffff);
            return;
        }
    }
    lines.push(Scanline { y, x1: x, x2: x, alpha });
}

/// The x interval of row `sy` that the capsule around segment a-b can touch,
/// obtained by clipping the segment to the row's reach slab.
fn segment_row_interval(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    sy: f64,
    reach: f64,
) -> Option<(f64, f64)> {
    let (ylo, yhi) = (sy - reach, sy + reach);
    if ay.min(by) > yhi || ay.max(by) < ylo {
        return None;
    }
    let mut t0 = 0.0;
    let mut t1 = 1.0;
    let dy = by - ay;
    if dy.abs() > 1e-12 {
        let ta = (ylo - ay) / dy;
        let tb = (yhi - ay) / dy;
        let (lo, hi) = if ta < tb { (ta, tb) } else { (tb, ta) };
        t0 = lo.max(0.0);
        t1 = hi.min(1.0);
        if t0 > t1 {
            return None;
        }
    }
    let xa = ax + t0 * (bx - ax);
    let xb = ax + t1 * (bx - ax);
    Some((xa.min(xb) - reach, xa.max(xb) + reach))
}

fn segment_distance(px: f64, py: f64, a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((px - a.0) * dx + (py - a.1) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let ex = px - (a.0 + t * dx);
    let ey = py - (a.1 + t * dy);
    (ex * ex + ey * ey).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_spans_in_bounds(lines: &[Scanline], w: i32, h: i32) {
        for s in lines {
            assert!(s.y >= 0 && s.y < h, "row out of bounds: {s:?}");
            assert!(s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < w, "columns out of bounds: {s:?}");
            assert!(s.alpha <= 0xffff);
        }
    }

    #[test]
    fn axis_aligned_square_fills_exactly() {
        let mut rc = RasterContext::new(16, 16);
        let pts = [(2.0, 2.0), (10.0, 2.0), (10.0, 10.0), (2.0, 10.0)];
        let lines = rc.fill_path(&pts);
        // Rows 2..=9, each fully covering columns 2..=9.
        let full: Vec<_> = lines.iter().filter(|s| s.alpha == 0xffff).collect();
        assert_eq!(full.len(), 8);
        for s in full {
            assert_eq!((s.x1, s.x2), (2, 9));
        }
    }

    #[test]
    fn fractional_edges_get_partial_coverage() {
        let mut rc = RasterContext::new(16, 4);
        let pts = [(1.25, 0.0), (6.75, 0.0), (6.75, 4.0), (1.25, 4.0)];
        let lines: Vec<_> = rc.fill_path(&pts).to_vec();
        let row: Vec<_> = lines.iter().filter(|s| s.y == 1).collect();
        assert_eq!(row.len(), 3);
        assert_eq!((row[0].x1, row[0].x2), (1, 1));
        assert!((row[0].alpha as f64 / 65535.0 - 0.75).abs() < 0.01);
        assert_eq!((row[1].x1, row[1].x2), (2, 5));
        assert_eq!(row[1].alpha, 0xffff);
        assert_eq!((row[2].x1, row[2].x2), (6, 6));
        assert!((row[2].alpha as f64 / 65535.0 - 0.75).abs() < 0.01);
    }

    #[test]
    fn offscreen_geometry_is_clipped() {
        let mut rc = RasterContext::new(8, 8);
        let pts = [(-20.0, -20.0), (30.0, -20.0), (30.0, 30.0), (-20.0, 30.0)];
        let lines = rc.fill_path(&pts);
        assert_spans_in_bounds(lines, 8, 8);
        // Fully covered image: 8 rows of full spans.
        assert_eq!(lines.len(), 8);
        for s in lines {
            assert_eq!((s.x1, s.x2, s.alpha), (0, 7, 0xffff));
        }
    }

    #[test]
    fn degenerate_paths_produce_no_spans() {
        let mut rc = RasterContext::new(8, 8);
        assert!(rc.fill_path(&[(1.0, 1.0), (2.0, 2.0)]).is_empty());
        assert!(rc.stroke_path(&[(1.0, 1.0)], 1.0).is_empty());
    }

    #[test]
    fn random_triangles_stay_in_bounds() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(7);
        let mut rc = RasterContext::new(40, 30);
        for _ in 0..200 {
            let pts: Vec<(f64, f64)> = (0..3)
                .map(|_| (rng.gen_range(-60.0..100.0), rng.gen_range(-60.0..90.0)))
                .collect();
            let lines = rc.fill_path(&pts);
            assert_spans_in_bounds(lines, 40, 30);
        }
    }

    #[test]
    fn stroke_covers_the_segment_core() {
        let mut rc = RasterContext::new(32, 16);
        let lines = rc.stroke_path(&[(4.0, 8.0), (28.0, 8.0)], 3.0);
        assert_spans_in_bounds(lines, 32, 16);
        // The row through the segment center must be fully covered between
        // the endpoints.
        let covered: Vec<_> = lines
            .iter()
            .filter(|s| s.y == 8 && s.alpha == 0xffff)
            .collect();
        assert!(!covered.is_empty());
        assert!(covered.iter().any(|s| s.x1 <= 5 && s.x2 >= 26));
    }

    #[test]
    fn stroke_caps_are_round() {
        let mut rc = RasterContext::new(32, 32);
        let lines: Vec<_> = rc.stroke_path(&[(16.0, 16.0), (24.0, 16.0)], 6.0).to_vec();
        // A point behind the start cap but within the cap radius is covered.
        let covered = |x: i32, y: i32| {
            lines.iter().any(|s| s.y == y && s.x1 <= x && x <= s.x2 && s.alpha > 0)
        };
        assert!(covered(14, 16), "inside the round cap");
        assert!(!covered(8, 16), "well outside the cap");
        assert!(covered(16, 14), "above the segment within the width");
    }

    #[test]
    fn random_strokes_stay_in_bounds() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(11);
        let mut rc = RasterContext::new(24, 24);
        for _ in 0..100 {
            let pts: Vec<(f64, f64)> = (0..4)
                .map(|_| (rng.gen_range(-10.0..34.0), rng.gen_range(-10.0..34.0)))
                .collect();
            let w = rng.gen_range(0.3..5.0);
            let lines = rc.stroke_path(&pts, w);
            assert_spans_in_bounds(lines, 24, 24);
        }
    }

    #[test]
    fn no_pixel_appears_twice_in_a_row() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(23);
        let mut rc = RasterContext::new(32, 32);
        for _ in 0..100 {
            let pts: Vec<(f64, f64)> = (0..5)
                .map(|_| (rng.gen_range(-8.0..40.0), rng.gen_range(-8.0..40.0)))
                .collect();
            let lines = rc.fill_path(&pts).to_vec();
            let mut seen = std::collections::HashSet::new();
            for s in &lines {
                for x in s.x1..=s.x2 {
                    assert!(seen.insert((s.y, x)), "pixel ({x},{}) emitted twice", s.y);
                }
            }
        }
    }
}
