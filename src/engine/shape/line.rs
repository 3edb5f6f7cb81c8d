use serde::{Deserialize, Serialize};
use tiny_skia::{PathBuilder, Pixmap};

use super::{output_transform, rotate_about, round_stroke, shape_paint, Plane, PAD};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

use rand::Rng;

/// Straight stroked segment with round caps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Line {
    #[serde(rename = "X1")]
    pub x1: f64,
    #[serde(rename = "Y1")]
    pub y1: f64,
    #[serde(rename = "X2")]
    pub x2: f64,
    #[serde(rename = "Y2")]
    pub y2: f64,
    #[serde(rename = "Width")]
    pub width: f64,
    #[serde(rename = "MaxLineWidth")]
    pub max_line_width: f64,
}

impl Default for Line {
    fn default() -> Self {
        Self { x1: 0.0, y1: 0.0, x2: 0.0, y2: 0.0, width: 0.5, max_line_width: 0.5 }
    }
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x1 = plane.random_w();
        self.y1 = plane.random_h();
        self.x2 = plane.random_w();
        self.y2 = plane.random_h();
        self.width = 0.5;
        self.mutate_impl(plane, 1.0, 1);
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        self.mutate_impl(plane, temp, 10);
    }

    fn mutate_impl(&mut self, plane: &mut Plane, temp: f64, mut rollback: i32) {
        const R: f64 = std::f64::consts::PI / 4.0;
        let w = plane.w as f64 - 1.0 + PAD;
        let h = plane.h as f64 - 1.0 + PAD;
        let scale = 16.0 * temp;
        loop {
            let save = *self;
            match plane.rng.gen_range(0..4) {
                0 => {
                    self.x1 = (self.x1 + plane.norm() * scale).clamp(-PAD, w);
                    self.y1 = (self.y1 + plane.norm() * scale).clamp(-PAD, h);
                }
                1 => {
                    self.x2 = (self.x2 + plane.norm() * scale).clamp(-PAD, w);
                    self.y2 = (self.y2 + plane.norm() * scale).clamp(-PAD, h);
                }
                2 => {
                    let a = plane.norm() * scale;
                    let b = plane.norm() * scale;
                    self.x1 = (self.x1 + a).clamp(-PAD, w);
                    self.y1 = (self.y1 + b).clamp(-PAD, h);
                    self.x2 = (self.x2 + a).clamp(-PAD, w);
                    self.y2 = (self.y2 + b).clamp(-PAD, h);
                }
                _ => {
                    let cx = (self.x1 + self.x2) / 2.0;
                    let cy = (self.y1 + self.y2) / 2.0;
                    let theta = plane.norm() * temp * R;
                    let (sin, cos) = theta.sin_cos();
                    let (a, b) = rotate_about(self.x1, self.y1, cx, cy, cos, sin);
                    self.x1 = a.clamp(-PAD, w);
                    self.y1 = b.clamp(-PAD, h);
                    let (a, b) = rotate_about(self.x2, self.y2, cx, cy, cos, sin);
                    self.x2 = a.clamp(-PAD, w);
                    self.y2 = b.clamp(-PAD, h);
                }
            }
            if self.valid() {
                break;
            }
            if rollback > 0 {
                *self = save;
                rollback -= 1;
            }
        }
    }

    pub fn valid(&self) -> bool {
        (self.x2 - self.x1).abs() > 1.0 || (self.y2 - self.y1).abs() > 1.0
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        rc.stroke_path(&[(self.x1, self.y1), (self.x2, self.y2)], self.width)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(self.x1 as f32, self.y1 as f32);
        pb.line_to(self.x2 as f32, self.y2 as f32);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(
                &path,
                &shape_paint(color),
                &round_stroke(self.width as f32),
                output_transform(scale),
                None,
            );
        }
    }

    pub fn svg(&self, attrs: &str) -> String {
        let attrs = attrs.replace("fill", "stroke");
        format!(
            "<path {} fill=\"none\" d=\"M {:.6} {:.6} L {:.6} {:.6}\" stroke-width=\"{:.6}\" />",
            attrs, self.x1, self.y1, self.x2, self.y2, self.width
        )
    }
}

/// Line whose first endpoint is pinned to a caller-specified normalized
/// center; only the free endpoint and the width ever move.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadialLine {
    #[serde(rename = "CX")]
    pub cx: f64,
    #[serde(rename = "CY")]
    pub cy: f64,
    #[serde(rename = "Line")]
    pub line: Line,
}

impl RadialLine {
    pub fn new(cx: f64, cy: f64) -> Self {
        Self { cx, cy, line: Line::new() }
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.line.x1 = self.cx * plane.w as f64;
        self.line.y1 = self.cy * plane.h as f64;
        self.line.x2 = plane.random_w();
        self.line.y2 = plane.random_h();
        self.line.width = 0.5;
        self.mutate_impl(plane, 1.0, 1);
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        self.mutate_impl(plane, temp, 10);
    }

    fn mutate_impl(&mut self, plane: &mut Plane, temp: f64, mut rollback: i32) {
        const MAX_LINE_WIDTH: f64 = 4.0;
        let w = plane.w as f64 - 1.0 + PAD;
        let h = plane.h as f64 - 1.0 + PAD;
        let scale = 16.0 * temp;
        // The pin is an invariant, not an initial condition.
        self.line.x1 = self.cx * plane.w as f64;
        self.line.y1 = self.cy * plane.h as f64;
        loop {
            let save = *self;
            match plane.rng.gen_range(0..3) {
                0 => {
                    // Slide the free endpoint along the ray.
                    let v = 1.0 + plane.norm() * temp;
                    self.line.x2 =
                        (self.line.x1 + v * (self.line.x2 - self.line.x1)).clamp(-PAD, w);
                    self.line.y2 =
                        (self.line.y1 + v * (self.line.y2 - self.line.y1)).clamp(-PAD, h);
                }
                1 => {
                    self.line.x2 = (self.line.x2 + plane.norm() * scale).clamp(-PAD, w);
                    self.line.y2 = (self.line.y2 + plane.norm() * scale).clamp(-PAD, h);
                }
                _ => {
                    self.line.width = (self.line.width + plane.norm()).clamp(1.0, MAX_LINE_WIDTH);
                }
            }
            if self.valid() {
                break;
            }
            if rollback > 0 {
                *self = save;
                rollback -= 1;
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.line.valid()
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        self.line.rasterize(rc)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        self.line.draw(pixmap, color, scale)
    }

    pub fn svg(&self, attrs: &str) -> String {
        self.line.svg(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn plane(w: i32, h: i32, seed: u64) -> Plane {
        Plane::new(w, h, rand_pcg::Pcg64Mcg::seed_from_u64(seed))
    }

    #[test]
    fn mutate_preserves_validity() {
        let mut p = plane(64, 64, 14);
        let mut l = Line::new();
        l.init(&mut p);
        for _ in 0..2000 {
            l.mutate(&mut p, 1.0);
            assert!(l.valid());
        }
    }

    #[test]
    fn radial_endpoint_stays_pinned() {
        let mut p = plane(100, 100, 15);
        let mut l = RadialLine::new(0.5, 0.5);
        l.init(&mut p);
        assert_eq!((l.line.x1, l.line.y1), (50.0, 50.0));
        for _ in 0..1000 {
            l.mutate(&mut p, 1.0);
            assert_eq!((l.line.x1, l.line.y1), (50.0, 50.0));
            assert!(l.valid());
        }
    }

    #[test]
    fn rasterize_stays_in_bounds() {
        let mut p = plane(32, 32, 16);
        let mut rc = RasterContext::new(32, 32);
        for _ in 0..100 {
            let mut l = Line::new();
            l.init(&mut p);
            for s in l.rasterize(&mut rc) {
                assert!(s.y >= 0 && s.y < 32 && s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < 32);
            }
        }
    }
}
