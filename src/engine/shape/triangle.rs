use rand::Rng;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, PathBuilder, Pixmap};

use super::{degrees, output_transform, rotate_about, shape_paint, Plane, PAD};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

/// Triangle with float vertices and an optional area cap.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Triangle {
    #[serde(rename = "X1")]
    pub x1: f64,
    #[serde(rename = "Y1")]
    pub y1: f64,
    #[serde(rename = "X2")]
    pub x2: f64,
    #[serde(rename = "Y2")]
    pub y2: f64,
    #[serde(rename = "X3")]
    pub x3: f64,
    #[serde(rename = "Y3")]
    pub y3: f64,
    #[serde(rename = "MaxArea")]
    pub max_area: i32,
}

impl Triangle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_area(area: i32) -> Self {
        Self { max_area: area, ..Self::default() }
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x1 = plane.random_w();
        self.y1 = plane.random_h();
        self.x2 = self.x1 + plane.norm() * 32.0;
        self.y2 = self.y1 + plane.norm() * 32.0;
        self.x3 = self.x1 + plane.norm() * 32.0;
        self.y3 = self.y1 + plane.norm() * 32.0;
        self.mutate_impl(plane, 1.0, 2);
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        self.mutate_impl(plane, temp, 100);
    }

    fn mutate_impl(&mut self, plane: &mut Plane, temp: f64, mut rollback: i32) {
        const R: f64 = std::f64::consts::PI / 4.0;
        let w = plane.w as f64 - 1.0 + PAD;
        let h = plane.h as f64 - 1.0 + PAD;
        let scale = 16.0 * temp;
        loop {
            let save = *self;
            match plane.rng.gen_range(0..5) {
                0 => {
                    self.x1 = (self.x1 + plane.norm() * scale).clamp(-PAD, w);
                    self.y1 = (self.y1 + plane.norm() * scale).clamp(-PAD, h);
                }
                1 => {
                    self.x2 = (self.x2 + plane.norm() * scale).clamp(-PAD, w);
                    self.y2 = (self.y2 + plane.norm() * scale).clamp(-PAD, h);
                }
                2 => {
                    self.x3 = (self.x3 + plane.norm() * scale).clamp(-PAD, w);
                    self.y3 = (self.y3 + plane.norm() * scale).clamp(-PAD, h);
                }
                3 => {
                    let a = plane.norm() * scale;
                    let b = plane.norm() * scale;
                    self.x1 = (self.x1 + a).clamp(-PAD, w);
                    self.y1 = (self.y1 + b).clamp(-PAD, h);
                    self.x2 = (self.x2 + a).clamp(-PAD, w);
                    self.y2 = (self.y2 + b).clamp(-PAD, h);
                    self.x3 = (self.x3 + a).clamp(-PAD, w);
                    self.y3 = (self.y3 + b).clamp(-PAD, h);
                }
                _ => {
                    let cx = (self.x1 + self.x2 + self.x3) / 3.0;
                    let cy = (self.y1 + self.y2 + self.y3) / 3.0;
                    let theta = plane.norm() * temp * R;
                    let (sin, cos) = theta.sin_cos();
                    let (a, b) = rotate_about(self.x1, self.y1, cx, cy, cos, sin);
                    self.x1 = a.clamp(-PAD, w);
                    self.y1 = b.clamp(-PAD, h);
                    let (a, b) = rotate_about(self.x2, self.y2, cx, cy, cos, sin);
                    self.x2 = a.clamp(-PAD, w);
                    self.y2 = b.clamp(-PAD, h);
                    let (a, b) = rotate_about(self.x3, self.y3, cx, cy, cos, sin);
                    self.x3 = a.clamp(-PAD, w);
                    self.y3 = b.clamp(-PAD, h);
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

    /// Valid when every interior angle clears 15 degrees and, with an area
    /// cap configured, the absolute area stays under it. Degenerate vertices
    /// produce NaN angles, which fail the comparison and count as invalid.
    pub fn valid(&self) -> bool {
        if self.max_area > 0 {
            let a = (self.x1 * (self.y2 - self.y3)
                + self.x2 * (self.y3 - self.y1)
                + self.x3 * (self.y1 - self.y2))
                / 2.0;
            if a.abs() > self.max_area as f64 {
                return false;
            }
        }

        const MIN_DEGREES: f64 = 15.0;
        let angle = |ox: f64, oy: f64, px: f64, py: f64, qx: f64, qy: f64| -> f64 {
            let mut x1 = px - ox;
            let mut y1 = py - oy;
            let mut x2 = qx - ox;
            let mut y2 = qy - oy;
            let d1 = (x1 * x1 + y1 * y1).sqrt();
            let d2 = (x2 * x2 + y2 * y2).sqrt();
            x1 /= d1;
            y1 /= d1;
            x2 /= d2;
            y2 /= d2;
            degrees((x1 * x2 + y1 * y2).acos())
        };
        let a1 = angle(self.x1, self.y1, self.x2, self.y2, self.x3, self.y3);
        let a2 = angle(self.x2, self.y2, self.x1, self.y1, self.x3, self.y3);
        let a3 = 180.0 - a1 - a2;
        a1 > MIN_DEGREES && a2 > MIN_DEGREES && a3 > MIN_DEGREES
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        let pts = [(self.x1, self.y1), (self.x2, self.y2), (self.x3, self.y3)];
        rc.fill_path(&pts)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(self.x1 as f32, self.y1 as f32);
        pb.line_to(self.x2 as f32, self.y2 as f32);
        pb.line_to(self.x3 as f32, self.y3 as f32);
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.fill_path(
                &path,
                &shape_paint(color),
                FillRule::Winding,
                output_transform(scale),
                None,
            );
        }
    }

    pub fn svg(&self, attrs: &str) -> String {
        format!(
            "<polygon {} points=\"{:.6},{:.6} {:.6},{:.6} {:.6},{:.6}\" />",
            attrs, self.x1, self.y1, self.x2, self.y2, self.x3, self.y3
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn plane(seed: u64) -> Plane {
        Plane::new(64, 64, rand_pcg::Pcg64Mcg::seed_from_u64(seed))
    }

    #[test]
    fn init_produces_valid_triangles() {
        let mut p = plane(1);
        for _ in 0..200 {
            let mut t = Triangle::new();
            t.init(&mut p);
            assert!(t.valid());
        }
    }

    #[test]
    fn mutate_preserves_validity() {
        let mut p = plane(2);
        let mut t = Triangle::new();
        t.init(&mut p);
        for _ in 0..2000 {
            t.mutate(&mut p, 1.0);
            assert!(t.valid());
        }
    }

    #[test]
    fn area_cap_is_enforced() {
        let mut p = plane(3);
        for _ in 0..100 {
            let mut t = Triangle::with_max_area(60);
            t.init(&mut p);
            let a = (t.x1 * (t.y2 - t.y3) + t.x2 * (t.y3 - t.y1) + t.x3 * (t.y1 - t.y2)) / 2.0;
            assert!(a.abs() <= 60.0);
        }
    }

    #[test]
    fn degenerate_triangle_is_invalid() {
        let t = Triangle { x1: 0.0, y1: 0.0, x2: 10.0, y2: 0.0, x3: 20.0, y3: 0.0, max_area: 0 };
        assert!(!t.valid());
        let zero = Triangle::new();
        assert!(!zero.valid());
    }
}
