use rand::Rng;
use serde::{Deserialize, Serialize};
use tiny_skia::{PathBuilder, Pixmap};

use super::{output_transform, rotate_about, round_stroke, shape_paint, Plane, PAD};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

/// Stroked quadratic bezier.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Quadratic {
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
    #[serde(rename = "Width")]
    pub width: f64,
    #[serde(rename = "MinLineWidth")]
    pub min_line_width: f64,
    #[serde(rename = "MaxLineWidth")]
    pub max_line_width: f64,
    #[serde(rename = "MinArcLength")]
    pub min_arc_length: f64,
}

impl Default for Quadratic {
    fn default() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            x3: 0.0,
            y3: 0.0,
            width: 0.5,
            min_line_width: 0.2,
            max_line_width: 0.5,
            min_arc_length: 5.0,
        }
    }
}

impl Quadratic {
    pub fn new() -> Self {
        Self::default()
    }

    fn point_at(&self, t: f64) -> (f64, f64) {
        let mt = 1.0 - t;
        let a = mt * mt;
        let b = 2.0 * mt * t;
        let c = t * t;
        (
            a * self.x1 + b * self.x2 + c * self.x3,
            a * self.y1 + b * self.y2 + c * self.y3,
        )
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x1 = plane.random_w();
        self.y1 = plane.random_h();
        self.x2 = self.x1 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.y2 = self.y1 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.x3 = self.x2 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.y3 = self.y2 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.width = 0.5;
        self.mutate_impl(plane, 1.0, 2);
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
            match plane.rng.gen_range(0..6) {
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
                    self.width = (self.width + plane.norm() * temp)
                        .clamp(self.min_line_width, self.max_line_width);
                }
                4 => {
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

    pub fn valid(&self) -> bool {
        let d12 = {
            let dx = (self.x1 - self.x2) as i64;
            let dy = (self.y1 - self.y2) as i64;
            dx * dx + dy * dy
        };
        let d23 = {
            let dx = (self.x2 - self.x3) as i64;
            let dy = (self.y2 - self.y3) as i64;
            dx * dx + dy * dy
        };
        d12 > 1 && d23 > 1 && self.arc_length() > self.min_arc_length
    }

    /// Closed-form quadratic arc length; falls back to the chord when the
    /// control polygon is nearly straight.
    fn arc_length(&self) -> f64 {
        let xv = 2.0 * (self.x2 - self.x1);
        let yv = 2.0 * (self.y2 - self.y1);
        let xw = self.x3 - 2.0 * self.x2 + self.x1;
        let yw = self.y3 - 2.0 * self.y2 + self.y1;
        let uu = 4.0 * (xw * xw + yw * yw);
        if uu < 0.0001 {
            let dx = self.x3 - self.x1;
            let dy = self.y3 - self.y1;
            return (dx * dx + dy * dy).sqrt();
        }
        let vv = 4.0 * (xv * xw + yv * yw);
        let ww = xv * xv + yv * yv;
        let t1 = 2.0 * (uu * (uu + vv + ww)).sqrt();
        let t2 = 2.0 * uu + vv;
        let t3 = vv * vv - 4.0 * uu * ww;
        let t4 = 2.0 * (uu * ww).sqrt();
        (t1 * t2 - t3 * (t2 + t1).ln() - (vv * t4 - t3 * (vv + t4).ln())) / (8.0 * uu.powf(1.5))
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        const N: usize = 24;
        let mut pts = [(0.0f64, 0.0f64); N + 1];
        for (i, p) in pts.iter_mut().enumerate() {
            *p = self.point_at(i as f64 / N as f64);
        }
        rc.stroke_path(&pts, self.width)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(self.x1 as f32, self.y1 as f32);
        pb.quad_to(self.x2 as f32, self.y2 as f32, self.x3 as f32, self.y3 as f32);
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
            "<path {} fill=\"none\" d=\"M {:.6} {:.6} Q {:.6} {:.6}, {:.6} {:.6}\" stroke-width=\"{:.6}\" />",
            attrs, self.x1, self.y1, self.x2, self.y2, self.x3, self.y3, self.width
        )
    }
}

/// Stroked cubic bezier.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Cubic {
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
    #[serde(rename = "X4")]
    pub x4: f64,
    #[serde(rename = "Y4")]
    pub y4: f64,
    #[serde(rename = "Width")]
    pub width: f64,
    #[serde(rename = "MinLineWidth")]
    pub min_line_width: f64,
    #[serde(rename = "MaxLineWidth")]
    pub max_line_width: f64,
    #[serde(rename = "MinArcLength")]
    pub min_arc_length: f64,
}

impl Default for Cubic {
    fn default() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            x3: 0.0,
            y3: 0.0,
            x4: 0.0,
            y4: 0.0,
            width: 0.5,
            min_line_width: 0.2,
            max_line_width: 0.5,
            min_arc_length: 5.0,
        }
    }
}

impl Cubic {
    pub fn new() -> Self {
        Self::default()
    }

    fn point_at(&self, t: f64) -> (f64, f64) {
        let mt = 1.0 - t;
        let t2 = t * t;
        let mt2 = mt * mt;
        let a = mt2 * mt;
        let b = mt2 * t * 3.0;
        let c = mt * t2 * 3.0;
        let d = t * t2;
        (
            a * self.x1 + b * self.x2 + c * self.x3 + d * self.x4,
            a * self.y1 + b * self.y2 + c * self.y3 + d * self.y4,
        )
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x1 = plane.random_w();
        self.y1 = plane.random_h();
        self.x2 = self.x1 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.y2 = self.y1 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.x3 = self.x2 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.y3 = self.y2 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.x4 = self.x3 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.y4 = self.y3 + plane.rng.gen::<f64>() * 40.0 - 20.0;
        self.width = 0.5;
        self.mutate_impl(plane, 1.0, 2);
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
            match plane.rng.gen_range(0..7) {
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
                    self.x4 = (self.x4 + plane.norm() * scale).clamp(-PAD, w);
                    self.y4 = (self.y4 + plane.norm() * scale).clamp(-PAD, h);
                }
                4 => {
                    self.width = (self.width + plane.norm() * temp)
                        .clamp(self.min_line_width, self.max_line_width);
                }
                5 => {
                    let a = plane.norm() * scale;
                    let b = plane.norm() * scale;
                    self.x1 = (self.x1 + a).clamp(-PAD, w);
                    self.y1 = (self.y1 + b).clamp(-PAD, h);
                    self.x2 = (self.x2 + a).clamp(-PAD, w);
                    self.y2 = (self.y2 + b).clamp(-PAD, h);
                    self.x3 = (self.x3 + a).clamp(-PAD, w);
                    self.y3 = (self.y3 + b).clamp(-PAD, h);
                    self.x4 = (self.x4 + a).clamp(-PAD, w);
                    self.y4 = (self.y4 + b).clamp(-PAD, h);
                }
                _ => {
                    let cx = (self.x1 + self.x2 + self.x3 + self.x4) / 4.0;
                    let cy = (self.y1 + self.y2 + self.y3 + self.y4) / 4.0;
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
                    let (a, b) = rotate_about(self.x4, self.y4, cx, cy, cos, sin);
                    self.x4 = a.clamp(-PAD, w);
                    self.y4 = b.clamp(-PAD, h);
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
        let seg = |ax: f64, ay: f64, bx: f64, by: f64| -> i64 {
            let dx = (ax - bx) as i64;
            let dy = (ay - by) as i64;
            dx * dx + dy * dy
        };
        seg(self.x1, self.y1, self.x2, self.y2) > 1
            && seg(self.x2, self.y2, self.x3, self.y3) > 1
            && seg(self.x3, self.y3, self.x4, self.y4) > 1
            && self.arc_length() > self.min_arc_length
    }

    /// Arc length by sampling; the closed form does not exist for cubics.
    fn arc_length(&self) -> f64 {
        const K: f64 = 1.0 / 48.0;
        let mut d = 0.0;
        let (mut x, mut y) = (self.x1, self.y1);
        let mut t = K;
        while t < 1.0 {
            let (nx, ny) = self.point_at(t);
            let dx = nx - x;
            let dy = ny - y;
            d += (dx * dx + dy * dy).sqrt();
            x = nx;
            y = ny;
            t += K;
        }
        d
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        const N: usize = 48;
        let mut pts = [(0.0f64, 0.0f64); N + 1];
        for (i, p) in pts.iter_mut().enumerate() {
            *p = self.point_at(i as f64 / N as f64);
        }
        rc.stroke_path(&pts, self.width)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(self.x1 as f32, self.y1 as f32);
        pb.cubic_to(
            self.x2 as f32,
            self.y2 as f32,
            self.x3 as f32,
            self.y3 as f32,
            self.x4 as f32,
            self.y4 as f32,
        );
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
            "<path {} fill=\"none\" d=\"M {:.6} {:.6} C {:.6} {:.6}, {:.6} {:.6}, {:.6} {:.6}\" stroke-width=\"{:.6}\" />",
            attrs,
            self.x1,
            self.y1,
            self.x2,
            self.y2,
            self.x3,
            self.y3,
            self.x4,
            self.y4,
            self.width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn plane(seed: u64) -> Plane {
        Plane::new(80, 60, rand_pcg::Pcg64Mcg::seed_from_u64(seed))
    }

    #[test]
    fn quadratic_mutate_preserves_validity() {
        let mut p = plane(17);
        let mut q = Quadratic::new();
        q.init(&mut p);
        for _ in 0..2000 {
            q.mutate(&mut p, 1.0);
            assert!(q.valid());
            assert!(q.width >= q.min_line_width && q.width <= q.max_line_width);
        }
    }

    #[test]
    fn cubic_mutate_preserves_validity() {
        let mut p = plane(18);
        let mut c = Cubic::new();
        c.init(&mut p);
        for _ in 0..2000 {
            c.mutate(&mut p, 1.0);
            assert!(c.valid());
        }
    }

    #[test]
    fn straight_quadratic_arc_length_is_the_chord() {
        let q = Quadratic {
            x1: 0.0,
            y1: 0.0,
            x2: 5.0,
            y2: 0.0,
            x3: 10.0,
            y3: 0.0,
            ..Quadratic::new()
        };
        assert!((q.arc_length() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn short_curves_are_invalid() {
        let q = Quadratic {
            x1: 0.0,
            y1: 0.0,
            x2: 1.5,
            y2: 1.5,
            x3: 3.0,
            y3: 0.0,
            ..Quadratic::new()
        };
        // Arc length well under the 5px minimum.
        assert!(!q.valid());
    }

    #[test]
    fn rasterize_stays_in_bounds() {
        let mut p = plane(19);
        let mut rc = RasterContext::new(80, 60);
        for _ in 0..50 {
            let mut q = Quadratic::new();
            q.init(&mut p);
            for s in q.rasterize(&mut rc) {
                assert!(s.y >= 0 && s.y < 60 && s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < 80);
            }
            let mut c = Cubic::new();
            c.init(&mut p);
            for s in c.rasterize(&mut rc) {
                assert!(s.y >= 0 && s.y < 60 && s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < 80);
            }
        }
    }
}
