use rand::Rng;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, PathBuilder, Pixmap};

use super::{output_transform, radians, rotate, shape_paint, Plane};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

/// Axis-aligned rectangle held as two unordered integer corners.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rectangle {
    #[serde(rename = "X1")]
    pub x1: i32,
    #[serde(rename = "Y1")]
    pub y1: i32,
    #[serde(rename = "X2")]
    pub x2: i32,
    #[serde(rename = "Y2")]
    pub y2: i32,
}

impl Rectangle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered corners.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let (mut x1, mut x2) = (self.x1, self.x2);
        let (mut y1, mut y2) = (self.y1, self.y2);
        if x1 > x2 {
            std::mem::swap(&mut x1, &mut x2);
        }
        if y1 > y2 {
            std::mem::swap(&mut y1, &mut y2);
        }
        (x1, y1, x2, y2)
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x1 = plane.rng.gen_range(0..plane.w);
        self.y1 = plane.rng.gen_range(0..plane.h);
        self.x2 = (self.x1 + plane.rng.gen_range(0..32) + 1).clamp(0, plane.w - 1);
        self.y2 = (self.y1 + plane.rng.gen_range(0..32) + 1).clamp(0, plane.h - 1);
        self.mutate_impl(plane, 1.0, 2);
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        self.mutate_impl(plane, temp, 10);
    }

    fn mutate_impl(&mut self, plane: &mut Plane, temp: f64, mut rollback: i32) {
        let w = plane.w;
        let h = plane.h;
        let scale = 16.0 * temp;
        loop {
            let save = *self;
            match plane.rng.gen_range(0..4) {
                0 => {
                    let a = (plane.norm() * scale) as i32;
                    let b = (plane.norm() * scale) as i32;
                    self.x1 = (self.x1 + a).clamp(0, w - 1);
                    self.y1 = (self.y1 + b).clamp(0, h - 1);
                }
                1 => {
                    let a = (plane.norm() * scale) as i32;
                    let b = (plane.norm() * scale) as i32;
                    self.x2 = (self.x2 + a).clamp(0, w - 1);
                    self.y2 = (self.y2 + b).clamp(0, h - 1);
                }
                2 => {
                    let a = (plane.norm() * scale) as i32;
                    let b = (plane.norm() * scale) as i32;
                    self.x1 = (self.x1 + a).clamp(0, w - 1);
                    self.y1 = (self.y1 + b).clamp(0, h - 1);
                    self.x2 = (self.x2 + a).clamp(0, w - 1);
                    self.y2 = (self.y2 + b).clamp(0, h - 1);
                }
                _ => {
                    // diagonal slide
                    let a = (plane.norm() * scale) as i32;
                    self.x1 = (self.x1 + a).clamp(0, w - 1);
                    self.y1 = (self.y1 + a).clamp(0, h - 1);
                    self.x2 = (self.x2 + a).clamp(0, w - 1);
                    self.y2 = (self.y2 + a).clamp(0, h - 1);
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
        (self.x1 - self.x2).abs() > 2 && (self.y1 - self.y2).abs() > 2
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        let (x1, y1, x2, y2) = self.bounds();
        let (w, h) = (rc.w, rc.h);
        let lines = rc.reset_lines();
        for y in y1.max(0)..=y2.min(h - 1) {
            let a = x1.max(0);
            let b = x2.min(w - 1);
            if b >= a {
                lines.push(Scanline { y, x1: a, x2: b, alpha: 0xffff });
            }
        }
        rc.lines()
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let (x1, y1, x2, y2) = self.bounds();
        if let Some(rect) = tiny_skia::Rect::from_ltrb(
            x1 as f32,
            y1 as f32,
            (x2 + 1) as f32,
            (y2 + 1) as f32,
        ) {
            let path = PathBuilder::from_rect(rect);
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
        let (x1, y1, x2, y2) = self.bounds();
        format!(
            "<rect {} x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" />",
            attrs,
            x1,
            y1,
            x2 - x1 + 1,
            y2 - y1 + 1
        )
    }
}

/// Rectangle with a center, integer side lengths, and a rotation in degrees.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatedRectangle {
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
    #[serde(rename = "Sx")]
    pub sx: i32,
    #[serde(rename = "Sy")]
    pub sy: i32,
    #[serde(rename = "Angle")]
    pub angle: i32,
}

impl RotatedRectangle {
    pub fn new() -> Self {
        Self::default()
    }

    fn corners(&self) -> [(f64, f64); 4] {
        let sx = self.sx as f64;
        let sy = self.sy as f64;
        let angle = radians(self.angle as f64);
        let (cx, cy) = (self.x as f64, self.y as f64);
        let c = |x: f64, y: f64| {
            let (rx, ry) = rotate(x, y, angle);
            (rx + cx, ry + cy)
        };
        [
            c(-sx / 2.0, -sy / 2.0),
            c(sx / 2.0, -sy / 2.0),
            c(sx / 2.0, sy / 2.0),
            c(-sx / 2.0, sy / 2.0),
        ]
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.x = plane.rng.gen_range(0..plane.w);
        self.y = plane.rng.gen_range(0..plane.h);
        self.sx = plane.rng.gen_range(1..=32);
        self.sy = plane.rng.gen_range(1..=32);
        self.angle = plane.rng.gen_range(0..360);
        self.mutate_impl(plane, 1.0, 1);
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        self.mutate_impl(plane, temp, 10);
    }

    fn mutate_impl(&mut self, plane: &mut Plane, temp: f64, mut rollback: i32) {
        let w = plane.w;
        let h = plane.h;
        let scale = 16.0 * temp;
        loop {
            let save = *self;
            let a = (plane.norm() * scale) as i32;
            let b = (plane.norm() * scale) as i32;
            match plane.rng.gen_range(0..3) {
                0 => {
                    self.x = (self.x + a).clamp(0, w - 1);
                    self.y = (self.y + b).clamp(0, h - 1);
                }
                1 => {
                    self.sx = (self.sx + a).clamp(1, w - 1);
                    self.sy = (self.sy + b).clamp(1, h - 1);
                }
                _ => {
                    self.angle += a + a;
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

    /// Extreme aspect ratios degenerate into slivers the search wastes time
    /// on; cap at 5.
    pub fn valid(&self) -> bool {
        let (mut a, mut b) = (self.sx, self.sy);
        if a < b {
            std::mem::swap(&mut a, &mut b);
        }
        a as f64 / b as f64 <= 5.0
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        rc.fill_path(&self.corners())
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        let corners = self.corners();
        let mut pb = PathBuilder::new();
        pb.move_to(corners[0].0 as f32, corners[0].1 as f32);
        for &(x, y) in &corners[1..] {
            pb.line_to(x as f32, y as f32);
        }
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
            "<g transform=\"translate({} {}) rotate({}) scale({} {})\"><rect {} x=\"-0.5\" y=\"-0.5\" width=\"1\" height=\"1\" /></g>",
            self.x, self.y, self.angle, self.sx, self.sy, attrs
        )
    }
}
