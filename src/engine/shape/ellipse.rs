use rand::Rng;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, PathBuilder, Pixmap, Transform};

use super::{output_transform, radians, rotate, shape_paint, Plane};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

/// Ellipse sub-variant selector, serialized as the wire integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EllipseKind {
    /// Independent radii.
    #[default]
    Free,
    /// rx == ry.
    Circle,
    /// Circle whose center is fixed by the caller (normalized CX/CY).
    Centered,
    /// Radii are given by the caller and never mutated.
    FixedRadius,
}

impl TryFrom<u8> for EllipseKind {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(EllipseKind::Free),
            1 => Ok(EllipseKind::Circle),
            2 => Ok(EllipseKind::Centered),
            3 => Ok(EllipseKind::FixedRadius),
            other => Err(format!("unknown EllipseType {other}")),
        }
    }
}

impl From<EllipseKind> for u8 {
    fn from(k: EllipseKind) -> u8 {
        match k {
            EllipseKind::Free => 0,
            EllipseKind::Circle => 1,
            EllipseKind::Centered => 2,
            EllipseKind::FixedRadius => 3,
        }
    }
}

/// Axis-aligned ellipse with integer center and radii.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ellipse {
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
    #[serde(rename = "Rx")]
    pub rx: i32,
    #[serde(rename = "Ry")]
    pub ry: i32,
    #[serde(rename = "EllipseType")]
    pub kind: EllipseKind,
    #[serde(rename = "CX")]
    pub cx: f64,
    #[serde(rename = "CY")]
    pub cy: f64,
    #[serde(rename = "MaxRadius")]
    pub max_radius: i32,
}

impl Ellipse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circle() -> Self {
        Self { kind: EllipseKind::Circle, ..Self::default() }
    }

    pub fn centered_circle(cx: f64, cy: f64) -> Self {
        Self { kind: EllipseKind::Centered, cx, cy, ..Self::default() }
    }

    pub fn fixed_circle(r: i32) -> Self {
        Self { kind: EllipseKind::FixedRadius, rx: r, ry: r, ..Self::default() }
    }

    fn is_circular(&self) -> bool {
        matches!(self.kind, EllipseKind::Circle | EllipseKind::Centered)
    }

    pub fn init(&mut self, plane: &mut Plane) {
        let mut maxr = 32;
        if self.max_radius > 0 && maxr > self.max_radius {
            maxr = self.max_radius - 1;
        }
        if self.kind == EllipseKind::Centered {
            self.x = (self.cx * plane.w as f64) as i32;
            self.y = (self.cy * plane.h as f64) as i32;
        } else {
            self.x = plane.rng.gen_range(0..plane.w);
            self.y = plane.rng.gen_range(0..plane.h);
        }
        if maxr > 1 {
            match self.kind {
                EllipseKind::Free => {
                    self.rx = plane.rng.gen_range(0..maxr) + 1;
                    self.ry = plane.rng.gen_range(0..maxr) + 1;
                }
                EllipseKind::Circle | EllipseKind::Centered => {
                    self.rx = plane.rng.gen_range(0..maxr) + 1;
                    self.ry = self.rx;
                }
                EllipseKind::FixedRadius => {}
            }
        } else if self.kind != EllipseKind::FixedRadius {
            self.rx = maxr.max(1);
            self.ry = self.rx;
        }
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        let w = plane.w;
        let h = plane.h;
        let maxr = (if self.max_radius > 0 { self.max_radius } else { w - 1 }).max(1);
        let scale = 16.0 * temp;

        let action = match self.kind {
            EllipseKind::FixedRadius => 0,
            EllipseKind::Centered => 1,
            _ => plane.rng.gen_range(0..3),
        };
        match action {
            0 => {
                let a = (plane.norm() * scale) as i32;
                let b = (plane.norm() * scale) as i32;
                self.x = (self.x + a).clamp(0, w - 1);
                self.y = (self.y + b).clamp(0, h - 1);
            }
            1 => {
                let a = (plane.norm() * temp * maxr as f64) as i32;
                self.rx = (self.rx + a).clamp(1, maxr);
                if self.is_circular() {
                    self.ry = self.rx;
                }
            }
            _ => {
                let a = (plane.norm() * temp * maxr as f64) as i32;
                self.ry = (self.ry + a).clamp(1, maxr);
                if self.is_circular() {
                    self.rx = self.ry;
                }
            }
        }
    }

    pub fn valid(&self) -> bool {
        let cap_ok = self.max_radius <= 0
            || (self.rx <= self.max_radius && self.ry <= self.max_radius);
        self.rx >= 1 && self.ry >= 1 && cap_ok
    }

    /// Symmetric row walk: for each row the half-width follows from the
    /// circle equation scaled by the aspect ratio.
    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        let (w, h) = (rc.w, rc.h);
        let (cx, cy, rx, ry) = (self.x, self.y, self.rx.max(1), self.ry.max(1));
        let aspect = rx as f64 / ry as f64;
        let lines = rc.reset_lines();
        for y in (cy - ry + 1).max(0)..=(cy + ry - 1).min(h - 1) {
            let dy = (y - cy).abs();
            let s = (((ry * ry - dy * dy) as f64).sqrt() * aspect) as i32;
            let x1 = (cx - s).max(0);
            let x2 = (cx + s).min(w - 1);
            if x2 >= x1 {
                lines.push(Scanline { y, x1, x2, alpha: 0xffff });
            }
        }
        rc.lines()
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        if let Some(rect) = tiny_skia::Rect::from_ltrb(
            (self.x - self.rx) as f32,
            (self.y - self.ry) as f32,
            (self.x + self.rx) as f32,
            (self.y + self.ry) as f32,
        ) {
            let path = PathBuilder::from_oval(rect);
            if let Some(path) = path {
                pixmap.fill_path(
                    &path,
                    &shape_paint(color),
                    FillRule::Winding,
                    output_transform(scale),
                    None,
                );
            }
        }
    }

    pub fn svg(&self, attrs: &str) -> String {
        format!(
            "<ellipse {} cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" />",
            attrs, self.x, self.y, self.rx, self.ry
        )
    }
}

/// Ellipse with float center/radii and a rotation in degrees.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatedEllipse {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Rx")]
    pub rx: f64,
    #[serde(rename = "Ry")]
    pub ry: f64,
    #[serde(rename = "Angle")]
    pub angle: f64,
    #[serde(rename = "MaxRadius")]
    pub max_radius: i32,
}

impl RotatedEllipse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, plane: &mut Plane) {
        let mut maxr = 32.0;
        if self.max_radius > 0 && maxr > self.max_radius as f64 {
            maxr = self.max_radius as f64 - 1.0;
        }
        self.x = plane.random_w();
        self.y = plane.random_h();
        self.rx = plane.rng.gen::<f64>() * maxr + 1.0;
        self.ry = plane.rng.gen::<f64>() * maxr + 1.0;
        self.angle = plane.rng.gen::<f64>() * 360.0;
    }

    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        let w = plane.w;
        let h = plane.h;
        let maxr =
            (if self.max_radius > 0 { self.max_radius as f64 } else { (w - 1) as f64 }).max(1.0);
        let scale = 16.0 * temp;
        match plane.rng.gen_range(0..3) {
            0 => {
                self.x = (self.x + plane.norm() * scale).clamp(0.0, (w - 1) as f64);
                self.y = (self.y + plane.norm() * scale).clamp(0.0, (h - 1) as f64);
            }
            1 => {
                self.rx = (self.rx + plane.norm() * scale).clamp(1.0, maxr);
                self.ry = (self.ry + plane.norm() * scale).clamp(1.0, maxr);
            }
            _ => {
                self.angle += plane.norm() * 32.0 * temp;
            }
        }
    }

    pub fn valid(&self) -> bool {
        let cap_ok = self.max_radius <= 0
            || (self.rx <= self.max_radius as f64 && self.ry <= self.max_radius as f64);
        self.rx >= 1.0 && self.ry >= 1.0 && cap_ok
    }

    /// The boundary is sampled into a polygon and filled; 64 points keeps
    /// the chord error under a quarter pixel for the radii the search uses.
    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        const N: usize = 64;
        let theta = radians(self.angle);
        let mut pts = [(0.0f64, 0.0f64); N];
        for (i, p) in pts.iter_mut().enumerate() {
            let a = i as f64 / N as f64 * 2.0 * std::f64::consts::PI;
            let (x, y) = rotate(self.rx * a.cos(), self.ry * a.sin(), theta);
            *p = (x + self.x, y + self.y);
        }
        rc.fill_path(&pts)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        if let Some(rect) = tiny_skia::Rect::from_ltrb(
            (self.x - self.rx) as f32,
            (self.y - self.ry) as f32,
            (self.x + self.rx) as f32,
            (self.y + self.ry) as f32,
        ) {
            if let Some(path) = PathBuilder::from_oval(rect) {
                let rotated = path.transform(Transform::from_rotate_at(
                    self.angle as f32,
                    self.x as f32,
                    self.y as f32,
                ));
                if let Some(path) = rotated {
                    pixmap.fill_path(
                        &path,
                        &shape_paint(color),
                        FillRule::Winding,
                        output_transform(scale),
                        None,
                    );
                }
            }
        }
    }

    pub fn svg(&self, attrs: &str) -> String {
        format!(
            "<g transform=\"translate({:.6} {:.6}) rotate({:.6}) scale({:.6} {:.6})\"><ellipse {} cx=\"0\" cy=\"0\" rx=\"1\" ry=\"1\" /></g>",
            self.x, self.y, self.angle, self.rx, self.ry, attrs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn plane(seed: u64) -> Plane {
        Plane::new(60, 40, rand_pcg::Pcg64Mcg::seed_from_u64(seed))
    }

    #[test]
    fn mutate_preserves_validity() {
        let mut p = plane(8);
        let mut e = Ellipse::new();
        e.init(&mut p);
        for _ in 0..2000 {
            e.mutate(&mut p, 1.0);
            assert!(e.valid());
        }
    }

    #[test]
    fn circle_keeps_radii_equal() {
        let mut p = plane(9);
        let mut e = Ellipse::circle();
        e.init(&mut p);
        for _ in 0..500 {
            e.mutate(&mut p, 1.0);
            assert_eq!(e.rx, e.ry);
        }
    }

    #[test]
    fn centered_circle_never_moves() {
        let mut p = plane(10);
        let mut e = Ellipse::centered_circle(0.5, 0.5);
        e.init(&mut p);
        assert_eq!((e.x, e.y), (30, 20));
        for _ in 0..500 {
            e.mutate(&mut p, 1.0);
            assert_eq!((e.x, e.y), (30, 20));
        }
    }

    #[test]
    fn fixed_radius_never_resizes() {
        let mut p = plane(11);
        let mut e = Ellipse::fixed_circle(4);
        e.init(&mut p);
        for _ in 0..500 {
            e.mutate(&mut p, 1.0);
            assert_eq!((e.rx, e.ry), (4, 4));
        }
    }

    #[test]
    fn rasterize_is_clipped_and_row_ordered() {
        let mut rc = RasterContext::new(60, 40);
        let e = Ellipse { x: 2, y: 2, rx: 10, ry: 10, ..Ellipse::new() };
        let lines = e.rasterize(&mut rc).to_vec();
        assert!(!lines.is_empty());
        let mut prev = -1;
        for s in &lines {
            assert!(s.y >= 0 && s.y < 40 && s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < 60);
            assert!(s.y > prev);
            prev = s.y;
        }
    }

    #[test]
    fn rotated_mutate_preserves_validity() {
        let mut p = plane(12);
        let mut e = RotatedEllipse::new();
        e.init(&mut p);
        for _ in 0..2000 {
            e.mutate(&mut p, 1.0);
            assert!(e.valid());
        }
    }

    #[test]
    fn rotated_rasterize_stays_in_bounds() {
        let mut p = plane(13);
        let mut rc = RasterContext::new(60, 40);
        for _ in 0..100 {
            let mut e = RotatedEllipse::new();
            e.init(&mut p);
            for s in e.rasterize(&mut rc) {
                assert!(s.y >= 0 && s.y < 40 && s.x1 >= 0 && s.x1 <= s.x2 && s.x2 < 60);
            }
        }
    }
}
