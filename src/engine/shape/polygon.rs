use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_skia::{FillRule, PathBuilder, Pixmap};

use super::{output_transform, rotate_about, shape_paint, Plane, PAD};
use crate::engine::color::Color;
use crate::engine::raster::Scanline;
use crate::engine::scan::RasterContext;

/// N-gon with float vertices; optionally constrained to stay convex.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Polygon {
    #[serde(rename = "Order")]
    pub order: usize,
    #[serde(rename = "Convex")]
    pub convex: bool,
    #[serde(
        rename = "X",
        serialize_with = "ser_vertices",
        deserialize_with = "de_vertices"
    )]
    pub x: Vec<f64>,
    #[serde(
        rename = "Y",
        serialize_with = "ser_vertices",
        deserialize_with = "de_vertices"
    )]
    pub y: Vec<f64>,
}

// Configs written by hand carry `"X": null`; uninitialized polygons
// serialize the same way.
fn ser_vertices<S: Serializer>(v: &Vec<f64>, s: S) -> Result<S::Ok, S::Error> {
    if v.is_empty() {
        s.serialize_none()
    } else {
        v.serialize(s)
    }
}

fn de_vertices<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    Ok(Option::<Vec<f64>>::deserialize(d)?.unwrap_or_default())
}

impl Polygon {
    pub fn new(order: usize, convex: bool) -> Self {
        Self { order: order.max(3), convex, x: Vec::new(), y: Vec::new() }
    }

    pub fn init(&mut self, plane: &mut Plane) {
        self.order = self.order.max(3);
        self.x = vec![0.0; self.order];
        self.y = vec![0.0; self.order];
        self.x[0] = plane.random_w();
        self.y[0] = plane.random_h();
        for i in 1..self.order {
            self.x[i] = self.x[0] + plane.rng.gen::<f64>() * 40.0 - 20.0;
            self.y[i] = self.y[0] + plane.rng.gen::<f64>() * 40.0 - 20.0;
        }
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
            let save = self.clone();
            match plane.rng.gen_range(0..4) {
                0 => {
                    let i = plane.rng.gen_range(0..self.order);
                    self.x[i] = (self.x[i] + plane.norm() * scale).clamp(-PAD, w);
                    self.y[i] = (self.y[i] + plane.norm() * scale).clamp(-PAD, h);
                }
                1 => {
                    let i = plane.rng.gen_range(0..self.order);
                    let j = plane.rng.gen_range(0..self.order);
                    self.x.swap(i, j);
                    self.y.swap(i, j);
                }
                2 => {
                    let a = plane.norm() * scale;
                    let b = plane.norm() * scale;
                    for i in 0..self.order {
                        self.x[i] = (self.x[i] + a).clamp(-PAD, w);
                        self.y[i] = (self.y[i] + b).clamp(-PAD, h);
                    }
                }
                _ => {
                    let n = self.order as f64;
                    let cx = self.x.iter().sum::<f64>() / n;
                    let cy = self.y.iter().sum::<f64>() / n;
                    let theta = plane.norm() * temp * R;
                    let (sin, cos) = theta.sin_cos();
                    for i in 0..self.order {
                        let (a, b) = rotate_about(self.x[i], self.y[i], cx, cy, cos, sin);
                        self.x[i] = a.clamp(-PAD, w);
                        self.y[i] = b.clamp(-PAD, h);
                    }
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

    /// Unconstrained polygons are always valid; convex ones require every
    /// consecutive edge pair to turn the same way.
    pub fn valid(&self) -> bool {
        if self.x.len() < self.order || self.order < 3 {
            return false;
        }
        if !self.convex {
            return true;
        }
        let mut sign = false;
        for a in 0..self.order {
            let i = a % self.order;
            let j = (a + 1) % self.order;
            let k = (a + 2) % self.order;
            let c = cross3(
                self.x[i], self.y[i], self.x[j], self.y[j], self.x[k], self.y[k],
            );
            if a == 0 {
                sign = c > 0.0;
            } else if (c > 0.0) != sign {
                return false;
            }
        }
        true
    }

    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        let pts: Vec<(f64, f64)> = self
            .x
            .iter()
            .zip(self.y.iter())
            .map(|(&x, &y)| (x, y))
            .collect();
        rc.fill_path(&pts)
    }

    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        if self.x.len() < 3 {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(self.x[0] as f32, self.y[0] as f32);
        for i in 1..self.order {
            pb.line_to(self.x[i] as f32, self.y[i] as f32);
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
        let points: Vec<String> = self
            .x
            .iter()
            .zip(self.y.iter())
            .map(|(x, y)| format!("{x:.6},{y:.6}"))
            .collect();
        format!("<polygon {} points=\"{}\" />", attrs, points.join(","))
    }
}

fn cross3(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> f64 {
    let dx1 = x2 - x1;
    let dy1 = y2 - y1;
    let dx2 = x3 - x2;
    let dy2 = y3 - y2;
    dx1 * dy2 - dy1 * dx2
}
