// engine/shape/mod.rs
mod curve;
mod ellipse;
mod factory;
mod line;
mod polygon;
mod rectangle;
mod triangle;

pub use curve::{Cubic, Quadratic};
pub use ellipse::{Ellipse, EllipseKind, RotatedEllipse};
pub use factory::{BasicShapes, SelectedShapes, ShapeFactory};
pub use line::{Line, RadialLine};
pub use polygon::Polygon;
pub use rectangle::{Rectangle, RotatedRectangle};
pub use triangle::Triangle;

use rand::Rng;
use rand_distr::StandardNormal;
use rand_pcg::Pcg64Mcg;
use tiny_skia::{LineCap, LineJoin, Paint, Pixmap, Stroke, Transform};

use super::color::Color;
use super::raster::Scanline;
use super::scan::RasterContext;

/// Shapes may overhang the image by this margin so edge pixels are not
/// starved of candidates.
pub(crate) const PAD: f64 = 16.0;

/// Per-worker geometric context: image dimensions plus the worker's own RNG.
pub struct Plane {
    pub w: i32,
    pub h: i32,
    pub rng: Pcg64Mcg,
}

impl Plane {
    pub fn new(w: i32, h: i32, rng: Pcg64Mcg) -> Self {
        Self { w, h, rng }
    }

    pub(crate) fn random_w(&mut self) -> f64 {
        self.rng.gen::<f64>() * self.w as f64
    }

    pub(crate) fn random_h(&mut self) -> f64 {
        self.rng.gen::<f64>() * self.h as f64
    }

    /// Unit-variance Gaussian draw.
    pub(crate) fn norm(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

/// Discriminants used by the factory wire format. 0 is the wildcard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Any,
    Triangle,
    Rectangle,
    Ellipse,
    Circle,
    RotatedRectangle,
    Line,
    Quadratic,
    RotatedEllipse,
    Polygon,
}

impl ShapeType {
    pub const COUNT: u32 = 9;

    /// Types 1..=9 in discriminant order.
    pub(crate) const CONCRETE: [ShapeType; 9] = [
        ShapeType::Triangle,
        ShapeType::Rectangle,
        ShapeType::Ellipse,
        ShapeType::Circle,
        ShapeType::RotatedRectangle,
        ShapeType::Line,
        ShapeType::Quadratic,
        ShapeType::RotatedEllipse,
        ShapeType::Polygon,
    ];

    pub fn from_index(v: u32) -> Option<ShapeType> {
        if v == 0 {
            Some(ShapeType::Any)
        } else {
            Self::CONCRETE.get(v as usize - 1).copied()
        }
    }
}

/// One geometric primitive. A sum type rather than trait objects: every
/// operation dispatches by match, candidates are cloned by value inside the
/// search loop, and the JSON wire format enumerates the same variants.
#[derive(Clone, Debug)]
pub enum Shape {
    Triangle(Triangle),
    Rectangle(Rectangle),
    RotatedRectangle(RotatedRectangle),
    Ellipse(Ellipse),
    RotatedEllipse(RotatedEllipse),
    Line(Line),
    RadialLine(RadialLine),
    Quadratic(Quadratic),
    Cubic(Cubic),
    Polygon(Polygon),
}

impl Shape {
    /// Randomize geometry inside the padded plane, then nudge the result
    /// into validity with a bounded-rollback mutation.
    pub fn init(&mut self, plane: &mut Plane) {
        match self {
            Shape::Triangle(s) => s.init(plane),
            Shape::Rectangle(s) => s.init(plane),
            Shape::RotatedRectangle(s) => s.init(plane),
            Shape::Ellipse(s) => s.init(plane),
            Shape::RotatedEllipse(s) => s.init(plane),
            Shape::Line(s) => s.init(plane),
            Shape::RadialLine(s) => s.init(plane),
            Shape::Quadratic(s) => s.init(plane),
            Shape::Cubic(s) => s.init(plane),
            Shape::Polygon(s) => s.init(plane),
        }
    }

    /// Apply one random action; retries internally until the shape is valid.
    pub fn mutate(&mut self, plane: &mut Plane, temp: f64) {
        match self {
            Shape::Triangle(s) => s.mutate(plane, temp),
            Shape::Rectangle(s) => s.mutate(plane, temp),
            Shape::RotatedRectangle(s) => s.mutate(plane, temp),
            Shape::Ellipse(s) => s.mutate(plane, temp),
            Shape::RotatedEllipse(s) => s.mutate(plane, temp),
            Shape::Line(s) => s.mutate(plane, temp),
            Shape::RadialLine(s) => s.mutate(plane, temp),
            Shape::Quadratic(s) => s.mutate(plane, temp),
            Shape::Cubic(s) => s.mutate(plane, temp),
            Shape::Polygon(s) => s.mutate(plane, temp),
        }
    }

    pub fn valid(&self) -> bool {
        match self {
            Shape::Triangle(s) => s.valid(),
            Shape::Rectangle(s) => s.valid(),
            Shape::RotatedRectangle(s) => s.valid(),
            Shape::Ellipse(s) => s.valid(),
            Shape::RotatedEllipse(s) => s.valid(),
            Shape::Line(s) => s.valid(),
            Shape::RadialLine(s) => s.valid(),
            Shape::Quadratic(s) => s.valid(),
            Shape::Cubic(s) => s.valid(),
            Shape::Polygon(s) => s.valid(),
        }
    }

    /// Produce the clipped span list for this shape. The slice borrows the
    /// context's buffer and dies at the next rasterize on the same context.
    pub fn rasterize<'a>(&self, rc: &'a mut RasterContext) -> &'a [Scanline] {
        match self {
            Shape::Triangle(s) => s.rasterize(rc),
            Shape::Rectangle(s) => s.rasterize(rc),
            Shape::RotatedRectangle(s) => s.rasterize(rc),
            Shape::Ellipse(s) => s.rasterize(rc),
            Shape::RotatedEllipse(s) => s.rasterize(rc),
            Shape::Line(s) => s.rasterize(rc),
            Shape::RadialLine(s) => s.rasterize(rc),
            Shape::Quadratic(s) => s.rasterize(rc),
            Shape::Cubic(s) => s.rasterize(rc),
            Shape::Polygon(s) => s.rasterize(rc),
        }
    }

    /// Draw onto the output canvas at a uniform scale. Never called inside
    /// the search loop.
    pub fn draw(&self, pixmap: &mut Pixmap, color: Color, scale: f32) {
        match self {
            Shape::Triangle(s) => s.draw(pixmap, color, scale),
            Shape::Rectangle(s) => s.draw(pixmap, color, scale),
            Shape::RotatedRectangle(s) => s.draw(pixmap, color, scale),
            Shape::Ellipse(s) => s.draw(pixmap, color, scale),
            Shape::RotatedEllipse(s) => s.draw(pixmap, color, scale),
            Shape::Line(s) => s.draw(pixmap, color, scale),
            Shape::RadialLine(s) => s.draw(pixmap, color, scale),
            Shape::Quadratic(s) => s.draw(pixmap, color, scale),
            Shape::Cubic(s) => s.draw(pixmap, color, scale),
            Shape::Polygon(s) => s.draw(pixmap, color, scale),
        }
    }

    /// Emit an SVG element carrying the given fill/stroke attributes.
    pub fn svg(&self, attrs: &str) -> String {
        match self {
            Shape::Triangle(s) => s.svg(attrs),
            Shape::Rectangle(s) => s.svg(attrs),
            Shape::RotatedRectangle(s) => s.svg(attrs),
            Shape::Ellipse(s) => s.svg(attrs),
            Shape::RotatedEllipse(s) => s.svg(attrs),
            Shape::Line(s) => s.svg(attrs),
            Shape::RadialLine(s) => s.svg(attrs),
            Shape::Quadratic(s) => s.svg(attrs),
            Shape::Cubic(s) => s.svg(attrs),
            Shape::Polygon(s) => s.svg(attrs),
        }
    }

    pub fn kind(&self) -> ShapeType {
        match self {
            Shape::Triangle(_) => ShapeType::Triangle,
            Shape::Rectangle(_) => ShapeType::Rectangle,
            Shape::RotatedRectangle(_) => ShapeType::RotatedRectangle,
            Shape::Ellipse(s) => {
                if s.kind == EllipseKind::Free {
                    ShapeType::Ellipse
                } else {
                    ShapeType::Circle
                }
            }
            Shape::RotatedEllipse(_) => ShapeType::RotatedEllipse,
            Shape::Line(_) | Shape::RadialLine(_) => ShapeType::Line,
            Shape::Quadratic(_) | Shape::Cubic(_) => ShapeType::Quadratic,
            Shape::Polygon(_) => ShapeType::Polygon,
        }
    }
}

// ---------- shared geometry helpers ----------

pub(crate) fn radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub(crate) fn degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Rotate (x, y) about (x0, y0); cos/sin are precomputed by the caller.
pub(crate) fn rotate_about(x: f64, y: f64, x0: f64, y0: f64, cos: f64, sin: f64) -> (f64, f64) {
    let xd = x - x0;
    let yd = y - y0;
    (xd * cos - yd * sin + x0, xd * sin + yd * cos + y0)
}

pub(crate) fn rotate(x: f64, y: f64, theta: f64) -> (f64, f64) {
    let (sin, cos) = theta.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

// ---------- shared output-canvas helpers ----------

/// Output canvases draw in image coordinates, shifted half a pixel to land
/// on pixel centers and scaled up to the output resolution.
pub(crate) fn output_transform(scale: f32) -> Transform {
    Transform::from_translate(0.5, 0.5).post_scale(scale, scale)
}

pub(crate) fn shape_paint(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

pub(crate) fn round_stroke(width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}
