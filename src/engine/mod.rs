// engine/mod.rs
mod color;
mod color_picker;
mod diff;
mod error;
mod model;
mod optimize;
mod raster;
mod scan;
mod shape;
mod state;
mod worker;

pub use color::{average_color, color_at_point, most_frequent_color, Color};
pub use color_picker::{ColorPicker, PALETTE1};
pub use diff::{diff_full, diff_partial};
pub use error::EngineError;
pub use model::{pixmap_to_image, Model, SearchParams};
pub use optimize::{anneal, hill_climb, pre_anneal};
pub use raster::{copy_lines, draw_lines, Raster, Scanline};
pub use scan::RasterContext;
pub use shape::{
    BasicShapes, Cubic, Ellipse, EllipseKind, Line, Plane, Polygon, Quadratic, RadialLine,
    Rectangle, RotatedEllipse, RotatedRectangle, SelectedShapes, Shape, ShapeFactory, ShapeType,
    Triangle,
};
pub use state::State;
pub use worker::Worker;
