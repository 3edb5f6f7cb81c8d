// -----------------------------------------------------------------------------
// Worker: per-thread scratch and the energy primitive
// -----------------------------------------------------------------------------

use std::sync::Arc;

use rand_pcg::Pcg64Mcg;

use super::color_picker::ColorPicker;
use super::diff::diff_partial;
use super::optimize::hill_climb;
use super::raster::{copy_lines, draw_lines, Raster};
use super::scan::RasterContext;
use super::shape::{Plane, Shape, ShapeFactory};
use super::state::State;

/// One search thread's private world: its RNG-bearing plane, rasterization
/// scratch, a compositing buffer the size of the image, and a read-only view
/// of the target and the step's current raster. Everything a candidate
/// evaluation touches lives here, so workers never synchronize inside a
/// step.
pub struct Worker {
    pub plane: Plane,
    pub rc: RasterContext,
    target: Arc<Raster>,
    current: Arc<Raster>,
    buffer: Raster,
    picker: Arc<ColorPicker>,
    pub score: f64,
    pub counter: u64,
}

impl Worker {
    pub fn new(target: Arc<Raster>, seed: u64, picker: Arc<ColorPicker>) -> Self {
        use rand::SeedableRng;
        let (w, h) = (target.w(), target.h());
        Self {
            plane: Plane::new(w, h, Pcg64Mcg::seed_from_u64(seed)),
            rc: RasterContext::new(w, h),
            current: Arc::clone(&target),
            buffer: Raster::new(w, h),
            target,
            picker,
            score: 0.0,
            counter: 0,
        }
    }

    /// Point the worker at this step's committed raster and baseline score.
    /// Resets the candidate counter.
    pub fn bind(&mut self, current: Arc<Raster>, score: f64) {
        self.current = current;
        self.score = score;
        self.counter = 0;
    }

    /// Score one candidate: rasterize, resolve its best color, composite the
    /// covered pixels into the private buffer, and return the incremental
    /// difference. Only worker-private buffers are written.
    pub fn energy(&mut self, shape: &Shape, alpha: i32) -> f64 {
        self.counter += 1;
        let lines = shape.rasterize(&mut self.rc);
        let color = self.picker.select(&self.target, &self.current, lines, alpha);
        copy_lines(&mut self.buffer, &self.current, lines);
        draw_lines(&mut self.buffer, color, lines);
        diff_partial(&self.target, &self.current, &self.buffer, self.score, lines)
    }

    /// Best of `n` independently sampled fresh states.
    pub fn best_random_state(&mut self, factory: &ShapeFactory, alpha: i32, n: i32) -> State {
        let mut best: Option<(f64, State)> = None;
        for _ in 0..n {
            let mut state = State::new(factory.make_shape(&mut self.plane), alpha);
            let energy = state.energy(self);
            if best.as_ref().map_or(true, |(e, _)| energy < *e) {
                best = Some((energy, state));
            }
        }
        let (_, state) = best.expect("n must be positive");
        state
    }

    /// Best of `m` random restarts, each refined by a hill climb allowed
    /// `age` consecutive non-improving moves.
    pub fn best_hill_climb_state(
        &mut self,
        factory: &ShapeFactory,
        alpha: i32,
        n: i32,
        age: i32,
        m: i32,
    ) -> State {
        let mut best: Option<(f64, State)> = None;
        for _ in 0..m {
            let mut state = self.best_random_state(factory, alpha, n);
            let before = state.energy(self);
            let mut state = hill_climb(self, &state, age);
            let energy = state.energy(self);
            log::trace!(
                "{}x random: {:.6} -> {}x hill climb: {:.6}",
                n,
                before,
                age,
                energy
            );
            if best.as_ref().map_or(true, |(e, _)| energy < *e) {
                best = Some((energy, state));
            }
        }
        let (_, state) = best.expect("m must be positive");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::color::Color;
    use crate::engine::diff::diff_full;
    use crate::engine::shape::{ShapeType, Triangle};

    fn worker(target: Raster, seed: u64) -> Worker {
        Worker::new(Arc::new(target), seed, Arc::new(ColorPicker::Best))
    }

    #[test]
    fn energy_matches_a_real_commit() {
        let target = Raster::uniform(32, 32, Color::new(90, 140, 40, 255));
        let current = Arc::new(Raster::uniform(32, 32, Color::new(0, 0, 0, 255)));
        let mut w = worker(target.clone(), 77);
        let score = diff_full(&target, &current);
        w.bind(Arc::clone(&current), score);

        for seed_shape in 0..20 {
            let mut shape = Shape::Triangle(Triangle::new());
            shape.init(&mut w.plane);
            let alpha = 64 + seed_shape * 9;
            let energy = w.energy(&shape, alpha);

            // Commit the same shape by hand and compare against the full
            // difference.
            let mut rc = RasterContext::new(32, 32);
            let lines = shape.rasterize(&mut rc).to_vec();
            let color = ColorPicker::Best.select(&target, &current, &lines, alpha);
            let mut after = (*current).clone();
            draw_lines(&mut after, color, &lines);
            let full = diff_full(&target, &after);
            assert!((energy - full).abs() < 1e-9, "energy {energy} vs full {full}");
        }
    }

    #[test]
    fn energy_counts_candidates() {
        let target = Raster::uniform(16, 16, Color::new(10, 10, 10, 255));
        let current = Arc::new(Raster::uniform(16, 16, Color::new(0, 0, 0, 255)));
        let score = diff_full(&target, &current);
        let mut w = worker(target, 3);
        w.bind(current, score);
        let factory = ShapeFactory::basic(&[ShapeType::Triangle]);
        let _ = w.best_random_state(&factory, 128, 25);
        assert_eq!(w.counter, 25);
    }

    #[test]
    fn empty_footprint_energy_equals_baseline() {
        let target = Raster::uniform(16, 16, Color::new(200, 0, 0, 255));
        let current = Arc::new(Raster::uniform(16, 16, Color::new(0, 0, 0, 255)));
        let mut w = worker(target.clone(), 4);
        let score = diff_full(&target, &current);
        w.bind(current, score);
        // A triangle fully outside the image covers nothing.
        let shape = Shape::Triangle(Triangle {
            x1: -40.0,
            y1: -40.0,
            x2: -20.0,
            y2: -40.0,
            x3: -30.0,
            y3: -20.0,
            max_area: 0,
        });
        let energy = w.energy(&shape, 128);
        assert!((energy - score).abs() < 1e-12);
    }
}
