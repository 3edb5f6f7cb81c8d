// -----------------------------------------------------------------------------
// Search state: one (shape, alpha) candidate with a lazily cached energy
// -----------------------------------------------------------------------------

use rand::Rng;

use super::worker::Worker;
use super::shape::Shape;

/// A score below zero marks the cache as stale.
const STALE: f64 = -1.0;

#[derive(Clone, Debug)]
pub struct State {
    pub shape: Shape,
    pub alpha: i32,
    pub mutate_alpha: bool,
    pub score: f64,
}

impl State {
    /// Alpha 0 asks the optimizer to search alpha as well, starting at 128.
    pub fn new(shape: Shape, alpha: i32) -> Self {
        let (alpha, mutate_alpha) = if alpha == 0 { (128, true) } else { (alpha, false) };
        Self { shape, alpha: alpha.clamp(1, 255), mutate_alpha, score: STALE }
    }

    /// The worker's energy for this candidate, computed once and cached
    /// until the next move.
    pub fn energy(&mut self, worker: &mut Worker) -> f64 {
        if self.score < 0.0 {
            self.score = worker.energy(&self.shape, self.alpha);
        }
        self.score
    }

    /// Mutate in place and return the pre-move state as an undo token.
    pub fn do_move(&mut self, worker: &mut Worker, temp: f64) -> State {
        let undo = self.clone();
        self.shape.mutate(&mut worker.plane, temp);
        if self.mutate_alpha {
            let jitter = worker.plane.rng.gen_range(-10..=10);
            self.alpha = (self.alpha + jitter).clamp(1, 255);
        }
        self.score = STALE;
        undo
    }

    pub fn undo_move(&mut self, undo: State) {
        *self = undo;
    }

    /// Force the next energy call to re-evaluate (used when the baseline
    /// raster changes under the state).
    pub fn invalidate(&mut self) {
        self.score = STALE;
    }
}
