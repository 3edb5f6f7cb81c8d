// -----------------------------------------------------------------------------
// Local search: hill climbing and simulated annealing over (shape, alpha)
// -----------------------------------------------------------------------------

use rand::Rng;

use super::state::State;
use super::worker::Worker;

/// Greedy local search: accept only strictly improving moves, stop after
/// `max_age` consecutive non-improvements. Ties count as non-improving.
pub fn hill_climb(worker: &mut Worker, state: &State, max_age: i32) -> State {
    let mut state = state.clone();
    let mut best_energy = state.energy(worker);
    let mut best_state = state.clone();
    let mut step = 0;
    let mut age = 0;
    while age < max_age {
        let undo = state.do_move(worker, 1.0);
        let energy = state.energy(worker);
        if energy >= best_energy {
            state.undo_move(undo);
            age += 1;
        } else {
            log::trace!("step: {step}, energy: {energy:.6}");
            best_energy = energy;
            best_state = state.clone();
            age = 0;
        }
        step += 1;
    }
    best_state
}

/// Average |ΔE| over a number of random moves; used to pick an annealing
/// temperature scale for a given image.
pub fn pre_anneal(worker: &mut Worker, state: &State, iterations: i32) -> f64 {
    let mut state = state.clone();
    let mut previous = state.energy(worker);
    let mut total = 0.0;
    for _ in 0..iterations {
        state.do_move(worker, 1.0);
        let energy = state.energy(worker);
        total += (energy - previous).abs();
        previous = energy;
    }
    total / iterations as f64
}

/// Simulated annealing on an exponential schedule from `max_temp` down to
/// `min_temp`: worsening moves are accepted with probability
/// `exp(-ΔE / T)`.
pub fn anneal(
    worker: &mut Worker,
    state: &State,
    max_temp: f64,
    min_temp: f64,
    steps: i32,
) -> State {
    let factor = -(max_temp / min_temp).ln();
    let mut state = state.clone();
    let mut best_energy = state.energy(worker);
    let mut best_state = state.clone();
    let mut previous_energy = best_energy;
    for step in 0..steps {
        let pct = step as f64 / (steps - 1) as f64;
        let temp = max_temp * (factor * pct).exp();
        let undo = state.do_move(worker, 1.0);
        let energy = state.energy(worker);
        let change = energy - previous_energy;
        if change > 0.0 && (-change / temp).exp() < worker.plane.rng.gen::<f64>() {
            state.undo_move(undo);
        } else {
            previous_energy = energy;
            if energy < best_energy {
                log::trace!(
                    "step: {} of {} ({:.1}%), temp: {:.3}, energy: {:.6}",
                    step,
                    steps,
                    step as f64 * 100.0 / steps as f64,
                    temp,
                    energy
                );
                best_energy = energy;
                best_state = state.clone();
            }
        }
    }
    best_state
}
