mod chromosome;
mod engine;
mod fitness;
mod progress;
mod variation;

pub use chromosome::*;
pub use engine::*;
pub use fitness::*;
pub use progress::*;
pub use variation::*;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SchedulerError};
use crate::model::{build_required_classes, total_required, ClassRequirement, ScheduleModel};
use crate::types::SectionId;

fn solve_bar(quiet: bool) -> ProgressBar {
    if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar
    }
}

/// Main entry point for schedule generation: derive the required-class bag,
/// run the evolutionary search, return the top-ranked distinct solutions.
pub fn solve(
    model: &ScheduleModel,
    progress: Arc<SolveProgress>,
    quiet: bool,
) -> Result<Vec<RankedSolution>> {
    let mut rng = ChaCha8Rng::seed_from_u64(model.ga_params.seed);
    let bag = build_required_classes(model, &mut rng);

    if total_required(&bag) == 0 {
        progress.set_status(SolveStatus::Completed);
        return Err(SchedulerError::RequirementInfeasible.into());
    }

    let bar = solve_bar(quiet);
    bar.set_message("Initializing population...");

    let mut engine = EvolutionEngine::new(model, &bag, progress);
    engine.initialize_population(&mut rng);
    engine.evolve(&mut rng, &bar);
    bar.finish_with_message("Search finished");

    finish(engine)
}

/// Repair-path entry point: run the driver over an externally seeded
/// population instead of random initialisation. The bag still comes from the
/// model so coverage keeps its meaning.
pub fn solve_seeded(
    model: &ScheduleModel,
    bag: &BTreeMap<SectionId, Vec<ClassRequirement>>,
    population: Vec<Chromosome>,
    progress: Arc<SolveProgress>,
) -> Result<Vec<RankedSolution>> {
    let mut rng = ChaCha8Rng::seed_from_u64(model.ga_params.seed);

    let mut engine = EvolutionEngine::new(model, bag, progress);
    engine.seed_population(population);
    engine.evolve(&mut rng, &ProgressBar::hidden());

    finish(engine)
}

fn finish(engine: EvolutionEngine<'_>) -> Result<Vec<RankedSolution>> {
    let best = engine
        .best
        .as_ref()
        .ok_or(SchedulerError::NoSolution {
            violations: BTreeMap::new(),
        })?;

    if best.fitness <= FITNESS_FLOOR {
        return Err(SchedulerError::NoSolution {
            violations: best.violations.clone(),
        }
        .into());
    }

    Ok(engine.top_solutions())
}
