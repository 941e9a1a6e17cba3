use indicatif::ProgressBar;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{Chromosome, Evaluator, SolveProgress, SolveStatus, Variation};
use crate::model::{ClassRequirement, ScheduleModel};
use crate::types::SectionId;

/// How many top-ranked solutions a solve returns
pub const RETURNED_SOLUTIONS: usize = 3;

/// One returned solution. `fitness` is the displayed value: when raw
/// fitness ties with the previous rank it is decremented by one so the
/// listing reads monotone; `raw_fitness` is untouched and is what every
/// internal comparison used.
#[derive(Debug, Clone)]
pub struct RankedSolution {
    pub rank: usize,
    pub fitness: f64,
    pub raw_fitness: f64,
    pub chromosome: Chromosome,
}

/// Population loop: tournament selection, recombination-or-clone, mutation,
/// elitism, stagnation-based early stopping. Sequential within a solve;
/// observers sample the shared progress record between generations.
pub struct EvolutionEngine<'a> {
    model: &'a ScheduleModel,
    evaluator: Evaluator<'a>,
    variation: Variation<'a>,
    pub population: Vec<Chromosome>,
    pub best: Option<Chromosome>,
    progress: Arc<SolveProgress>,
}

impl<'a> EvolutionEngine<'a> {
    pub fn new(
        model: &'a ScheduleModel,
        bag: &'a BTreeMap<SectionId, Vec<ClassRequirement>>,
        progress: Arc<SolveProgress>,
    ) -> Self {
        Self {
            model,
            evaluator: Evaluator::new(model, bag),
            variation: Variation::new(model, bag),
            population: Vec::new(),
            best: None,
            progress,
        }
    }

    pub fn initialize_population<R: Rng>(&mut self, rng: &mut R) {
        let pop_size = self.model.ga_params.population_size.max(1) as usize;
        self.population = Vec::with_capacity(pop_size);
        self.progress.update_initialization(0, pop_size as u32);

        for i in 0..pop_size {
            let mut chromosome = self.variation.initialize(rng);
            self.evaluator.evaluate(&mut chromosome);
            self.population.push(chromosome);
            self.progress
                .update_initialization(i as u32 + 1, pop_size as u32);
        }
    }

    /// Replace the population with externally built chromosomes (the repair
    /// path seeds variants of a prior schedule)
    pub fn seed_population(&mut self, mut population: Vec<Chromosome>) {
        for chromosome in &mut population {
            self.evaluator.evaluate(chromosome);
        }
        self.population = population;
    }

    pub fn evolve<R: Rng>(&mut self, rng: &mut R, bar: &ProgressBar) {
        let params = &self.model.ga_params;
        let generations = params.generations.max(1);
        let elite_size = params.elite_size as usize;
        let stagnation_limit = params.early_stopping_patience.max(1);

        let mut best_fitness = f64::NEG_INFINITY;
        let mut stagnation = 0u32;

        self.progress.update_generation(
            0,
            generations,
            0.0,
            0.0,
            BTreeMap::new(),
            SolveStatus::Running,
            0,
        );

        for generation in 0..generations {
            self.population
                .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

            // Strict improvement refreshes the snapshot; ties never revert it
            let current_best = &self.population[0];
            if current_best.fitness > best_fitness {
                best_fitness = current_best.fitness;
                self.best = Some(current_best.clone());
                stagnation = 0;
            } else {
                stagnation += 1;
            }

            let avg_fitness = self
                .population
                .iter()
                .map(|c| c.fitness)
                .sum::<f64>()
                / self.population.len().max(1) as f64;
            let violations = self
                .best
                .as_ref()
                .map(|b| b.violations.clone())
                .unwrap_or_default();

            self.progress.update_generation(
                generation + 1,
                generations,
                best_fitness,
                avg_fitness,
                violations.clone(),
                SolveStatus::Running,
                stagnation,
            );
            bar.set_position(((generation + 1) as u64 * 100) / generations as u64);
            bar.set_message(format!("best fitness {:.1}", best_fitness));

            if stagnation >= stagnation_limit {
                self.progress.update_generation(
                    generation + 1,
                    generations,
                    best_fitness,
                    avg_fitness,
                    violations,
                    SolveStatus::EarlyStopped,
                    stagnation,
                );
                return;
            }

            // Yield point: observers read the progress record between
            // generations, never inside one
            if generation % 4 == 3 {
                std::thread::sleep(Duration::from_millis(1));
            }

            let mut next = Vec::with_capacity(self.population.len());
            next.extend(self.population.iter().take(elite_size).cloned());

            while next.len() < self.population.len() {
                let parent_a = self.tournament(rng);
                let parent_b = self.tournament(rng);

                let mut child = if rng.gen::<f64>() < params.crossover_rate {
                    self.variation
                        .crossover(&self.population[parent_a], &self.population[parent_b], rng)
                } else {
                    self.population[parent_a].clone()
                };

                self.variation.mutate(&mut child, rng);
                self.evaluator.evaluate(&mut child);
                next.push(child);
            }

            self.population = next;
        }

        let avg_fitness = self
            .population
            .iter()
            .map(|c| c.fitness)
            .sum::<f64>()
            / self.population.len().max(1) as f64;
        self.progress.update_generation(
            generations,
            generations,
            best_fitness,
            avg_fitness,
            self.best
                .as_ref()
                .map(|b| b.violations.clone())
                .unwrap_or_default(),
            SolveStatus::Completed,
            stagnation,
        );
    }

    fn tournament<R: Rng>(&self, rng: &mut R) -> usize {
        let size = (self.model.ga_params.tournament_size.max(1) as usize)
            .min(self.population.len());
        let picks = rand::seq::index::sample(rng, self.population.len(), size);
        picks
            .iter()
            .max_by(|&a, &b| {
                self.population[a]
                    .fitness
                    .total_cmp(&self.population[b].fitness)
            })
            .expect("tournament pool is never empty")
    }

    /// The top K distinct solutions by fitness. Ordering is the stable sort
    /// over the deterministic population order, so ties break reproducibly;
    /// the displayed fitness of a tying rank is decremented by one.
    pub fn top_solutions(&self) -> Vec<RankedSolution> {
        let mut candidates: Vec<Chromosome> = Vec::new();
        if let Some(best) = &self.best {
            candidates.push(best.clone());
        }
        candidates.extend(self.population.iter().cloned());
        candidates.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let mut seen = Vec::new();
        let mut ranked: Vec<RankedSolution> = Vec::new();
        for chromosome in candidates {
            if ranked.len() >= RETURNED_SOLUTIONS {
                break;
            }
            let fingerprint = chromosome.fingerprint();
            if seen.contains(&fingerprint) {
                continue;
            }
            seen.push(fingerprint);

            let raw_fitness = chromosome.fitness;
            let displayed = match ranked.last() {
                Some(prev) if prev.raw_fitness == raw_fitness => prev.fitness - 1.0,
                _ => raw_fitness,
            };
            ranked.push(RankedSolution {
                rank: ranked.len() + 1,
                fitness: displayed,
                raw_fitness,
                chromosome,
            });
        }
        ranked
    }
}
