use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

/// Lifecycle of one solve task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    NotStarted,
    Initializing,
    Running,
    Completed,
    EarlyStopped,
}

/// Consistent view of a solve in flight
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub generation: u32,
    pub total_generations: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub violations: BTreeMap<String, u32>,
    pub status: SolveStatus,
    pub initialization_progress: u32,
    pub initialization_total: u32,
    pub stagnation_count: u32,
    pub elapsed_ms: u64,
}

struct ProgressInner {
    generation: u32,
    total_generations: u32,
    best_fitness: f64,
    avg_fitness: f64,
    violations: BTreeMap<String, u32>,
    status: SolveStatus,
    initialization_progress: u32,
    initialization_total: u32,
    stagnation_count: u32,
    started: Instant,
}

/// Shared progress record. Writers mutate the whole snapshot under one lock;
/// observers take the same lock, so a read never sees a half-applied update.
pub struct SolveProgress {
    inner: Mutex<ProgressInner>,
}

impl SolveProgress {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ProgressInner {
                generation: 0,
                total_generations: 0,
                best_fitness: 0.0,
                avg_fitness: 0.0,
                violations: BTreeMap::new(),
                status: SolveStatus::NotStarted,
                initialization_progress: 0,
                initialization_total: 0,
                stagnation_count: 0,
                started: Instant::now(),
            }),
        }
    }

    pub fn update_initialization(&self, current: u32, total: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.initialization_progress = current;
        inner.initialization_total = total;
        inner.status = SolveStatus::Initializing;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_generation(
        &self,
        generation: u32,
        total_generations: u32,
        best_fitness: f64,
        avg_fitness: f64,
        violations: BTreeMap<String, u32>,
        status: SolveStatus,
        stagnation_count: u32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation = generation;
        inner.total_generations = total_generations;
        inner.best_fitness = best_fitness;
        inner.avg_fitness = avg_fitness;
        inner.violations = violations;
        inner.status = status;
        inner.stagnation_count = stagnation_count;
    }

    pub fn set_status(&self, status: SolveStatus) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = status;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().unwrap();
        ProgressSnapshot {
            generation: inner.generation,
            total_generations: inner.total_generations,
            best_fitness: inner.best_fitness,
            avg_fitness: inner.avg_fitness,
            violations: inner.violations.clone(),
            status: inner.status,
            initialization_progress: inner.initialization_progress,
            initialization_total: inner.initialization_total,
            stagnation_count: inner.stagnation_count,
            elapsed_ms: inner.started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for SolveProgress {
    fn default() -> Self {
        Self::new()
    }
}
