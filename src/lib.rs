//! Constraint-driven university timetable generator with incremental repair.
//!
//! The engine assigns every required theory lecture and lab session of every
//! section to a (day, period, faculty, room) tuple under a layered
//! constraint discipline, using a population-based stochastic search. A
//! repair layer takes a previously generated schedule plus a batch of
//! disruptive events (absences, outages, locked slots) and produces a new
//! schedule that preserves as much of the original as possible, spreading
//! substitution duty fairly over successive runs.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use timetable_scheduler::model::ScheduleModel;
//! use timetable_scheduler::parser::{load_config, validate_input, validate_model};
//! use timetable_scheduler::solver::{solve, SolveProgress};
//!
//! let config = load_config(Path::new("config.json")).unwrap();
//! validate_input(&config).unwrap();
//! let model = ScheduleModel::from_config(config).unwrap();
//! validate_model(&model).unwrap();
//! let solutions = solve(&model, Arc::new(SolveProgress::new()), false).unwrap();
//! println!("best fitness: {:.1}", solutions[0].raw_fitness);
//! ```

pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod repair;
pub mod solver;
pub mod types;

pub use error::{Result, SchedulerError};
