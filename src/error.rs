use std::collections::BTreeMap;
use thiserror::Error;

/// Domain-specific errors for the timetable engine
#[derive(Error, Debug)]
pub enum SchedulerError {
    // Input/Parse errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{file}': {message}")]
    ConfigParse { file: String, message: String },

    // Fatal validation errors
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("No section has any applicable class requirement; nothing to schedule")]
    RequirementInfeasible,

    // Solver errors
    #[error("Search terminated at the fitness floor; violations: {violations:?}")]
    NoSolution { violations: BTreeMap<String, u32> },

    // Non-fatal, surfaced through the repair report rather than propagated
    #[error("Event references unknown {kind} '{reference}'")]
    EventUnresolvable { kind: String, reference: String },

    #[error("Substitution ledger {op} failed: {source}")]
    LedgerIo {
        op: String,
        #[source]
        source: std::io::Error,
    },
}

/// Use anyhow::Result at application boundaries
pub type Result<T> = anyhow::Result<T>;
