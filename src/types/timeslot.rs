use serde::{Deserialize, Serialize};

/// A specific (day, period) cell in the weekly grid - the atomic scheduling unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Working-day index (0 = first configured day)
    pub day: u8,
    /// Period id as declared in the period table (typically 1-based)
    pub period: u8,
}

impl TimeSlot {
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}P{}", self.day + 1, self.period)
    }
}
