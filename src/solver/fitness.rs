use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};

use super::Chromosome;
use crate::model::{total_required, ClassRequirement, ScheduleModel};
use crate::types::{SectionId, TimeSlot};

pub const COVERAGE_WEIGHT: f64 = 1000.0;
pub const ELECTIVE_WEIGHT: f64 = 600.0;
pub const CLASH_PENALTY: f64 = 1000.0;
pub const ELECTIVE_SLOT_PENALTY: f64 = 2000.0;
pub const LAB_CONTINUITY_PENALTY: f64 = 1500.0;
pub const FITNESS_FLOOR: f64 = 1.0;

/// Scores chromosomes against the required-class bag. The weights are part
/// of the engine's contract: fitness comparisons must be reproducible across
/// implementations, so they are never configurable.
pub struct Evaluator<'a> {
    model: &'a ScheduleModel,
    total_required: usize,
    elective_required: usize,
    required_lab_sessions: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        model: &'a ScheduleModel,
        bag: &BTreeMap<SectionId, Vec<ClassRequirement>>,
    ) -> Self {
        let elective_required = bag
            .values()
            .flatten()
            .filter(|c| matches!(c, ClassRequirement::Elective { .. }))
            .count();
        let required_lab_sessions = bag
            .values()
            .flatten()
            .filter_map(|c| match c {
                ClassRequirement::Lab { session_id, .. } => Some(session_id.clone()),
                _ => None,
            })
            .collect();
        Self {
            model,
            total_required: total_required(bag),
            elective_required,
            required_lab_sessions,
        }
    }

    /// Recompute violations and the fitness scalar, caching both
    pub fn evaluate(&self, chromosome: &mut Chromosome) -> f64 {
        let violations = self.hard_violations(chromosome);

        let coverage =
            chromosome.scheduled_count() as f64 / self.total_required.max(1) as f64;
        let elective_scheduled = chromosome
            .entries
            .iter()
            .filter(|e| e.is_elective() && !e.is_continuation)
            .count();
        let elective_ratio = if self.elective_required == 0 {
            1.0
        } else {
            elective_scheduled as f64 / self.elective_required as f64
        };

        let clashes = violations.get("faculty_clash").copied().unwrap_or(0)
            + violations.get("room_clash").copied().unwrap_or(0)
            + violations.get("section_clash").copied().unwrap_or(0);
        let elective_slot = violations
            .get("elective_slot_violation")
            .copied()
            .unwrap_or(0);
        let lab_continuity = violations.get("lab_continuity").copied().unwrap_or(0);

        let reward = coverage * COVERAGE_WEIGHT + elective_ratio * ELECTIVE_WEIGHT;
        let penalty = clashes as f64 * CLASH_PENALTY
            + elective_slot as f64 * ELECTIVE_SLOT_PENALTY
            + lab_continuity as f64 * LAB_CONTINUITY_PENALTY;

        chromosome.fitness = (reward - penalty).max(FITNESS_FLOOR);
        chromosome.violations = violations;
        chromosome.fitness
    }

    /// Hard-violation counts from a single scan of the entry list
    pub fn hard_violations(&self, chromosome: &Chromosome) -> BTreeMap<String, u32> {
        let mut violations: BTreeMap<String, u32> = BTreeMap::new();
        let mut bump = |key: &str| *violations.entry(key.to_string()).or_insert(0) += 1;

        let mut faculty_seen: HashMap<(&str, TimeSlot), ()> = HashMap::new();
        let mut room_seen: HashMap<(&str, TimeSlot), ()> = HashMap::new();
        // Section cells remember the elective group of their first occupant:
        // members of one group legitimately share a slot
        let mut section_seen: HashMap<(&str, TimeSlot), Option<&str>> = HashMap::new();

        for entry in &chromosome.entries {
            if !entry.faculty.is_sentinel()
                && faculty_seen
                    .insert((entry.faculty.0.as_str(), entry.slot), ())
                    .is_some()
            {
                bump("faculty_clash");
            }
            if room_seen
                .insert((entry.room.0.as_str(), entry.slot), ())
                .is_some()
            {
                bump("room_clash");
            }

            let group = entry.elective_group.as_deref();
            match section_seen.insert((entry.section.0.as_str(), entry.slot), group) {
                Some(previous) if previous.is_none() || previous != group => {
                    bump("section_clash")
                }
                _ => {}
            }

            let in_elective_slot = self.model.is_elective_slot(entry.slot);
            if entry.is_elective() != in_elective_slot {
                bump("elective_slot_violation");
            }
        }

        let sessions = chromosome
            .entries
            .iter()
            .filter(|e| e.lab_session.is_some())
            .into_group_map_by(|e| e.lab_session.clone().unwrap());
        for entries in sessions.values() {
            if !lab_session_is_valid(self.model, entries) {
                bump("lab_continuity");
            }
        }
        // A required session that never got placed is a continuity failure
        // too, not just lost coverage
        for session_id in &self.required_lab_sessions {
            if !sessions.contains_key(session_id) {
                bump("lab_continuity");
            }
        }

        violations
    }
}

/// A lab session is valid when its entries span exactly N strictly
/// consecutive periods of one day, share section, faculty and room, and
/// carry one lead flag with the rest marked as continuations
pub(crate) fn lab_session_is_valid(
    model: &ScheduleModel,
    entries: &[&crate::types::Entry],
) -> bool {
    let Some(first) = entries.first() else {
        return false;
    };
    let span = model.consecutive_span(&first.subject) as usize;
    if entries.len() != span {
        return false;
    }
    if !entries.iter().all(|e| {
        e.section == first.section
            && e.faculty == first.faculty
            && e.room == first.room
            && e.slot.day == first.slot.day
    }) {
        return false;
    }
    let mut periods: Vec<u8> = entries.iter().map(|e| e.slot.period).collect();
    periods.sort_unstable();
    if !periods.windows(2).all(|w| w[1] == w[0] + 1) {
        return false;
    }
    entries.iter().filter(|e| !e.is_continuation).count() == 1
}
