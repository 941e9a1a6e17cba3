mod events;
mod ledger;
mod shift;

pub use events::*;
pub use ledger::*;
pub use shift::*;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::export::chromosome_from_export;
use crate::model::{build_required_classes, ClassRequirement, ScheduleModel};
use crate::solver::{solve, solve_seeded, Chromosome, Evaluator, SolveProgress};
use crate::types::{FacultyId, RoomId, SectionId, TimeSlot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionRecord {
    pub section: SectionId,
    pub day: u8,
    pub period: u8,
    pub faculty: FacultyId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignedRecord {
    pub section: SectionId,
    pub day: u8,
    pub period: u8,
}

/// What a repair run did and could not do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub generated_at: String,
    pub substitutions: Vec<SubstitutionRecord>,
    pub unassigned: Vec<UnassignedRecord>,
    pub shifted: Vec<ShiftRecord>,
    pub ignored_events: Vec<String>,
}

impl Default for RepairReport {
    fn default() -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            substitutions: Vec::new(),
            unassigned: Vec::new(),
            shifted: Vec::new(),
            ignored_events: Vec::new(),
        }
    }
}

pub struct RepairOutcome {
    pub solution: Chromosome,
    pub report: RepairReport,
}

/// An entry of the prior schedule invalidated by one or more events
#[derive(Debug, Clone)]
struct AffectedEntry {
    section: SectionId,
    slot: TimeSlot,
    clear_faculty: bool,
    clear_room: bool,
    absent_faculty: Option<FacultyId>,
}

/// Biased candidate pool for one affected entry
struct CandidatePool {
    faculties: Vec<FacultyId>,
    rooms: Vec<RoomId>,
}

/// Incremental repair: translate events into masks and locks, relocate what
/// a deterministic shift can fix, and re-search the rest from a seeded
/// population with fairness-ranked substitute pools.
pub struct RepairPipeline {
    model: ScheduleModel,
    bag: BTreeMap<SectionId, Vec<ClassRequirement>>,
    seed: Chromosome,
    ledger: SubstitutionLedger,
}

impl RepairPipeline {
    /// Build the pipeline from a configuration and an optional prior
    /// schedule. Without a prior schedule a fresh solve provides the seed.
    pub fn new(config: crate::types::Config, prior: Option<&Value>, ledger_path: &Path) -> Result<Self> {
        let model = ScheduleModel::from_config(config)?;
        let mut rng = ChaCha8Rng::seed_from_u64(model.ga_params.seed);
        let bag = build_required_classes(&model, &mut rng);
        let ledger = SubstitutionLedger::load(ledger_path);

        let mut seed = match prior {
            Some(value) => chromosome_from_export(&model, value),
            None => {
                let solutions = solve(&model, Arc::new(SolveProgress::new()), true)?;
                solutions
                    .into_iter()
                    .next()
                    .map(|s| s.chromosome)
                    .unwrap_or_default()
            }
        };
        Evaluator::new(&model, &bag).evaluate(&mut seed);

        Ok(Self {
            model,
            bag,
            seed,
            ledger,
        })
    }

    pub fn model(&self) -> &ScheduleModel {
        &self.model
    }

    pub fn seed_schedule(&self) -> &Chromosome {
        &self.seed
    }

    pub fn required_classes(&self) -> usize {
        crate::model::total_required(&self.bag)
    }

    fn evaluate(&self, chromosome: &mut Chromosome) {
        Evaluator::new(&self.model, &self.bag).evaluate(chromosome);
    }

    /// Run the full event-application pipeline and return the repaired
    /// schedule plus its report. Always best-effort: unresolvable events are
    /// reported and skipped, never fatal.
    pub fn apply_events(&mut self, payload: &EventPayload) -> Result<RepairOutcome> {
        let mut report = RepairReport::default();

        let mut events = Vec::new();
        for value in &payload.events {
            match parse_event(&self.model, value) {
                Ok(event) => events.push(event),
                Err(message) => report.ignored_events.push(message),
            }
        }

        // Nothing applicable: the prior schedule stands as-is
        if events.is_empty() {
            let mut solution = self.seed.clone();
            self.evaluate(&mut solution);
            return Ok(RepairOutcome { solution, report });
        }

        // Masks and locks first; everything downstream sees the new reality
        for event in &events {
            apply_event(&mut self.model, event);
        }

        let mut affected = self.compute_affected(&events);

        let mut working = self.seed.clone();
        self.inject_forced_placements(&events, &mut working);

        // Deterministic shift, opted into per partial-absence event
        self.run_shifts(&events, &mut working, &mut affected, &mut report);

        if affected.is_empty() {
            self.evaluate(&mut working);
            return Ok(RepairOutcome {
                solution: working,
                report,
            });
        }

        // Mask the colliding fields in a fresh seed for the re-search
        let mut masked = working.clone();
        for a in &affected {
            if a.clear_faculty {
                if let Some(entry) = masked
                    .entries
                    .iter_mut()
                    .find(|e| e.section == a.section && e.slot == a.slot)
                {
                    entry.faculty = FacultyId::sentinel();
                }
            }
        }
        masked.rebuild_indices();

        let absent: BTreeSet<FacultyId> = events
            .iter()
            .filter_map(|e| match e {
                Event::FacultyAbsence { faculty, .. } => Some(faculty.clone()),
                _ => None,
            })
            .collect();

        let pools = self.build_candidate_pools(&masked, &affected, &absent);
        let population = self.seed_population(&masked, &pools);

        let mut best = match solve_seeded(
            &self.model,
            &self.bag,
            population,
            Arc::new(SolveProgress::new()),
        ) {
            Ok(solutions) => solutions
                .into_iter()
                .next()
                .map(|s| s.chromosome)
                .unwrap_or_else(|| masked.clone()),
            // Best-effort: a floor-bound search still yields the masked seed
            Err(_) => masked.clone(),
        };

        self.pin_common_substitutes(&events, &masked, &pools, &affected, &absent, &mut best);
        best.rebuild_indices();
        self.evaluate(&mut best);

        // Record outcomes and settle the fairness ledger
        for a in &affected {
            match best
                .entries
                .iter()
                .find(|e| e.section == a.section && e.slot == a.slot)
            {
                Some(entry) if !entry.faculty.is_sentinel() => {
                    report.substitutions.push(SubstitutionRecord {
                        section: a.section.clone(),
                        day: a.slot.day,
                        period: a.slot.period,
                        faculty: entry.faculty.clone(),
                    });
                }
                _ => report.unassigned.push(UnassignedRecord {
                    section: a.section.clone(),
                    day: a.slot.day,
                    period: a.slot.period,
                }),
            }
        }

        for record in &report.substitutions {
            self.ledger.record(&record.faculty);
        }
        if let Err(e) = self.ledger.persist() {
            eprintln!("warning: substitution ledger not persisted: {e}");
        }

        Ok(RepairOutcome {
            solution: best,
            report,
        })
    }

    /// Locked assignments arriving as events materialise directly in the
    /// working schedule when their slot is free
    fn inject_forced_placements(&self, events: &[Event], working: &mut Chromosome) {
        for event in events {
            let Event::ForceAssignment(fixed) = event else {
                continue;
            };
            let slot = TimeSlot::new(fixed.day, fixed.period);
            if working
                .entries
                .iter()
                .any(|e| e.section == fixed.section_id && e.slot == slot)
            {
                continue;
            }
            let requirement = ClassRequirement::Theory {
                subject: fixed.subject_id.clone(),
            };
            let room = fixed.room_id.clone().or_else(|| {
                crate::model::room_for_requirement(&self.model, &fixed.section_id, &requirement)
            });
            let Some(room) = room else {
                continue;
            };
            if working.is_conflict_free(
                &self.model,
                &fixed.section_id,
                &fixed.faculty_id,
                &room,
                slot,
            ) {
                working.add(crate::types::Entry {
                    section: fixed.section_id.clone(),
                    subject: fixed.subject_id.clone(),
                    faculty: fixed.faculty_id.clone(),
                    room,
                    slot,
                    kind: if self.model.is_lab_subject(&fixed.subject_id) {
                        crate::types::EntryKind::Lab
                    } else {
                        crate::types::EntryKind::Theory
                    },
                    lab_session: None,
                    is_continuation: false,
                    elective_group: None,
                });
            }
        }
    }

    /// Scan the prior schedule for entries hit by absence/outage events,
    /// deduplicated with merged clear flags
    fn compute_affected(&self, events: &[Event]) -> Vec<AffectedEntry> {
        let mut merged: BTreeMap<(SectionId, TimeSlot), AffectedEntry> = BTreeMap::new();

        let mut hit = |section: &SectionId,
                       slot: TimeSlot,
                       clear_faculty: bool,
                       clear_room: bool,
                       absent: Option<&FacultyId>| {
            let entry = merged
                .entry((section.clone(), slot))
                .or_insert_with(|| AffectedEntry {
                    section: section.clone(),
                    slot,
                    clear_faculty: false,
                    clear_room: false,
                    absent_faculty: None,
                });
            entry.clear_faculty |= clear_faculty;
            entry.clear_room |= clear_room;
            if entry.absent_faculty.is_none() {
                entry.absent_faculty = absent.cloned();
            }
        };

        for event in events {
            match event {
                Event::FacultyAbsence {
                    faculty,
                    days,
                    periods,
                    ..
                } => {
                    for e in &self.seed.entries {
                        if e.faculty == *faculty
                            && (days.0..=days.1).contains(&e.slot.day)
                            && periods.as_ref().map_or(true, |p| p.contains(&e.slot.period))
                        {
                            hit(&e.section, e.slot, true, false, Some(faculty));
                        }
                    }
                }
                Event::RoomOutage {
                    room,
                    days,
                    periods,
                } => {
                    for e in &self.seed.entries {
                        if e.room == *room
                            && (days.0..=days.1).contains(&e.slot.day)
                            && periods.as_ref().map_or(true, |p| p.contains(&e.slot.period))
                        {
                            hit(&e.section, e.slot, false, true, None);
                        }
                    }
                }
                Event::SectionUnavailable {
                    section,
                    days,
                    periods,
                } => {
                    for e in &self.seed.entries {
                        if e.section == *section
                            && (days.0..=days.1).contains(&e.slot.day)
                            && periods.as_ref().map_or(true, |p| p.contains(&e.slot.period))
                        {
                            hit(&e.section, e.slot, false, false, None);
                        }
                    }
                }
                Event::ForceAssignment(_) => {}
            }
        }

        merged.into_values().collect()
    }

    fn run_shifts(
        &self,
        events: &[Event],
        working: &mut Chromosome,
        affected: &mut Vec<AffectedEntry>,
        report: &mut RepairReport,
    ) {
        let mut global_forbidden: HashSet<u8> = self.model.break_periods.iter().copied().collect();
        global_forbidden.extend(self.model.mentorship_periods.iter().copied());
        global_forbidden.extend(self.model.lunch_break_periods.iter().copied());

        for event in events {
            let Event::FacultyAbsence {
                faculty,
                days,
                periods: Some(periods),
                partial: true,
                preferences,
            } = event
            else {
                continue;
            };
            if !preferences.prefer_shift || periods.is_empty() {
                continue;
            }

            let targets: Vec<(SectionId, TimeSlot)> = working
                .entries
                .iter()
                .filter(|e| {
                    e.faculty == *faculty
                        && (days.0..=days.1).contains(&e.slot.day)
                        && periods.contains(&e.slot.period)
                })
                .map(|e| (e.section.clone(), e.slot))
                .collect();

            let mut forbidden = global_forbidden.clone();
            forbidden.extend(preferences.forbidden_periods.iter().copied());
            forbidden.extend(preferences.avoid_periods.iter().copied());

            let shifted = deterministic_shift(&self.model, working, &targets, &forbidden);
            for record in &shifted {
                let orig = TimeSlot::new(record.day, record.orig_period);
                affected.retain(|a| !(a.section == record.section && a.slot == orig));
            }
            report.shifted.extend(shifted);
        }
    }

    /// Per-entry pools: qualified faculty minus the absent set, preferring
    /// those free at the slot, ranked by the persistent substitution load;
    /// capacity-sufficient free rooms, with the original room as fallback
    fn build_candidate_pools(
        &self,
        masked: &Chromosome,
        affected: &[AffectedEntry],
        absent: &BTreeSet<FacultyId>,
    ) -> BTreeMap<usize, CandidatePool> {
        let mut pools = BTreeMap::new();

        for a in affected {
            let Some(index) = masked
                .entries
                .iter()
                .position(|e| e.section == a.section && e.slot == a.slot)
            else {
                continue;
            };
            let entry = &masked.entries[index];
            let slot = entry.slot;

            // Occupancy probes must not count the entry under repair itself
            let faculty_busy = |fid: &FacultyId| {
                masked
                    .entries
                    .iter()
                    .enumerate()
                    .any(|(i, o)| i != index && o.faculty == *fid && o.slot == slot)
            };
            let room_busy = |rid: &RoomId| {
                masked
                    .entries
                    .iter()
                    .enumerate()
                    .any(|(i, o)| i != index && o.room == *rid && o.slot == slot)
            };

            let mut qualified: Vec<FacultyId> = self
                .model
                .faculty_subjects
                .iter()
                .filter(|(_, subjects)| subjects.contains(&entry.subject))
                .map(|(fid, _)| fid.clone())
                .collect();
            qualified.sort_by_key(|fid| (self.ledger.count(fid), fid.clone()));

            let free: Vec<FacultyId> = qualified
                .iter()
                .filter(|fid| {
                    !absent.contains(*fid)
                        && self.model.is_faculty_available(fid, slot)
                        && !faculty_busy(fid)
                })
                .cloned()
                .collect();
            let faculties = if free.is_empty() {
                qualified
                    .into_iter()
                    .filter(|fid| !absent.contains(fid))
                    .collect()
            } else {
                free
            };

            let student_count = self
                .model
                .sections
                .get(&entry.section)
                .map(|s| s.student_count)
                .unwrap_or(0);
            let mut rooms: Vec<RoomId> = self
                .model
                .rooms
                .iter()
                .filter(|(rid, room)| {
                    room.capacity >= student_count
                        && self.model.is_room_available(rid, slot)
                        && !room_busy(rid)
                })
                .map(|(rid, _)| rid.clone())
                .collect();
            if !rooms.contains(&entry.room) {
                rooms.push(entry.room.clone());
            }

            pools.insert(index, CandidatePool { faculties, rooms });
        }

        pools
    }

    /// Population of variants of the masked seed, each sampling the pools
    /// uniformly
    fn seed_population(
        &self,
        masked: &Chromosome,
        pools: &BTreeMap<usize, CandidatePool>,
    ) -> Vec<Chromosome> {
        // Offset keeps the sampling stream independent of the solve RNG
        let mut rng =
            ChaCha8Rng::seed_from_u64(self.model.ga_params.seed ^ 0x9E37_79B9_7F4A_7C15);
        let pop_size = self.model.ga_params.population_size.max(1) as usize;

        (0..pop_size)
            .map(|variant| {
                let mut entries = masked.entries.clone();
                for (&index, pool) in pools {
                    // Variant 0 takes every pool head, so the least-loaded
                    // candidate wins whenever the search ends in a fitness tie
                    let faculty = if variant == 0 {
                        pool.faculties.first()
                    } else {
                        pool.faculties.choose(&mut rng)
                    };
                    if let Some(faculty) = faculty {
                        entries[index].faculty = faculty.clone();
                    }
                    let room = if variant == 0 {
                        pool.rooms.first()
                    } else {
                        pool.rooms.choose(&mut rng)
                    };
                    if let Some(room) = room {
                        entries[index].room = room.clone();
                    }
                }
                let mut chromosome = Chromosome::new();
                chromosome.entries = entries;
                chromosome.rebuild_indices();
                chromosome
            })
            .collect()
    }

    /// `same_substitute_per_section`: one substitute covers all of an absent
    /// teacher's classes in a section, chosen least-loaded from the common
    /// candidates, skipping any pin that would reintroduce a clash
    fn pin_common_substitutes(
        &self,
        events: &[Event],
        masked: &Chromosome,
        pools: &BTreeMap<usize, CandidatePool>,
        affected: &[AffectedEntry],
        absent: &BTreeSet<FacultyId>,
        best: &mut Chromosome,
    ) {
        let affected_keys: HashSet<(SectionId, TimeSlot)> = affected
            .iter()
            .map(|a| (a.section.clone(), a.slot))
            .collect();

        for event in events {
            let Event::FacultyAbsence {
                faculty: absent_fid,
                preferences,
                ..
            } = event
            else {
                continue;
            };
            if preferences.mode.as_deref() != Some(MODE_SAME_SUBSTITUTE) {
                continue;
            }

            let mut by_section: BTreeMap<SectionId, Vec<usize>> = BTreeMap::new();
            for a in affected {
                if a.absent_faculty.as_ref() != Some(absent_fid) {
                    continue;
                }
                if let Some(index) = masked
                    .entries
                    .iter()
                    .position(|e| e.section == a.section && e.slot == a.slot)
                {
                    if pools.contains_key(&index) {
                        by_section.entry(a.section.clone()).or_default().push(index);
                    }
                }
            }

            for (_, indices) in by_section {
                let mut candidate_sets = indices.iter().map(|i| {
                    pools[i]
                        .faculties
                        .iter()
                        .cloned()
                        .collect::<BTreeSet<FacultyId>>()
                });
                let Some(first) = candidate_sets.next() else {
                    continue;
                };
                let common: BTreeSet<FacultyId> = candidate_sets
                    .fold(first, |acc, set| acc.intersection(&set).cloned().collect())
                    .into_iter()
                    .filter(|fid| !absent.contains(fid))
                    .collect();
                let Some(chosen) = common
                    .iter()
                    .min_by_key(|fid| (masked.workload.get(*fid).copied().unwrap_or(0), (*fid).clone()))
                    .cloned()
                else {
                    continue;
                };

                for index in indices {
                    let key = (
                        masked.entries[index].section.clone(),
                        masked.entries[index].slot,
                    );
                    let Some(target) = best
                        .entries
                        .iter()
                        .position(|e| e.section == key.0 && e.slot == key.1)
                    else {
                        continue;
                    };
                    let slot = best.entries[target].slot;
                    let clash = best.entries.iter().enumerate().any(|(i, o)| {
                        i != target
                            && o.faculty == chosen
                            && o.slot == slot
                            && !affected_keys.contains(&(o.section.clone(), o.slot))
                    });
                    if !clash {
                        best.entries[target].faculty = chosen.clone();
                    }
                }
            }
        }
    }
}
