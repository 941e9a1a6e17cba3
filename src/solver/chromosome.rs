use std::collections::{BTreeMap, HashSet};

use crate::model::{ScheduleModel, SectionSubjectMap, WorkloadMap};
use crate::types::{Entry, FacultyId, RoomId, SectionId, TimeSlot};

/// Occupancy key: who or what is busy at a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OccKey {
    Faculty(FacultyId),
    Room(RoomId),
    Section(SectionId),
}

/// A candidate schedule: the entry list plus the incremental indices that
/// make clash probes O(1). Chromosomes own their entries; recombination
/// produces a fresh child rather than sharing.
#[derive(Debug, Clone)]
pub struct Chromosome {
    pub entries: Vec<Entry>,
    occupied: HashSet<(OccKey, TimeSlot)>,
    pub assigned_faculty: SectionSubjectMap,
    pub workload: WorkloadMap,
    pub fitness: f64,
    pub violations: BTreeMap<String, u32>,
}

impl Chromosome {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            occupied: HashSet::new(),
            assigned_faculty: SectionSubjectMap::new(),
            workload: WorkloadMap::new(),
            fitness: 0.0,
            violations: BTreeMap::new(),
        }
    }

    pub fn is_occupied(&self, key: OccKey, slot: TimeSlot) -> bool {
        self.occupied.contains(&(key, slot))
    }

    /// Conflict-free predicate for a prospective single-slot placement:
    /// the slot is not a break, every availability mask permits it, and none
    /// of the three occupancy keys clash. The sentinel faculty id is always
    /// reported unavailable by the model, so it fails here by construction.
    pub fn is_conflict_free(
        &self,
        model: &ScheduleModel,
        section: &SectionId,
        faculty: &FacultyId,
        room: &RoomId,
        slot: TimeSlot,
    ) -> bool {
        if model.is_break(slot.period) {
            return false;
        }
        if !model.is_faculty_available(faculty, slot) {
            return false;
        }
        if !model.is_room_available(room, slot) {
            return false;
        }
        if !model.is_section_available(section, slot) {
            return false;
        }
        !self.is_occupied(OccKey::Faculty(faculty.clone()), slot)
            && !self.is_occupied(OccKey::Room(room.clone()), slot)
            && !self.is_occupied(OccKey::Section(section.clone()), slot)
    }

    /// Lab predicate: every slot of the window must be individually free
    pub fn is_window_conflict_free(
        &self,
        model: &ScheduleModel,
        section: &SectionId,
        faculty: &FacultyId,
        room: &RoomId,
        day: u8,
        periods: &[u8],
    ) -> bool {
        periods
            .iter()
            .all(|&p| self.is_conflict_free(model, section, faculty, room, TimeSlot::new(day, p)))
    }

    /// Conflict check that ignores the section key, used when members of one
    /// elective group deliberately share a slot
    pub fn is_conflict_free_ignoring_section(
        &self,
        model: &ScheduleModel,
        section: &SectionId,
        faculty: &FacultyId,
        room: &RoomId,
        slot: TimeSlot,
    ) -> bool {
        if model.is_break(slot.period) {
            return false;
        }
        if !model.is_faculty_available(faculty, slot)
            || !model.is_room_available(room, slot)
            || !model.is_section_available(section, slot)
        {
            return false;
        }
        !self.is_occupied(OccKey::Faculty(faculty.clone()), slot)
            && !self.is_occupied(OccKey::Room(room.clone()), slot)
    }

    /// Append an entry, maintaining the occupancy index, the workload
    /// counter and the teacher-stability map atomically
    pub fn add(&mut self, entry: Entry) {
        if !entry.faculty.is_sentinel() {
            self.occupied
                .insert((OccKey::Faculty(entry.faculty.clone()), entry.slot));
            *self.workload.entry(entry.faculty.clone()).or_insert(0) += 1;
            self.assigned_faculty
                .entry((entry.section.clone(), entry.subject.clone()))
                .or_insert_with(|| entry.faculty.clone());
        }
        self.occupied
            .insert((OccKey::Room(entry.room.clone()), entry.slot));
        self.occupied
            .insert((OccKey::Section(entry.section.clone()), entry.slot));
        self.entries.push(entry);
    }

    /// Remove by index. Occupancy keys are released only when no surviving
    /// entry still claims them (elective group members share a section key).
    pub fn remove(&mut self, index: usize) -> Entry {
        let entry = self.entries.remove(index);

        if !entry.faculty.is_sentinel() {
            if let Some(count) = self.workload.get_mut(&entry.faculty) {
                *count = count.saturating_sub(1);
            }
            if !self
                .entries
                .iter()
                .any(|e| e.faculty == entry.faculty && e.slot == entry.slot)
            {
                self.occupied
                    .remove(&(OccKey::Faculty(entry.faculty.clone()), entry.slot));
            }
        }
        if !self
            .entries
            .iter()
            .any(|e| e.room == entry.room && e.slot == entry.slot)
        {
            self.occupied
                .remove(&(OccKey::Room(entry.room.clone()), entry.slot));
        }
        if !self
            .entries
            .iter()
            .any(|e| e.section == entry.section && e.slot == entry.slot)
        {
            self.occupied
                .remove(&(OccKey::Section(entry.section.clone()), entry.slot));
        }

        entry
    }

    /// Rebuild every index from the entry list. Used after seeding a
    /// chromosome from a prior schedule or a sampled variant.
    pub fn rebuild_indices(&mut self) {
        self.occupied.clear();
        self.assigned_faculty.clear();
        self.workload.clear();
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            self.add(entry);
        }
    }

    /// Entries of one subject a section already has on a day; the moving or
    /// incoming entry is excluded by the caller where needed
    pub fn subject_count_on_day(&self, section: &SectionId, subject: &crate::types::SubjectId, day: u8) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.section == *section && e.subject == *subject && e.slot.day == day)
            .count() as u32
    }

    /// Entries counted once per requirement (lab continuations excluded)
    pub fn scheduled_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_continuation).count()
    }

    /// Position-independent identity, used to deduplicate returned solutions
    pub fn fingerprint(&self) -> Vec<(SectionId, u8, u8, crate::types::SubjectId)> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.sort_key()).collect();
        keys.sort();
        keys
    }
}

impl Default for Chromosome {
    fn default() -> Self {
        Self::new()
    }
}
