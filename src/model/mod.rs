mod candidates;
mod requirements;

pub use candidates::*;
pub use requirements::*;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Result, SchedulerError};
use crate::types::{
    CollegeInfo, Config, DeptId, FacultyDef, FacultyId, FixedAssignment, GaParams,
    HardConstraintsConfig, LabDef, PeriodDef, RoomDef, RoomId, SectionDef, SectionId, SubjectDef,
    SubjectId, TimeSlot,
};

/// The canonical domain model: flattened entity maps plus the derived lookup
/// tables. Entities are immutable for the duration of a solve; only the
/// unavailability masks and the fixed-assignment list may be appended to by
/// the event applier before solving.
#[derive(Debug, Clone)]
pub struct ScheduleModel {
    pub college_info: CollegeInfo,
    pub periods: Vec<PeriodDef>,
    pub period_ids: Vec<u8>,
    pub working_days: Vec<String>,
    pub break_periods: BTreeSet<u8>,
    pub lunch_break_periods: BTreeSet<u8>,
    pub mentorship_periods: BTreeSet<u8>,
    /// Ordered as declared; electives are placed by first-fit over this list
    pub elective_slots: Vec<TimeSlot>,
    elective_slot_set: HashSet<TimeSlot>,

    pub sections: BTreeMap<SectionId, SectionDef>,
    pub subjects: BTreeMap<SubjectId, SubjectDef>,
    pub labs: BTreeMap<SubjectId, LabDef>,
    pub faculty: BTreeMap<FacultyId, FacultyDef>,
    pub rooms: BTreeMap<RoomId, RoomDef>,

    /// Canonical name/synonym table: subject ids, subject names, lab ids,
    /// lab names, and the free-form mapping from the configuration
    subject_lookup: BTreeMap<String, SubjectId>,
    pub faculty_subjects: BTreeMap<FacultyId, BTreeSet<SubjectId>>,
    pub section_department: BTreeMap<SectionId, DeptId>,
    pub section_coordinator: BTreeMap<SectionId, FacultyId>,

    faculty_unavailable: BTreeMap<FacultyId, HashSet<TimeSlot>>,
    room_unavailable: BTreeMap<RoomId, HashSet<TimeSlot>>,
    section_unavailable: BTreeMap<SectionId, HashSet<TimeSlot>>,

    pub fixed_assignments: Vec<FixedAssignment>,
    fixed_lookup: HashSet<(SectionId, SubjectId, TimeSlot)>,
    pub force_coordinator_assignments: bool,
    pub hard_constraints: HardConstraintsConfig,
    pub soft_constraints: BTreeMap<String, serde_json::Value>,
    pub ga_params: GaParams,
}

impl ScheduleModel {
    /// Build the model and every derived index from a validated configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let ts = config.time_slots;
        let periods = ts.periods;
        let period_ids: Vec<u8> = periods.iter().map(|p| p.id).collect();
        let working_days = ts.working_days;

        // Union break set; legacy singular keys fold into the plural ones
        let mut lunch_break_periods: BTreeSet<u8> = ts.lunch_break_periods.into_iter().collect();
        if let Some(p) = ts.lunch_period {
            lunch_break_periods.insert(p);
        }
        let mut mentorship_periods: BTreeSet<u8> = ts.mentorship_periods.into_iter().collect();
        if let Some(p) = ts.mentorship_period {
            mentorship_periods.insert(p);
        }
        let mut break_periods: BTreeSet<u8> = ts.break_periods.into_iter().collect();
        if let Some(fixed) = &config.constraints.hard_constraints.break_periods_fixed {
            break_periods.extend(fixed.iter().copied());
        }
        break_periods.extend(lunch_break_periods.iter().copied());
        break_periods.extend(mentorship_periods.iter().copied());

        // Sections appear either nested in departments or at the top level
        let mut sections: BTreeMap<SectionId, SectionDef> = BTreeMap::new();
        let mut section_department: BTreeMap<SectionId, DeptId> = BTreeMap::new();
        for dept in &config.departments {
            for section in &dept.sections {
                section_department.insert(section.section_id.clone(), dept.dept_id.clone());
                sections.insert(section.section_id.clone(), section.clone());
            }
        }
        for section in &config.sections {
            sections.insert(section.section_id.clone(), section.clone());
        }

        let subjects: BTreeMap<SubjectId, SubjectDef> = config
            .subjects
            .into_iter()
            .map(|s| (s.subject_id.clone(), s))
            .collect();
        let labs: BTreeMap<SubjectId, LabDef> = config
            .labs
            .into_iter()
            .map(|l| (l.lab_id.clone(), l))
            .collect();
        let faculty: BTreeMap<FacultyId, FacultyDef> = config
            .faculty
            .into_iter()
            .map(|f| (f.faculty_id.clone(), f))
            .collect();
        let rooms: BTreeMap<RoomId, RoomDef> = config
            .rooms
            .into_iter()
            .map(|r| (r.room_id.clone(), r))
            .collect();

        // Name/synonym table
        let mut subject_lookup: BTreeMap<String, SubjectId> = BTreeMap::new();
        for (id, subject) in &subjects {
            subject_lookup.insert(id.0.clone(), id.clone());
            if !subject.name.is_empty() {
                subject_lookup.insert(subject.name.clone(), id.clone());
            }
        }
        for (id, lab) in &labs {
            subject_lookup.insert(id.0.clone(), id.clone());
            if !lab.name.is_empty() {
                subject_lookup.insert(lab.name.clone(), id.clone());
            }
        }
        for (name, id) in &config.subject_name_mapping {
            if !name.is_empty() {
                subject_lookup.insert(name.clone(), id.clone());
            }
        }

        // Qualification sets, resolved through the name table. Unresolved
        // references are kept only when they equal a known id exactly.
        let mut faculty_subjects: BTreeMap<FacultyId, BTreeSet<SubjectId>> = BTreeMap::new();
        for (fid, def) in &faculty {
            let mut qualified = BTreeSet::new();
            for reference in &def.subjects {
                if let Some(id) = resolve_reference(&subject_lookup, reference) {
                    qualified.insert(id);
                } else {
                    let as_id = SubjectId(reference.clone());
                    if subjects.contains_key(&as_id) || labs.contains_key(&as_id) {
                        qualified.insert(as_id);
                    }
                }
            }
            faculty_subjects.insert(fid.clone(), qualified);
        }

        // Coordinator names resolve against faculty display names
        let mut section_coordinator: BTreeMap<SectionId, FacultyId> = BTreeMap::new();
        for (sid, section) in &sections {
            if let Some(name) = &section.coordinator {
                if let Some((fid, _)) = faculty.iter().find(|(_, f)| &f.name == name) {
                    section_coordinator.insert(sid.clone(), fid.clone());
                }
            }
        }

        // Unavailability masks from the configuration
        let mut faculty_unavailable: BTreeMap<FacultyId, HashSet<TimeSlot>> = BTreeMap::new();
        for (fid, def) in &faculty {
            let mask = def
                .unavailable_periods
                .iter()
                .map(|u| TimeSlot::new(u.day, u.period))
                .collect();
            faculty_unavailable.insert(fid.clone(), mask);
        }
        let mut room_unavailable: BTreeMap<RoomId, HashSet<TimeSlot>> = BTreeMap::new();
        for (rid, def) in &rooms {
            let mask = def
                .unavailable_periods
                .iter()
                .map(|u| TimeSlot::new(u.day, u.period))
                .collect();
            room_unavailable.insert(rid.clone(), mask);
        }
        let mut section_unavailable: BTreeMap<SectionId, HashSet<TimeSlot>> = BTreeMap::new();
        for (sid, def) in &sections {
            let mask = def
                .unavailable_periods
                .iter()
                .map(|u| TimeSlot::new(u.day, u.period))
                .collect();
            section_unavailable.insert(sid.clone(), mask);
        }

        let fixed_assignments = config.special_requirements.fixed_assignments;
        let fixed_lookup = fixed_assignments
            .iter()
            .map(|f| {
                (
                    f.section_id.clone(),
                    f.subject_id.clone(),
                    TimeSlot::new(f.day, f.period),
                )
            })
            .collect();

        let mut model = Self {
            college_info: config.college_info,
            periods,
            period_ids,
            working_days,
            break_periods,
            lunch_break_periods,
            mentorship_periods,
            elective_slots: Vec::new(),
            elective_slot_set: HashSet::new(),
            sections,
            subjects,
            labs,
            faculty,
            rooms,
            subject_lookup,
            faculty_subjects,
            section_department,
            section_coordinator,
            faculty_unavailable,
            room_unavailable,
            section_unavailable,
            fixed_assignments,
            fixed_lookup,
            force_coordinator_assignments: config.special_requirements.force_coordinator_assignments,
            hard_constraints: config.constraints.hard_constraints,
            soft_constraints: config.constraints.soft_constraints,
            ga_params: config.genetic_algorithm_params,
        };

        for slot in &config.elective_slots {
            let day = model.day_index(&slot.day_name).ok_or_else(|| {
                SchedulerError::ConfigurationInvalid(format!(
                    "elective slot references unknown day '{}'",
                    slot.day_name
                ))
            })?;
            let ts = TimeSlot::new(day, slot.period);
            model.elective_slots.push(ts);
            model.elective_slot_set.insert(ts);
        }

        Ok(model)
    }

    pub fn num_working_days(&self) -> u8 {
        self.working_days.len() as u8
    }

    /// Resolve a day name to its working-day index. Exact match first, then
    /// a case-insensitive three-letter prefix ("Mon" matches "Monday").
    pub fn day_index(&self, name: &str) -> Option<u8> {
        if let Some(idx) = self.working_days.iter().position(|d| d == name) {
            return Some(idx as u8);
        }
        if name.len() < 3 {
            return None;
        }
        let prefix = name[..3].to_ascii_lowercase();
        self.working_days
            .iter()
            .position(|d| d.to_ascii_lowercase().starts_with(&prefix))
            .map(|idx| idx as u8)
    }

    /// Resolve a subject reference (id, name, or synonym) to a canonical id
    pub fn resolve_subject(&self, reference: &str) -> Option<SubjectId> {
        resolve_reference(&self.subject_lookup, reference)
    }

    pub fn is_break(&self, period: u8) -> bool {
        self.break_periods.contains(&period)
    }

    pub fn is_elective_slot(&self, slot: TimeSlot) -> bool {
        self.elective_slot_set.contains(&slot)
    }

    /// Every non-break (day, period) cell of the week, day-major order
    pub fn legal_slots(&self) -> Vec<TimeSlot> {
        let mut slots = Vec::new();
        for day in 0..self.num_working_days() {
            for &period in &self.period_ids {
                if !self.is_break(period) {
                    slots.push(TimeSlot::new(day, period));
                }
            }
        }
        slots
    }

    pub fn is_faculty_available(&self, faculty: &FacultyId, slot: TimeSlot) -> bool {
        if faculty.is_sentinel() {
            return false;
        }
        match self.faculty_unavailable.get(faculty) {
            Some(mask) => !mask.contains(&slot),
            None => false,
        }
    }

    pub fn is_room_available(&self, room: &RoomId, slot: TimeSlot) -> bool {
        match self.room_unavailable.get(room) {
            Some(mask) => !mask.contains(&slot),
            None => false,
        }
    }

    pub fn is_section_available(&self, section: &SectionId, slot: TimeSlot) -> bool {
        match self.section_unavailable.get(section) {
            Some(mask) => !mask.contains(&slot),
            None => false,
        }
    }

    /// Append to a faculty member's unavailability mask (event applier only)
    pub fn mask_faculty(&mut self, faculty: &FacultyId, slot: TimeSlot) {
        if let Some(mask) = self.faculty_unavailable.get_mut(faculty) {
            mask.insert(slot);
        }
    }

    pub fn mask_room(&mut self, room: &RoomId, slot: TimeSlot) {
        if let Some(mask) = self.room_unavailable.get_mut(room) {
            mask.insert(slot);
        }
    }

    pub fn mask_section(&mut self, section: &SectionId, slot: TimeSlot) {
        if let Some(mask) = self.section_unavailable.get_mut(section) {
            mask.insert(slot);
        }
    }

    pub fn faculty_mask(&self, faculty: &FacultyId) -> Option<&HashSet<TimeSlot>> {
        self.faculty_unavailable.get(faculty)
    }

    pub fn room_mask(&self, room: &RoomId) -> Option<&HashSet<TimeSlot>> {
        self.room_unavailable.get(room)
    }

    pub fn section_mask(&self, section: &SectionId) -> Option<&HashSet<TimeSlot>> {
        self.section_unavailable.get(section)
    }

    pub fn add_fixed_assignment(&mut self, fixed: FixedAssignment) {
        self.fixed_lookup.insert((
            fixed.section_id.clone(),
            fixed.subject_id.clone(),
            TimeSlot::new(fixed.day, fixed.period),
        ));
        self.fixed_assignments.push(fixed);
    }

    /// True when a placement was pinned by special requirements and must not move
    pub fn is_fixed(&self, section: &SectionId, subject: &SubjectId, slot: TimeSlot) -> bool {
        self.fixed_lookup
            .contains(&(section.clone(), subject.clone(), slot))
    }

    /// Per-day cap for one subject within a section; subject-level override
    /// wins over the global hard-constraint knob, default 2
    pub fn daily_cap(&self, subject: &SubjectId) -> u32 {
        if let Some(def) = self.subjects.get(subject) {
            if let Some(cap) = def.max_classes_per_day {
                return cap;
            }
        }
        self.hard_constraints
            .max_classes_per_subject_per_day
            .unwrap_or(2)
    }

    /// Departmental-scope + semester applicability test shared by subjects and labs
    pub fn applies_to_section(
        &self,
        departments: &[DeptId],
        semester: Option<u32>,
        section: &SectionDef,
    ) -> bool {
        if let Some(subject_semester) = semester {
            if subject_semester != section.semester {
                return false;
            }
        }
        if departments.is_empty() {
            return true;
        }
        match self.section_department.get(&section.section_id) {
            Some(dept) => departments.contains(dept),
            // Sections without a department accept universal subjects only
            None => false,
        }
    }

    pub fn subject_display_name(&self, id: &SubjectId) -> String {
        if let Some(s) = self.subjects.get(id) {
            return s.name.clone();
        }
        if let Some(l) = self.labs.get(id) {
            return l.name.clone();
        }
        id.0.clone()
    }

    pub fn faculty_display_name(&self, id: &FacultyId) -> String {
        self.faculty
            .get(id)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| id.0.clone())
    }

    /// "start-end" wall-time label for a period, falling back to "P<n>"
    pub fn period_time_label(&self, period: u8) -> String {
        match self.periods.iter().find(|p| p.id == period) {
            Some(p) if !p.start_time.is_empty() || !p.end_time.is_empty() => {
                format!("{}-{}", p.start_time, p.end_time)
            }
            _ => format!("P{}", period),
        }
    }

    pub fn consecutive_span(&self, lab: &SubjectId) -> u32 {
        self.labs
            .get(lab)
            .map(|l| l.requires_consecutive_periods.max(2))
            .unwrap_or(2)
    }

    pub fn is_lab_subject(&self, id: &SubjectId) -> bool {
        self.labs.contains_key(id)
    }
}

fn resolve_reference(
    lookup: &BTreeMap<String, SubjectId>,
    reference: &str,
) -> Option<SubjectId> {
    if reference.is_empty() {
        return None;
    }
    if let Some(id) = lookup.get(reference) {
        return Some(id.clone());
    }
    lookup
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(reference))
        .map(|(_, id)| id.clone())
}
